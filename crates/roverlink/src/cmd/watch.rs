use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use roverlink_rover::{ChannelRover, Event};
use tracing::debug;

use crate::cmd::{install_ctrlc_handler, LinkArgs, WatchArgs};
use crate::exit::{rover_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat, PositionOutput};

pub fn run(args: WatchArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let mut rover = link.connect()?;
    args.transform.apply(&mut rover);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    rover
        .start_stream(args.period)
        .map_err(|err| rover_error("start stream failed", err))?;

    let outcome = print_positions(&mut rover, &running, args.count, format);
    let stopped = rover
        .stop_stream()
        .map_err(|err| rover_error("stop stream failed", err));

    outcome?;
    stopped?;
    Ok(SUCCESS)
}

fn print_positions(
    rover: &mut ChannelRover,
    running: &AtomicBool,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<()> {
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        match rover.poll() {
            Ok(Some(Event::Position(pose))) => {
                print_record(&PositionOutput::from(pose), format);
                printed = printed.saturating_add(1);
                if count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Ok(Some(Event::Frame(packet))) => {
                debug!(command_id = packet.command_id(), "ignoring frame");
            }
            Ok(None) => {}
            Err(err) => return Err(rover_error("receive failed", err)),
        }
    }

    Ok(())
}
