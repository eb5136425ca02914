use std::time::{Duration, Instant};

use roverlink_rover::{ChannelRover, CollisionPolicy, DriveDirection};
use tracing::{info, warn};

use crate::cmd::{parse_duration, DriveArgs, LinkArgs};
use crate::exit::{rover_error, CliError, CliResult, INTERNAL, SUCCESS};

/// Drive commands are renewed well inside the controller's two-second motor timeout.
const RENEW_INTERVAL: Duration = Duration::from_millis(500);

pub fn run(args: DriveArgs, link: &LinkArgs) -> CliResult<i32> {
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let direction = if args.reverse {
        DriveDirection::Reverse
    } else {
        DriveDirection::Forward
    };

    let mut config = link.rover_config()?;
    if args.backoff {
        config.collision_policy = CollisionPolicy::Reverse {
            speed: CollisionPolicy::BACKOFF_SPEED,
        };
    }
    let mut rover = link.open(config)?;

    let send = |rover: &mut ChannelRover| {
        rover
            .drive(args.speed, args.heading, direction)
            .map_err(|err| rover_error("drive failed", err))
    };
    send(&mut rover)?;

    let Some(duration) = duration else {
        return Ok(SUCCESS);
    };

    let halt = rover
        .halt_handle()
        .map_err(|err| rover_error("drive failed", err))?;
    let interrupt = halt.clone();
    ctrlc::set_handler(move || {
        if let Err(err) = interrupt.force_stop() {
            warn!(error = %err, "force stop failed");
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || rover.collision_pending() {
            break;
        }
        std::thread::sleep(remaining.min(RENEW_INTERVAL));
        if rover.collision_pending() || Instant::now() >= deadline {
            break;
        }
        send(&mut rover)?;
    }

    if rover.take_collision() {
        // A renewal may have gone out after the interrupt's stop frame.
        halt.force_stop()
            .map_err(|err| rover_error("force stop failed", err))?;
        info!("drive interrupted");
        return Ok(SUCCESS);
    }

    rover
        .halt()
        .map_err(|err| rover_error("halt failed", err))?;
    Ok(SUCCESS)
}

pub fn halt(link: &LinkArgs) -> CliResult<i32> {
    let mut rover = link.connect()?;
    rover
        .halt()
        .map_err(|err| rover_error("halt failed", err))?;
    Ok(SUCCESS)
}
