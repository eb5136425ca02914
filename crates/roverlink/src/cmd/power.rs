use crate::cmd::{LinkArgs, PowerAction, PowerArgs};
use crate::exit::{rover_error, CliResult, SUCCESS};

pub fn run(args: PowerArgs, link: &LinkArgs) -> CliResult<i32> {
    let mut rover = link.connect()?;
    let result = match args.action {
        PowerAction::Wake => rover.wake(),
        PowerAction::Sleep => rover.sleep(),
        PowerAction::Off { delay } => rover.power_off_after(delay),
    };
    result.map_err(|err| rover_error("power command failed", err))?;
    Ok(SUCCESS)
}
