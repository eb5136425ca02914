use crate::cmd::{LinkArgs, ResetArgs, ResetTarget};
use crate::exit::{rover_error, CliResult, SUCCESS};

pub fn run(args: ResetArgs, link: &LinkArgs) -> CliResult<i32> {
    let mut rover = link.connect()?;
    let result = match args.target {
        ResetTarget::Yaw => rover.reset_yaw(),
        ResetTarget::Locator => rover.reset_locator(),
    };
    result.map_err(|err| rover_error("reset failed", err))?;
    Ok(SUCCESS)
}
