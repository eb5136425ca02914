use roverlink_rover::Rgb;

use crate::cmd::{LedsArgs, LinkArgs};
use crate::exit::{rover_error, CliResult, SUCCESS};

pub fn run(args: LedsArgs, link: &LinkArgs) -> CliResult<i32> {
    let color = if args.off {
        Rgb::OFF
    } else {
        args.rgb.unwrap_or(Rgb::OFF)
    };

    let mut rover = link.connect()?;
    rover
        .set_leds(args.group.into(), color)
        .map_err(|err| rover_error("set leds failed", err))?;
    Ok(SUCCESS)
}
