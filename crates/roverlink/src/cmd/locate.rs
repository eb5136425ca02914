use crate::cmd::{LinkArgs, LocateArgs};
use crate::exit::{rover_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_record, OutputFormat, PositionOutput};

pub fn run(args: LocateArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let mut rover = link.connect()?;
    args.transform.apply(&mut rover);

    let pose = rover
        .read_position()
        .map_err(|err| rover_error("position read failed", err))?
        .ok_or_else(|| CliError::new(FAILURE, "position stream already active"))?;

    print_record(&PositionOutput::from(pose), format);
    Ok(SUCCESS)
}
