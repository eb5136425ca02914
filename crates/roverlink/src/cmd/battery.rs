use crate::cmd::LinkArgs;
use crate::exit::{rover_error, CliResult, SUCCESS};
use crate::output::{print_record, BatteryOutput, OutputFormat};

pub fn run(link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let mut rover = link.connect()?;
    let battery_percent = rover
        .battery_percentage()
        .map_err(|err| rover_error("battery query failed", err))?;

    print_record(&BatteryOutput { battery_percent }, format);
    Ok(SUCCESS)
}
