use crate::cmd::LinkArgs;
use crate::exit::{rover_error, CliResult, SUCCESS};
use crate::output::{print_record, NameOutput, OutputFormat};

pub fn run(link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let mut rover = link.connect()?;
    let name = rover
        .bluetooth_name()
        .map_err(|err| rover_error("name query failed", err))?;

    print_record(&NameOutput { name: &name }, format);
    Ok(SUCCESS)
}
