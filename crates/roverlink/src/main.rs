mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, LinkArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "roverlink", version, about = "Rover control link CLI")]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);

    match cmd::run(cli.command, &cli.link, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_link_args_after_subcommand() {
        let cli = Cli::try_parse_from([
            "roverlink",
            "battery",
            "--port",
            "/dev/ttyS0",
            "--baud",
            "9600",
        ])
        .expect("battery args should parse");

        assert!(matches!(cli.command, Command::Battery));
        assert_eq!(cli.link.port.as_deref(), Some("/dev/ttyS0"));
        assert_eq!(cli.link.baud, 9600);
    }

    #[test]
    fn parses_power_off_delay() {
        let cli = Cli::try_parse_from(["roverlink", "power", "off", "--delay", "2"])
            .expect("power args should parse");
        assert!(matches!(
            cli.command,
            Command::Power(cmd::PowerArgs {
                action: cmd::PowerAction::Off { delay: 2 }
            })
        ));
    }

    #[test]
    fn rejects_color_with_off() {
        let err = Cli::try_parse_from(["roverlink", "leds", "--off", "--rgb", "1,2,3"])
            .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_watch_count() {
        let cli = Cli::try_parse_from(["roverlink", "watch", "--count", "3", "--period", "50"])
            .expect("watch args should parse");
        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.count, Some(3));
        assert_eq!(args.period, 50);
    }
}
