use anyhow::Result;
use clap::{Arg, Command};

use dbpulse::commands;

fn main() -> Result<()> {
    dbpulse::init_logging();

    let matches = Command::new("dbpulse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Database performance metrics collection and threshold alerting")
        .subcommand(
            Command::new("monitor")
                .about("Collect metrics from the synthetic workload and report alerts")
                .arg(
                    Arg::new("scenario")
                        .short('s')
                        .long("scenario")
                        .value_name("SCENARIO")
                        .help("Workload to simulate: normal, high-load, critical, mixed")
                        .default_value("normal")
                )
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("SECONDS")
                        .help("Seconds between collection ticks (overrides config)")
                        .value_parser(clap::value_parser!(u64).range(1..))
                )
                .arg(
                    Arg::new("ticks")
                        .short('n')
                        .long("ticks")
                        .value_name("COUNT")
                        .help("Stop after this many ticks")
                        .value_parser(clap::value_parser!(u64).range(1..))
                )
                .arg(
                    Arg::new("threshold")
                        .short('t')
                        .long("threshold")
                        .value_name("KIND=VALUE")
                        .help("Override a threshold for this run, e.g. cpu=75 (repeatable)")
                        .action(clap::ArgAction::Append)
                )
                .arg(
                    Arg::new("ignore")
                        .long("ignore")
                        .value_name("KIND")
                        .help("Disable alerting for a metric kind in this run, e.g. waits (repeatable)")
                        .action(clap::ArgAction::Append)
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print readings and alerts as JSON lines")
                        .action(clap::ArgAction::SetTrue)
                )
        )
        .subcommand(
            Command::new("thresholds")
                .about("Show or edit the persisted alert thresholds")
                .arg(
                    Arg::new("set")
                        .long("set")
                        .value_name("KIND=VALUE")
                        .help("Set a threshold, e.g. connections=150 (repeatable)")
                        .action(clap::ArgAction::Append)
                )
                .arg(
                    Arg::new("reset")
                        .long("reset")
                        .help("Restore the built-in thresholds before applying --set")
                        .action(clap::ArgAction::SetTrue)
                )
        )
        .subcommand(
            Command::new("version")
                .about("Shows version information")
        )
        .get_matches();

    match matches.subcommand() {
        Some(("monitor", sub_matches)) => {
            commands::monitor(sub_matches)?;
        }
        Some(("thresholds", sub_matches)) => {
            commands::thresholds(sub_matches)?;
        }
        Some(("version", _)) => {
            commands::version()?;
        }
        _ => {
            println!("Welcome to dbpulse!");
            println!("Use 'dbpulse --help' for more information.");
        }
    }

    Ok(())
}
