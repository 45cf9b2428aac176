use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use super::parse_threshold;
use crate::core::Config;
use crate::ui::print_thresholds;

/// Show or edit the persisted alert thresholds
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    let mut changed = false;

    if matches.get_flag("reset") {
        config.reset_thresholds();
        changed = true;
    }

    for pair in matches.get_many::<String>("set").into_iter().flatten() {
        let (kind, value) = parse_threshold(pair)?;
        config.set_threshold(kind, value)?;
        changed = true;
    }

    if changed {
        config.save().context("Failed to save configuration")?;
        println!("{}", "Thresholds updated".green());
    }

    print_thresholds(&config.thresholds);
    Ok(())
}
