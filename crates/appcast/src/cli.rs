use std::path::PathBuf;

use appcast_core::{RemindLater, RemindLaterUnit};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "appcast")]
#[command(version, about = "Check an appcast feed for application updates")]
pub struct Cli {
    /// Settings file to use instead of the per-user one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr and the log file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Feed URL (overrides the settings file)
    #[arg(long, global = true)]
    pub feed_url: Option<String>,

    /// Installed application version (overrides the settings file)
    #[arg(long, global = true)]
    pub installed: Option<String>,

    /// Publisher name used to namespace stored decisions
    #[arg(long, global = true)]
    pub publisher: Option<String>,

    /// Application name used to namespace stored decisions
    #[arg(long, global = true)]
    pub app_name: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one update check and print the outcome
    Check {
        /// Wait through a pending remind-later deadline instead of exiting
        #[arg(long)]
        wait: bool,

        /// Open the download page when an update is available
        #[arg(long)]
        open: bool,
    },
    /// Stop offering this version (and older ones)
    Skip {
        version: String,
    },
    /// Postpone update checks
    ///
    /// `remind-later 3 hours`, `remind-later hours` or `remind-later 3`; missing
    /// parts come from the configured interval.
    RemindLater {
        /// How many units to wait, or a unit on its own
        #[arg(value_name = "AMOUNT|UNIT", value_parser = parse_lead)]
        lead: Option<Lead>,

        unit: Option<UnitArg>,
    },
    /// Show the stored skip and remind-later decisions
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitArg {
    Minutes,
    Hours,
    Days,
}

/// First `remind-later` argument: a count, or a unit standing alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lead {
    Amount(u32),
    Unit(UnitArg),
}

fn parse_lead(raw: &str) -> Result<Lead, String> {
    if let Ok(amount) = raw.parse::<u32>() {
        return Ok(Lead::Amount(amount));
    }
    UnitArg::from_str(raw, true)
        .map(Lead::Unit)
        .map_err(|_| format!("expected a number or one of minutes, hours, days, got '{raw}'"))
}

/// Fill in whatever the command line left out from `configured`.
pub fn remind_later_interval(
    lead: Option<Lead>,
    unit: Option<UnitArg>,
    configured: RemindLater,
) -> Result<RemindLater, String> {
    match (lead, unit) {
        (None, _) => Ok(configured),
        (Some(Lead::Amount(amount)), Some(unit)) => Ok(RemindLater::new(amount, unit.into())),
        (Some(Lead::Amount(amount)), None) => Ok(RemindLater::new(amount, configured.unit)),
        (Some(Lead::Unit(unit)), None) => Ok(RemindLater::new(configured.amount, unit.into())),
        (Some(Lead::Unit(first)), Some(second)) => Err(format!(
            "expected an amount before '{}', got the unit '{}'",
            RemindLaterUnit::from(second),
            RemindLaterUnit::from(first)
        )),
    }
}

impl From<UnitArg> for RemindLaterUnit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Minutes => Self::Minutes,
            UnitArg::Hours => Self::Hours,
            UnitArg::Days => Self::Days,
        }
    }
}
