use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::calendar::PersianMonth;
use crate::format::to_ascii_digits;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "farakhor",
    version,
    about = "Persian calendar occasions in the terminal",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "farakhorrc", global = true)]
    pub farakhorrc: Option<PathBuf>,

    /// Server hosting /api/occasions.
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Read the occasion catalog from a JSON file instead of the server.
    #[arg(long = "catalog", global = true, conflicts_with = "base_url")]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the occasions of a month.
    Month {
        #[command(flatten)]
        target: MonthTarget,

        /// Print the sorted occasions as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the detail panel of the occasion on a day.
    Show {
        #[arg(value_parser = parse_day_arg)]
        day: u32,

        #[command(flatten)]
        target: MonthTarget,
    },

    /// Step through months interactively.
    Browse,

    /// Print today's Persian and Gregorian date.
    Today,

    /// Show the Iran clock.
    Clock {
        /// Viewport width in pixels used to size the clock face.
        #[arg(long, default_value_t = 1024)]
        width: u32,

        /// Keep ticking every second until interrupted.
        #[arg(long)]
        watch: bool,
    },

    /// Print the effective configuration.
    Config,
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct MonthTarget {
    /// Persian year; defaults to the current year.
    #[arg(long, value_parser = parse_year_arg)]
    pub year: Option<i32>,

    /// Persian month name or index 1-12; defaults to the current month.
    #[arg(long, value_parser = parse_month_arg)]
    pub month: Option<PersianMonth>,
}

pub fn parse_month_arg(raw: &str) -> Result<PersianMonth, String> {
    let trimmed = raw.trim();
    let ascii = to_ascii_digits(trimmed);
    let parsed = match ascii.parse::<u32>() {
        Ok(index) => PersianMonth::from_index(index),
        Err(_) => PersianMonth::from_name(trimmed),
    };
    parsed.map_err(|err| err.to_string())
}

pub fn parse_day_arg(raw: &str) -> Result<u32, String> {
    let day = to_ascii_digits(raw.trim())
        .parse::<u32>()
        .map_err(|_| format!("not a day number: {raw}"))?;
    if (1..=31).contains(&day) {
        Ok(day)
    } else {
        Err(format!("day {day} is outside 1..=31"))
    }
}

fn parse_year_arg(raw: &str) -> Result<i32, String> {
    to_ascii_digits(raw.trim())
        .parse::<i32>()
        .map_err(|_| format!("not a year: {raw}"))
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.KEY=VALUE` / `rc.KEY:VALUE` overrides out of argv.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                rest.split_once(':')
                    .map(|(k, v)| (format!("rc.{k}"), v.to_string()))
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
