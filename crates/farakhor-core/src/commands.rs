use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use tracing::{debug, info, instrument};

use crate::calendar::to_gregorian_date;
use crate::catalog::{CatalogSource, FileOccasionSource, HttpOccasionSource};
use crate::cli::{Command, MonthTarget, parse_day_arg};
use crate::clock::{ClockReading, clock_size_for_width};
use crate::config::Config;
use crate::controller::{Controller, SystemToday, Today};
use crate::render::Renderer;
use crate::timezone::resolve_timezone;

type MonthController = Controller<CatalogSource, SystemToday>;

pub fn known_command_names() -> Vec<&'static str> {
    vec!["month", "show", "browse", "today", "clock", "config"]
}

/// Falls back to `default.command` when no subcommand was given.
pub fn resolve_command(cfg: &Config, command: Option<Command>) -> anyhow::Result<Command> {
    if let Some(command) = command {
        return Ok(command);
    }

    let name = cfg
        .get("default.command")
        .unwrap_or_else(|| "month".to_string());
    debug!(command = %name, "no explicit command, using default");

    match name.trim() {
        "month" => Ok(Command::Month {
            target: MonthTarget::default(),
            json: false,
        }),
        "browse" => Ok(Command::Browse),
        "today" => Ok(Command::Today),
        "clock" => Ok(Command::Clock {
            width: 1024,
            watch: false,
        }),
        "config" => Ok(Command::Config),
        other => Err(anyhow!(
            "unknown default.command: {other} (expected one of {})",
            known_command_names().join(", ")
        )),
    }
}

/// `--catalog` beats `--base-url`, which beats the rc file.
#[instrument(skip(cfg))]
pub fn build_source(
    cfg: &Config,
    base_url: Option<&str>,
    catalog: Option<&Path>,
) -> anyhow::Result<CatalogSource> {
    if let Some(path) = catalog {
        return Ok(CatalogSource::File(FileOccasionSource::new(path)));
    }

    if base_url.is_none()
        && let Some(path) = cfg.catalog_path()
    {
        return Ok(CatalogSource::File(FileOccasionSource::new(path)));
    }

    let base_url = base_url
        .map(str::to_string)
        .or_else(|| cfg.get("occasions.base_url"))
        .context("occasions.base_url is not configured")?;
    let source = HttpOccasionSource::new(&base_url, cfg.fetch_timeout()?)
        .context("failed to configure occasions endpoint")?;
    Ok(CatalogSource::Http(source))
}

#[instrument(skip(cfg, source, renderer))]
pub async fn dispatch(
    cfg: &Config,
    source: CatalogSource,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    info!(source = %source.describe(), "dispatching command");

    match command {
        Command::Month { target, json } => cmd_month(cfg, source, renderer, target, json).await,
        Command::Show { day, target } => cmd_show(cfg, source, renderer, day, target).await,
        Command::Browse => cmd_browse(cfg, source, renderer).await,
        Command::Today => cmd_today(cfg, renderer),
        Command::Clock { width, watch } => cmd_clock(renderer, width, watch).await,
        Command::Config => renderer.print_config(cfg),
    }
}

fn month_controller(cfg: &Config, source: CatalogSource) -> anyhow::Result<MonthController> {
    let today = SystemToday::new(resolve_timezone(cfg));
    Controller::new(source, today, cfg.leap_rule()?).context("failed to determine today's date")
}

async fn open_month(
    cfg: &Config,
    source: CatalogSource,
    target: MonthTarget,
) -> anyhow::Result<MonthController> {
    let mut ctl = month_controller(cfg, source)?;
    match (target.year, target.month) {
        (None, None) => ctl.mount().await,
        (year, month) => {
            let state = ctl.state();
            let year = year.unwrap_or(state.current_year);
            let month = month.unwrap_or(state.current_month);
            ctl.load_month(year, month).await;
        }
    }
    Ok(ctl)
}

async fn cmd_month(
    cfg: &Config,
    source: CatalogSource,
    renderer: &mut Renderer,
    target: MonthTarget,
    json: bool,
) -> anyhow::Result<()> {
    let ctl = open_month(cfg, source, target).await?;

    if json {
        let text = serde_json::to_string_pretty(&ctl.state().events)?;
        println!("{text}");
        return Ok(());
    }

    renderer.print_month(ctl.state())
}

async fn cmd_show(
    cfg: &Config,
    source: CatalogSource,
    renderer: &mut Renderer,
    day: u32,
    target: MonthTarget,
) -> anyhow::Result<()> {
    let mut ctl = open_month(cfg, source, target).await?;
    let state = ctl.state();
    let month = state.current_month;
    let has_occasion = state
        .events
        .iter()
        .any(|occasion| state.display_day(occasion) == day);
    let is_leap = state.is_leap;

    match ctl.select_day(day) {
        Some(occasion) => renderer.print_occasion(occasion, is_leap),
        None if has_occasion => bail!("the occasion on {day} {month} has no detail panel"),
        None => bail!("no occasion on {day} {month}"),
    }
}

async fn cmd_browse(
    cfg: &Config,
    source: CatalogSource,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    let mut ctl = month_controller(cfg, source)?;
    ctl.mount().await;
    renderer.print_month(ctl.state())?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("[n]ext [p]rev [t]oday <day> [c]lose [q]uit > ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("failed to read from stdin")?;
        let input = line.trim();
        debug!(input, "browse input");

        match input {
            "" => continue,
            "q" | "quit" => break,
            "n" | "next" => ctl.navigate_month(1).await,
            "p" | "prev" => ctl.navigate_month(-1).await,
            "t" | "today" => ctl.jump_to_today().await?,
            "c" | "close" => ctl.dismiss_modal(),
            other => match parse_day_arg(other) {
                Ok(day) => {
                    if ctl.select_day(day).is_none() {
                        println!("no detail panel on day {day}");
                        continue;
                    }
                }
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            },
        }

        let state = ctl.state();
        match state.modal.as_ref() {
            Some(occasion) => renderer.print_occasion(occasion, state.is_leap)?,
            None => renderer.print_month(state)?,
        }
    }

    Ok(())
}

fn cmd_today(cfg: &Config, renderer: &mut Renderer) -> anyhow::Result<()> {
    let today = SystemToday::new(resolve_timezone(cfg))
        .today()
        .context("failed to determine today's date")?;
    let gregorian = to_gregorian_date(today)?;
    let is_leap = cfg.leap_rule()?.resolve(today.year);
    renderer.print_today(&today, gregorian, is_leap)
}

async fn cmd_clock(renderer: &mut Renderer, width: u32, watch: bool) -> anyhow::Result<()> {
    let size = clock_size_for_width(width);
    debug!(width, clock = size.clock, container = size.container, "sized clock");

    if !watch {
        return renderer.print_clock(&ClockReading::now(), size);
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => renderer.print_clock_tick(&ClockReading::now())?,
            result = &mut ctrl_c => {
                result.context("failed to listen for ctrl-c")?;
                println!();
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_comes_from_config() {
        let mut cfg = Config::defaults();
        assert!(matches!(
            resolve_command(&cfg, None),
            Ok(Command::Month { json: false, .. })
        ));

        cfg.apply_overrides(vec![("default.command".to_string(), "today".to_string())]);
        assert!(matches!(resolve_command(&cfg, None), Ok(Command::Today)));

        cfg.apply_overrides(vec![("default.command".to_string(), "agenda".to_string())]);
        assert!(resolve_command(&cfg, None).is_err());
    }

    #[test]
    fn explicit_catalog_wins() {
        let cfg = Config::defaults();
        let source = build_source(&cfg, None, Some(Path::new("occasions.json"))).expect("source");
        assert!(matches!(source, CatalogSource::File(_)));
    }

    #[test]
    fn configured_catalog_beats_default_endpoint() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides(vec![(
            "occasions.catalog".to_string(),
            "/srv/occasions.json".to_string(),
        )]);
        let source = build_source(&cfg, None, None).expect("source");
        assert_eq!(source.describe(), "/srv/occasions.json");
    }

    #[test]
    fn http_source_uses_occasions_path() {
        let cfg = Config::defaults();
        let source = build_source(&cfg, Some("https://gahshomar.example"), None).expect("source");
        assert_eq!(source.describe(), "https://gahshomar.example/api/occasions");
    }
}
