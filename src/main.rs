use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context as _, Result, anyhow, bail};
use tokio_util::sync::CancellationToken;

use crate::clients::hypr::{self, Hyprland};
use crate::launch::TokioSpawner;
use crate::orchestrator::Orchestrator;
use crate::report::Results;
use crate::utils::sleep_or_cancel;

mod clients;
mod config;
mod desktops;
mod launch;
mod logging;
mod orchestrator;
mod plan;
mod report;
mod session;
mod utils;

const USAGE: &str = "\
Usage: bootspace [--config <path>] [--dry-run] [--force]

  --config <path>  workspace file (default: $BOOTSPACE_CONFIG, then the user config dir)
  --dry-run        provision desktops and print the launch plan without starting anything
  --force          run even if the previous run started moments ago
";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    dry_run: bool,
    force: bool,
}

/// `Ok(None)` means help was requested.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Args>> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(path.into());
            }
            "--dry-run" => parsed.dry_run = true,
            "--force" => parsed.force = true,
            "-h" | "--help" => return Ok(None),
            other => bail!("Unknown argument {other:?}"),
        }
    }
    Ok(Some(parsed))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<ExitCode> {
    let Some(args) = parse_args(std::env::args().skip(1))? else {
        print!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    };
    logging::init_logger(logging::default_log_path());

    run(args).await.inspect_err(|err| log::error!("{err:#}"))
}

async fn run(args: Args) -> Result<ExitCode> {
    let now = chrono::Local::now();
    log::info!("---- bootspace run at {} ----", now.format("%Y-%m-%d %H:%M:%S"));

    let config_path = config::locate(args.config)?;
    log::info!("Config: {}", config_path.display());
    let config = config::load(&config_path)?;
    log::info!(
        "Apps: {}, configured desktops: {}",
        config.apps.len(),
        config.desktops.len()
    );

    if !args.force
        && !args.dry_run
        && let Some(dir) = session::state_dir()
    {
        if session::ran_recently(&dir, config.recent_run_window(), now) {
            log::info!(
                "Previous run started less than {}s ago, nothing to do",
                config.recent_run_seconds
            );
            return Ok(ExitCode::SUCCESS);
        }
        session::record_run(&dir, now);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        }
    });

    if !sleep_or_cancel(config.startup_delay(), &cancel).await {
        bail!("Cancelled during the startup delay");
    }

    let desktops = Hyprland::detect().ok_or_else(|| {
        anyhow!(
            "No desktop backend available (${} is not set)",
            hypr::SIGNATURE_ENV
        )
    })?;
    let count = session::wait_for_session(&desktops, config.session_timeout(), &cancel).await?;
    log::info!("Desktop session ready with {count} desktop(s)");

    let spawner = TokioSpawner::new();
    let orchestrator = Orchestrator {
        config: &config,
        desktops: &desktops,
        spawner: &spawner,
        probe: &desktops,
        cancel,
    };

    if args.dry_run {
        let prepared = orchestrator.prepare().await?;
        let plan = Results::new(&config, &prepared.steps).finish(false);
        println!("{plan}");
        return Ok(ExitCode::SUCCESS);
    }

    let report = orchestrator.run().await?;
    println!("{report}");
    let tally = report.tally();
    log::info!(
        "Finished: {} launched, {} skipped, {} failed",
        tally.done,
        tally.skipped,
        tally.failed
    );

    Ok(if report.cancelled {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
