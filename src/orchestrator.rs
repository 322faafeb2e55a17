use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;

use crate::config::WorkspaceConfig;
use crate::desktops::{self, DesktopProvider, LiveDesktop};
use crate::launch::{self, Launched, ProcessSpawner, WindowProbe};
use crate::plan::{PlannedLaunch, plan};
use crate::report::{LaunchResult, LaunchStatus, Report, Results};
use crate::utils::{ResultExt as _, sleep_or_cancel};

pub const CANCELLED_DETAIL: &str = "Cancelled before launch";

pub struct Orchestrator<'a, D, S, W> {
    pub config: &'a WorkspaceConfig,
    pub desktops: &'a D,
    pub spawner: &'a S,
    pub probe: &'a W,
    pub cancel: CancellationToken,
}

/// Provisioned desktops and the launch sequence over them.
pub struct Prepared<'a> {
    pub live: Vec<LiveDesktop>,
    pub steps: Vec<PlannedLaunch<'a>>,
}

impl<'a, D, S, W> Orchestrator<'a, D, S, W>
where
    D: DesktopProvider,
    S: ProcessSpawner,
    W: WindowProbe,
{
    pub async fn run(&self) -> Result<Report> {
        let prepared = self.prepare().await?;
        self.execute(prepared).await
    }

    pub async fn prepare(&self) -> Result<Prepared<'a>> {
        let before = self
            .desktops
            .desktops()
            .await
            .context("Failed to enumerate desktops")?
            .len();
        let live = desktops::ensure(self.config, self.desktops).await?;
        log::info!("Desktops before={before} after={}", live.len());

        let current = self
            .desktops
            .current()
            .await
            .context("Failed to read the active desktop")
            .ok_or_log()
            .flatten();
        log::info!("Current desktop index: {current:?}");

        let steps = plan(self.config, &live, current);
        if let Some(step) = steps.iter().find(|step| step.desktop >= live.len()) {
            bail!(
                "'{}' resolved to desktop {} but only {} exist after provisioning \
                 (identifiers like \"desktop N\" do not create desktops, use a plain index)",
                step.app.display_name(),
                step.desktop,
                live.len()
            );
        }

        Ok(Prepared { live, steps })
    }

    pub async fn execute(&self, prepared: Prepared<'a>) -> Result<Report> {
        let Prepared { live, steps } = prepared;
        let mut results = Results::new(self.config, &steps);
        let mut active = None;
        let mut cancelled = false;

        for step in &steps {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            if active != Some(step.desktop) {
                let desktop = &live[step.desktop];
                if let Err(err) = self.desktops.switch_to(desktop).await {
                    log::error!("[ERROR] {}: {err:#}", step.app.display_name());
                    results.record(
                        step.slot,
                        LaunchResult::with_detail(LaunchStatus::Error, format!("{err:#}")),
                    );
                    continue;
                }
                active = Some(step.desktop);
                log::info!(
                    "Switched to desktop {} ({})",
                    step.desktop,
                    self.config.desktop_label(step.desktop)
                );
                if !sleep_or_cancel(self.config.settle_delay(), &self.cancel).await {
                    cancelled = true;
                    break;
                }
            }

            let result = self.launch_step(step).await;
            results.record(step.slot, result);
        }

        if cancelled {
            let n = results.fail_pending(CANCELLED_DETAIL);
            log::warn!("Launch sequence cancelled, {n} app(s) not launched");
        }

        self.spawner.shutdown(self.config.output_grace()).await;
        Ok(results.finish(cancelled))
    }

    async fn launch_step(&self, step: &PlannedLaunch<'_>) -> LaunchResult {
        let app = step.app;
        let name = app.display_name();
        log::debug!("Launching '{name}' on desktop index={}", step.desktop);

        let Launched { result, process } = match launch::launch(app, self.spawner).await {
            Ok(launched) => launched,
            Err(err) => {
                log::error!("[ERROR] {name}: {err:#}");
                return LaunchResult::with_detail(LaunchStatus::Error, format!("{err:#}"));
            }
        };
        if result.status != LaunchStatus::Done {
            return result;
        }

        if app.wait_for_window {
            match &process {
                Some(process) => {
                    let readiness = launch::await_ready(
                        self.probe,
                        process,
                        name,
                        app.launch_timeout(),
                        &self.cancel,
                    )
                    .await;
                    log::debug!("'{name}' readiness: {readiness:?}");
                }
                None => log::debug!("'{name}' was shell-opened, not waiting for a window"),
            }
        }

        sleep_or_cancel(self.config.launch_delay(), &self.cancel).await;
        result
    }
}
