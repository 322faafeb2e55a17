use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::launch::SpawnedProcess;
use crate::utils::sleep_or_cancel;

pub const INPUT_IDLE_CAP: Duration = Duration::from_secs(8);
pub const POLL_INTERVAL: Duration = Duration::from_millis(150);

#[allow(async_fn_in_trait)]
pub trait WindowProbe {
    /// Waits until `pid` accepts input, for at most `timeout`. `Ok(false)` means the process
    /// did not get there in time. Errors mean the signal is not available.
    async fn wait_input_idle(&self, pid: u32, timeout: Duration) -> Result<bool>;
    async fn has_main_window(&self, pid: u32) -> Result<bool>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    InputIdle,
    Window,
    TimedOut,
    Exited,
    Cancelled,
    Untracked,
}

/// Best-effort wait for `process` to become usable. Never exceeds `timeout`.
pub async fn await_ready(
    probe: &impl WindowProbe,
    process: &SpawnedProcess,
    app_name: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Readiness {
    let Some(pid) = process.pid else {
        log::debug!("{app_name} has no process id, not waiting for a window");
        return Readiness::Untracked;
    };
    let deadline = Instant::now() + timeout;

    let idle_budget = timeout.min(INPUT_IDLE_CAP);
    let idle = cancel
        .run_until_cancelled(tokio::time::timeout(
            idle_budget,
            probe.wait_input_idle(pid, idle_budget),
        ))
        .await;
    match idle {
        None => return Readiness::Cancelled,
        Some(Ok(Ok(true))) => return Readiness::InputIdle,
        Some(Ok(Ok(false))) | Some(Err(_)) => return timed_out(app_name, timeout),
        Some(Ok(Err(err))) => log::debug!("Input-idle wait unavailable for {app_name}: {err:#}"),
    }

    loop {
        match probe.has_main_window(pid).await {
            Ok(true) => return Readiness::Window,
            Ok(false) => {}
            Err(err) => log::debug!("Window probe for {app_name} failed: {err:#}"),
        }
        if process.has_exited() {
            log::warn!("{app_name} exited before a window was detected");
            return Readiness::Exited;
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        if !sleep_or_cancel(POLL_INTERVAL.min(deadline - now), cancel).await {
            return Readiness::Cancelled;
        }
    }

    timed_out(app_name, timeout)
}

fn timed_out(app_name: &str, timeout: Duration) -> Readiness {
    log::warn!(
        "{app_name} window not detected within {}ms",
        timeout.as_millis()
    );
    Readiness::TimedOut
}
