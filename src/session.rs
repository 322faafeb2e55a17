use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Local};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::APP_DIR_NAME;
use crate::desktops::DesktopProvider;
use crate::utils::{ResultExt as _, sleep_or_cancel};

pub const LAST_RUN_FILE: &str = "last_run";
pub const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn state_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join(APP_DIR_NAME))
}

/// Polls the provider until it can enumerate desktops. Returns the live count.
pub async fn wait_for_session(
    provider: &impl DesktopProvider,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<usize> {
    let deadline = Instant::now() + timeout;
    loop {
        let err = match provider.desktops().await {
            Ok(live) => return Ok(live.len()),
            Err(err) => err,
        };
        let now = Instant::now();
        if now >= deadline {
            return Err(err.context(format!(
                "Desktop session not available after {}ms",
                timeout.as_millis()
            )));
        }
        log::debug!("Desktop session not ready yet: {err:#}");
        if !sleep_or_cancel(SESSION_POLL_INTERVAL.min(deadline - now), cancel).await {
            bail!("Cancelled while waiting for the desktop session");
        }
    }
}

/// Whether a run started within `window` before `now`. Unreadable stamps count as no run.
pub fn ran_recently(dir: &Path, window: Duration, now: DateTime<Local>) -> bool {
    if window.is_zero() {
        return false;
    }
    let Some(previous) = read_stamp(&dir.join(LAST_RUN_FILE)).ok_or_debug() else {
        return false;
    };
    let age = now.fixed_offset() - previous;
    age >= chrono::TimeDelta::zero() && age.to_std().is_ok_and(|age| age < window)
}

pub fn record_run(dir: &Path, now: DateTime<Local>) {
    let write = || -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(LAST_RUN_FILE);
        std::fs::write(&path, now.to_rfc3339())
            .with_context(|| format!("Failed to write {}", path.display()))
    };
    write().ok_or_log();
}

fn read_stamp(path: &Path) -> Result<DateTime<FixedOffset>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    DateTime::parse_from_rfc3339(raw.trim())
        .with_context(|| format!("Bad timestamp in {}", path.display()))
}
