use std::{ffi::OsString, path::Path};

use anyhow::{Context, Result};

use crate::config::AppSpec;
use crate::report::{LaunchResult, LaunchStatus};

pub mod spawn;
pub mod target;
pub mod wait;

pub use spawn::{CommandSpec, ProcessSpawner, SpawnedProcess, TokioSpawner};
pub use target::Target;
pub use wait::{Readiness, WindowProbe, await_ready};

#[derive(Debug)]
pub struct Launched {
    pub result: LaunchResult,
    /// Only set for directly spawned executables.
    pub process: Option<SpawnedProcess>,
}

impl Launched {
    fn skipped(status: LaunchStatus) -> Self {
        Self {
            result: LaunchResult::new(status),
            process: None,
        }
    }
}

/// Starts `app`. Skips come back as `Ok`, failures to start as `Err`.
pub async fn launch(app: &AppSpec, spawner: &impl ProcessSpawner) -> Result<Launched> {
    let resolved = target::resolve_path(&app.path);
    let Some(target) = target::classify(&resolved) else {
        log::info!("[SKIP] {}: no path specified", app.display_name());
        return Ok(Launched::skipped(LaunchStatus::SkippedNoPath));
    };

    match target {
        Target::Shell(uri) => {
            log::info!("Opening '{}': {uri}", app.display_name());
            spawner.shell_open(&uri).await?;
            Ok(Launched {
                result: LaunchResult::new(LaunchStatus::Done),
                process: None,
            })
        }
        Target::Executable(path) => {
            let Some(exe) = target::find_executable(&path) else {
                log::warn!("[SKIP] Not found: {}", path.display());
                return Ok(Launched::skipped(LaunchStatus::SkippedNotFound));
            };
            let spec = command_spec(&exe, app.args.as_deref())?;
            log::info!(
                "Launching '{}': {} {}",
                app.display_name(),
                exe.display(),
                app.args.as_deref().unwrap_or_default()
            );
            let process = spawner.spawn(&spec, app.display_name()).await?;
            Ok(Launched {
                result: LaunchResult::new(LaunchStatus::Done),
                process: Some(process),
            })
        }
    }
}

pub fn command_spec(exe: &Path, args: Option<&str>) -> Result<CommandSpec> {
    let args = match args.map(str::trim) {
        Some(args) if !args.is_empty() => shell_words::split(args)
            .with_context(|| format!("Invalid arguments {args:?}"))?
            .into_iter()
            .map(OsString::from)
            .collect(),
        _ => Vec::new(),
    };
    Ok(CommandSpec {
        program: exe.to_path_buf(),
        args,
        cwd: exe.parent().map(Path::to_path_buf),
    })
}
