use std::{ffi::OsString, path::PathBuf, process::Stdio, sync::Arc, sync::Mutex, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt as _, AsyncRead, BufReader},
    process::Command,
    task::JoinSet,
};

use crate::utils::{WatchRx, lock_mutex, watch_chan};

pub const CHILD_LOG_TARGET: &str = "child";

/// Argv-style invocation, no shell involved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

/// A child started by the spawner. Dropping it neither kills nor detaches the child, the
/// spawner's supervisor keeps reaping it.
#[derive(Clone, Debug)]
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    exited: WatchRx<bool>,
}

impl SpawnedProcess {
    pub fn new(pid: Option<u32>, exited: WatchRx<bool>) -> Self {
        Self { pid, exited }
    }
    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }
}

#[allow(async_fn_in_trait)]
pub trait ProcessSpawner {
    /// Starts `spec` with stdout/stderr captured into the log under `label`.
    async fn spawn(&self, spec: &CommandSpec, label: &str) -> Result<SpawnedProcess>;
    /// Opens a URI or shell reference with the platform opener. No handle is kept.
    async fn shell_open(&self, target: &str) -> Result<()>;
    /// Joins supervised tasks, abandoning whatever has not finished within `grace`.
    async fn shutdown(&self, grace: Duration);
}

/// Spawns through `tokio::process`. Every child gets a supervisor task that pumps its output
/// into the log and reaps it.
#[derive(Default)]
pub struct TokioSpawner {
    tasks: Mutex<JoinSet<()>>,
}

impl TokioSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    fn supervise(&self, fut: impl Future<Output = ()> + Send + 'static) {
        lock_mutex(&self.tasks).spawn(fut);
    }
}

impl ProcessSpawner for TokioSpawner {
    async fn spawn(&self, spec: &CommandSpec, label: &str) -> Result<SpawnedProcess> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", spec.program.display()))?;
        let pid = child.id();

        let label: Arc<str> = label.into();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (exited_tx, exited_rx) = watch_chan(false);

        self.supervise(async move {
            let pumps = futures::future::join(
                pump_lines(stdout, label.clone(), "OUT"),
                pump_lines(stderr, label.clone(), "ERR"),
            );
            let (status, _) = futures::future::join(child.wait(), pumps).await;
            exited_tx.send_replace(true);
            match status {
                Ok(status) if status.success() => log::debug!("[{label}] exited"),
                Ok(status) => log::info!("[{label}] exited with {status}"),
                Err(err) => log::warn!("[{label}] failed to wait for exit: {err}"),
            }
        });

        Ok(SpawnedProcess::new(pid, exited_rx))
    }

    async fn shell_open(&self, target: &str) -> Result<()> {
        let (program, args) = opener(target);
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to run {program} for {target}"))?;

        let target = target.to_owned();
        self.supervise(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    log::warn!("Opener for {target} exited with {status}")
                }
                Ok(_) => {}
                Err(err) => log::warn!("Failed to wait for opener of {target}: {err}"),
            }
        });
        Ok(())
    }

    async fn shutdown(&self, grace: Duration) {
        let mut tasks = std::mem::take(&mut *lock_mutex(&self.tasks));
        let joined = tokio::time::timeout(grace, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(err) = res {
                    log::error!("Child supervisor failed: {err}");
                }
            }
        })
        .await;
        if joined.is_err() {
            log::info!(
                "Leaving {} child process(es) running, their output is no longer logged",
                tasks.len()
            );
            tasks.detach_all();
        }
    }
}

async fn pump_lines(stream: Option<impl AsyncRead + Unpin>, label: Arc<str>, kind: &str) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.is_empty() => {}
            Ok(Some(line)) => log::info!(target: CHILD_LOG_TARGET, "[{label}] {kind}: {line}"),
            Ok(None) => break,
            Err(err) => {
                log::debug!("[{label}] stopped reading {kind}: {err}");
                break;
            }
        }
    }
}

fn opener(target: &str) -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        ("cmd", vec!["/C".into(), "start".into(), String::new(), target.into()])
    } else if cfg!(target_os = "macos") {
        ("open", vec![target.into()])
    } else {
        ("xdg-open", vec![target.into()])
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawned_child_is_reaped_and_marked_exited() {
        let spawner = TokioSpawner::new();
        let spec = CommandSpec {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), "echo hello; echo oops >&2".into()],
            cwd: Some("/".into()),
        };
        let proc = spawner.spawn(&spec, "sh").await.unwrap();
        assert!(proc.pid.is_some());

        spawner.shutdown(Duration::from_secs(10)).await;
        assert!(proc.has_exited());
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let spawner = TokioSpawner::new();
        let spec = CommandSpec {
            program: "/nonexistent/binary".into(),
            args: Vec::new(),
            cwd: None,
        };
        let err = spawner.spawn(&spec, "missing").await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/binary"));
    }

    #[tokio::test]
    async fn shutdown_abandons_long_running_children() {
        let spawner = TokioSpawner::new();
        let spec = CommandSpec {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), "sleep 5".into()],
            cwd: None,
        };
        let proc = spawner.spawn(&spec, "sleeper").await.unwrap();

        let start = std::time::Instant::now();
        spawner.shutdown(Duration::from_millis(100)).await;
        assert!(start.elapsed() < Duration::from_secs(4));
        assert!(!proc.has_exited());
    }

    #[test]
    fn opener_passes_target_as_single_argument() {
        let (_, args) = opener("https://example.com/?a=1&b=2");
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/?a=1&b=2"));
    }
}
