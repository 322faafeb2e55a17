use std::time::Duration;

use anyhow::{Context, Result, bail};
use hyprland::data::{Clients, Workspace, Workspaces};
use hyprland::dispatch::{Dispatch, DispatchType, WorkspaceIdentifierWithSpecial};
use hyprland::keyword::{Keyword, OptionValue};
use hyprland::shared::{HyprData, HyprDataActive};

use crate::desktops::{DesktopId, DesktopProvider, LiveDesktop};
use crate::launch::WindowProbe;

pub const SIGNATURE_ENV: &str = "HYPRLAND_INSTANCE_SIGNATURE";

/// Regular (non-special) Hyprland workspaces, ordered by id, act as virtual desktops.
/// Created workspaces are declared persistent so they survive being empty.
#[derive(Debug, Default)]
pub struct Hyprland;

impl Hyprland {
    pub fn detect() -> Option<Self> {
        std::env::var_os(SIGNATURE_ENV).map(|_| Self)
    }

    async fn workspaces() -> Result<Vec<Workspace>> {
        let mut wss: Vec<_> = Workspaces::get_async()
            .await
            .context("Failed to fetch workspaces")?
            .into_iter()
            .filter(|ws| ws.id > 0)
            .collect();
        wss.sort_unstable_by_key(|ws| ws.id);
        Ok(wss)
    }
}

fn workspace_id(desktop: &LiveDesktop) -> Result<i32> {
    i32::try_from(desktop.id.0).with_context(|| format!("Bad workspace id {:?}", desktop.id))
}

impl DesktopProvider for Hyprland {
    async fn desktops(&self) -> Result<Vec<LiveDesktop>> {
        Ok(Self::workspaces()
            .await?
            .into_iter()
            .map(|Workspace { id, name, .. }| LiveDesktop {
                id: DesktopId(id.into()),
                name,
            })
            .collect())
    }

    async fn create(&self) -> Result<()> {
        let next = Self::workspaces()
            .await?
            .iter()
            .map(|ws| ws.id)
            .max()
            .unwrap_or(0)
            + 1;
        Keyword::set_async(
            "workspace",
            OptionValue::String(format!("{next}, persistent:true")),
        )
        .await
        .with_context(|| format!("Failed to declare workspace {next}"))?;
        log::debug!("Declared persistent workspace {next}");
        Ok(())
    }

    async fn switch_to(&self, desktop: &LiveDesktop) -> Result<()> {
        let id = workspace_id(desktop)?;
        Dispatch::call_async(DispatchType::Workspace(WorkspaceIdentifierWithSpecial::Id(
            id,
        )))
        .await
        .with_context(|| format!("Failed to switch to workspace {id}"))
    }

    async fn current(&self) -> Result<Option<usize>> {
        let active = Workspace::get_active_async()
            .await
            .context("Failed to fetch active workspace")?;
        Ok(Self::workspaces()
            .await?
            .iter()
            .position(|ws| ws.id == active.id))
    }

    async fn set_name(&self, desktop: &LiveDesktop, name: &str) -> Result<()> {
        let id = workspace_id(desktop)?;
        Dispatch::call_async(DispatchType::RenameWorkspace(id, Some(name)))
            .await
            .with_context(|| format!("Failed to rename workspace {id}"))
    }
}

impl WindowProbe for Hyprland {
    async fn wait_input_idle(&self, _pid: u32, _timeout: Duration) -> Result<bool> {
        bail!("Hyprland has no input-idle signal")
    }

    async fn has_main_window(&self, pid: u32) -> Result<bool> {
        let Ok(pid) = i32::try_from(pid) else {
            return Ok(false);
        };
        let clients = Clients::get_async()
            .await
            .context("Failed to list Hyprland clients")?;
        Ok(clients.into_iter().any(|client| client.pid == pid))
    }
}
