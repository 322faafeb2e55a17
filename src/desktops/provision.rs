use anyhow::{Context, Result, bail};

use crate::config::WorkspaceConfig;
use crate::desktops::{DesktopProvider, LiveDesktop, parse_index};
use crate::utils::ResultExt as _;

/// Number of desktops the config needs. App identifiers only count when they are plain
/// integers, names are never resolved here.
pub fn required_count(config: &WorkspaceConfig) -> usize {
    let from_desktops = config.desktops.iter().map(|d| d.index + 1);
    let from_apps = config
        .apps
        .iter()
        .filter_map(|app| parse_index(&app.desktop))
        .map(|n| n + 1);
    from_desktops.chain(from_apps).fold(1, usize::max)
}

/// Creates missing desktops and applies configured names. Returns the live set afterwards.
pub async fn ensure(
    config: &WorkspaceConfig,
    provider: &impl DesktopProvider,
) -> Result<Vec<LiveDesktop>> {
    let required = required_count(config);
    let mut live = provider
        .desktops()
        .await
        .context("Failed to enumerate desktops")?;

    while live.len() < required {
        let before = live.len();
        provider
            .create()
            .await
            .with_context(|| format!("Failed to create desktop {}", before + 1))?;
        // The backend decides where the new desktop lands, so always re-read.
        live = provider
            .desktops()
            .await
            .context("Failed to enumerate desktops")?;
        if live.len() <= before {
            bail!("Desktop count did not grow after creating a desktop ({before})");
        }
        log::info!("Created desktop, now {} of {required}", live.len());
    }

    for spec in &config.desktops {
        let name = spec.name.trim();
        if name.is_empty() {
            continue;
        }
        let Some(desktop) = live.get_mut(spec.index) else {
            continue;
        };
        if desktop.name == name {
            continue;
        }
        if provider
            .set_name(desktop, name)
            .await
            .with_context(|| format!("Naming desktop {} '{name}' failed", spec.index))
            .ok_or_debug()
            .is_some()
        {
            desktop.name = name.into();
        }
    }

    Ok(live)
}
