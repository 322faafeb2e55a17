use crate::config::{AppSpec, WorkspaceConfig};
use crate::desktops::{LiveDesktop, resolve};

/// One step of the launch sequence. `slot` is the app's position in the config and serves as
/// its identity, since names may repeat.
#[derive(Clone, Copy, Debug)]
pub struct PlannedLaunch<'a> {
    pub desktop: usize,
    pub slot: usize,
    pub app: &'a AppSpec,
}

/// Distinct target desktops in first-seen order, the current one moved to the front.
pub fn desktop_order(targets: &[usize], current: Option<usize>) -> Vec<usize> {
    let mut order = Vec::new();
    for &idx in targets {
        if !order.contains(&idx) {
            order.push(idx);
        }
    }
    if let Some(cur) = current
        && let Some(pos) = order.iter().position(|&idx| idx == cur)
    {
        let cur = order.remove(pos);
        order.insert(0, cur);
    }
    order
}

pub fn plan<'a>(
    config: &'a WorkspaceConfig,
    live: &[LiveDesktop],
    current: Option<usize>,
) -> Vec<PlannedLaunch<'a>> {
    let targets: Vec<usize> = config
        .apps
        .iter()
        .map(|app| resolve(&app.desktop, config, live))
        .collect();

    let mut steps = Vec::with_capacity(config.apps.len());
    for desktop in desktop_order(&targets, current) {
        let mut group: Vec<_> = config
            .apps
            .iter()
            .enumerate()
            .filter(|&(slot, _)| targets[slot] == desktop)
            .map(|(slot, app)| PlannedLaunch { desktop, slot, app })
            .collect();
        // Window waiters first, then by name.
        group.sort_by(|a, b| {
            b.app
                .wait_for_window
                .cmp(&a.app.wait_for_window)
                .then_with(|| a.app.name.cmp(&b.app.name))
        });
        steps.extend(group);
    }
    steps
}
