use std::fmt;

use unicode_width::UnicodeWidthStr as _;

use crate::config::WorkspaceConfig;
use crate::plan::PlannedLaunch;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LaunchStatus {
    Pending,
    Done,
    SkippedNoPath,
    SkippedNotFound,
    Error,
}

impl LaunchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
    pub fn default_detail(self) -> &'static str {
        match self {
            Self::Pending => "",
            Self::Done => "Launched successfully",
            Self::SkippedNoPath => "No path specified",
            Self::SkippedNotFound => "Executable not found",
            Self::Error => "See log for details",
        }
    }
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "Pending",
            Self::Done => "Done",
            Self::SkippedNoPath | Self::SkippedNotFound => "Skipped",
            Self::Error => "Error",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchResult {
    pub status: LaunchStatus,
    pub detail: String,
}

impl LaunchResult {
    pub fn new(status: LaunchStatus) -> Self {
        Self {
            status,
            detail: status.default_detail().into(),
        }
    }
    pub fn with_detail(status: LaunchStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReportRow {
    pub slot: usize,
    pub app: String,
    pub desktop: String,
    pub result: LaunchResult,
}

/// One row per planned app, in plan order.
#[derive(Debug, Default)]
pub struct Results {
    rows: Vec<ReportRow>,
}

impl Results {
    pub fn new(config: &WorkspaceConfig, plan: &[PlannedLaunch]) -> Self {
        Self {
            rows: plan
                .iter()
                .map(|step| ReportRow {
                    slot: step.slot,
                    app: step.app.display_name().into(),
                    desktop: config.desktop_label(step.desktop),
                    result: LaunchResult::new(LaunchStatus::Pending),
                })
                .collect(),
        }
    }

    /// Moves a pending entry to its terminal state. Returns `false` if the slot is unknown or
    /// already terminal, in which case nothing changes.
    pub fn record(&mut self, slot: usize, result: LaunchResult) -> bool {
        let Some(row) = self.rows.iter_mut().find(|row| row.slot == slot) else {
            log::error!("No planned app in slot {slot}");
            return false;
        };
        if row.result.status.is_terminal() {
            log::error!(
                "Refusing to overwrite {} result of '{}' with {}",
                row.result.status,
                row.app,
                result.status
            );
            return false;
        }
        if !result.status.is_terminal() {
            log::error!("Refusing to reset '{}' to pending", row.app);
            return false;
        }
        row.result = result;
        true
    }

    /// Terminates every entry still pending, e.g. after cancellation.
    pub fn fail_pending(&mut self, detail: &str) -> usize {
        let mut n = 0;
        for row in &mut self.rows {
            if !row.result.status.is_terminal() {
                row.result = LaunchResult::with_detail(LaunchStatus::Error, detail);
                n += 1;
            }
        }
        n
    }

    pub fn finish(self, cancelled: bool) -> Report {
        Report {
            rows: self.rows,
            cancelled,
        }
    }
}

#[derive(Debug)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    pub cancelled: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending: usize,
}

impl Report {
    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for row in &self.rows {
            match row.result.status {
                LaunchStatus::Done => tally.done += 1,
                LaunchStatus::Error => tally.failed += 1,
                LaunchStatus::Pending => tally.pending += 1,
                LaunchStatus::SkippedNoPath | LaunchStatus::SkippedNotFound => tally.skipped += 1,
            }
        }
        tally
    }

    pub fn all_terminal(&self) -> bool {
        self.rows.iter().all(|row| row.result.status.is_terminal())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const HEADERS: [&str; 4] = ["App", "Desktop", "Status", "Details"];

        let cells: Vec<[String; 4]> = self
            .rows
            .iter()
            .map(|row| {
                [
                    row.app.clone(),
                    row.desktop.clone(),
                    row.result.status.to_string(),
                    row.result.detail.clone(),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(|h| h.width());
        for row in &cells {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.width());
            }
        }

        write_row(f, &widths, HEADERS)?;
        let rule = widths.map(|w| "-".repeat(w));
        write_row(f, &widths, rule.each_ref().map(String::as_str))?;
        for row in &cells {
            write_row(f, &widths, row.each_ref().map(String::as_str))?;
        }

        let Tally {
            done,
            skipped,
            failed,
            pending: _,
        } = self.tally();
        write!(f, "{done} launched, {skipped} skipped, {failed} failed")?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, widths: &[usize; 4], row: [&str; 4]) -> fmt::Result {
    let last = row.len() - 1;
    for (i, (cell, w)) in row.into_iter().zip(widths).enumerate() {
        if i == last {
            writeln!(f, "{cell}")?;
        } else {
            write!(f, "{cell}{}  ", " ".repeat(w - cell.width()))?;
        }
    }
    Ok(())
}
