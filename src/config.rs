use std::{
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use json_comments::CommentSettings;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const CONFIG_ENV: &str = "BOOTSPACE_CONFIG";
pub const CONFIG_FILE_NAME: &str = "workspace.json";
pub const APP_DIR_NAME: &str = "bootspace";

const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(45);

// Keys are matched after lowercasing, see `fold_keys`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DesktopSpec {
    pub index: usize,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default = "default_desktop", deserialize_with = "string_or_int")]
    pub desktop: String,
    #[serde(default, rename = "waitforwindow")]
    pub wait_for_window: bool,
    /// Milliseconds. Unset or non-positive means [`DEFAULT_LAUNCH_TIMEOUT`].
    #[serde(default, rename = "launchtimeoutms")]
    pub launch_timeout_ms: Option<i64>,
}

impl AppSpec {
    pub fn launch_timeout(&self) -> Duration {
        match self.launch_timeout_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms.unsigned_abs()),
            _ => DEFAULT_LAUNCH_TIMEOUT,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "(unnamed)"
        } else {
            &self.name
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub desktops: Vec<DesktopSpec>,
    #[serde(default)]
    pub apps: Vec<AppSpec>,
    #[serde(default = "default_launch_delay_ms", rename = "launchdelayms")]
    pub launch_delay_ms: u64,
    #[serde(default = "default_settle_delay_ms", rename = "settledelayms")]
    pub settle_delay_ms: u64,
    #[serde(default, rename = "startupdelayms")]
    pub startup_delay_ms: u64,
    #[serde(default = "default_session_timeout_ms", rename = "sessiontimeoutms")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_recent_run_seconds", rename = "recentrunseconds")]
    pub recent_run_seconds: u64,
    #[serde(default = "default_output_grace_ms", rename = "outputgracems")]
    pub output_grace_ms: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            desktops: Vec::new(),
            apps: Vec::new(),
            launch_delay_ms: default_launch_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            startup_delay_ms: 0,
            session_timeout_ms: default_session_timeout_ms(),
            recent_run_seconds: default_recent_run_seconds(),
            output_grace_ms: default_output_grace_ms(),
        }
    }
}

impl WorkspaceConfig {
    pub fn launch_delay(&self) -> Duration {
        Duration::from_millis(self.launch_delay_ms)
    }
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
    pub fn recent_run_window(&self) -> Duration {
        Duration::from_secs(self.recent_run_seconds)
    }
    pub fn output_grace(&self) -> Duration {
        Duration::from_millis(self.output_grace_ms)
    }

    /// Configured name for `index`, or `Desktop N`.
    pub fn desktop_label(&self, index: usize) -> String {
        self.desktops
            .iter()
            .find(|d| d.index == index)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("Desktop {index}"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.apps.is_empty() {
            bail!("Config has no 'apps' entries");
        }
        for app in &self.apps {
            if let Ok(n) = app.desktop.trim().parse::<i64>()
                && n < 0
            {
                bail!(
                    "App '{}' targets negative desktop index {n}",
                    app.display_name()
                );
            }
        }
        Ok(())
    }
}

/// Parses a workspace file. Keys are case-insensitive; `//` and `/* */` comments and trailing
/// commas are accepted. Unknown keys are rejected.
pub fn parse(json: &str) -> Result<WorkspaceConfig> {
    let mut text = String::new();
    CommentSettings::c_style()
        .strip_comments(json.as_bytes())
        .read_to_string(&mut text)
        .context("Invalid config JSON")?;
    let raw: Value = serde_json::from_str(&text).context("Invalid config JSON")?;
    let cfg: WorkspaceConfig =
        serde_json::from_value(fold_keys(raw)?).context("Invalid config")?;
    cfg.validate()?;
    Ok(cfg)
}

fn fold_keys(value: Value) -> Result<Value> {
    Ok(match value {
        Value::Object(map) => {
            let mut folded = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                let lower = key.to_lowercase();
                if folded.contains_key(&lower) {
                    bail!("Duplicate key {key:?} (keys are case-insensitive)");
                }
                folded.insert(lower, fold_keys(val)?);
            }
            Value::Object(folded)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(fold_keys)
                .collect::<Result<Vec<_>>>()?,
        ),
        other => other,
    })
}

pub fn load(path: &Path) -> Result<WorkspaceConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse(&json).with_context(|| format!("Failed to load config file '{}'", path.display()))
}

/// Explicit path, then `$BOOTSPACE_CONFIG`, then the user config dir, then next to the binary.
pub fn locate(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(path.into());
    }

    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join(CONFIG_FILE_NAME));
    }

    match candidates.iter().find(|path| path.is_file()) {
        Some(path) => Ok(path.clone()),
        None => bail!(
            "Config file not found, tried: {}",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn default_desktop() -> String {
    "0".into()
}
fn default_launch_delay_ms() -> u64 {
    800
}
fn default_settle_delay_ms() -> u64 {
    500
}
fn default_session_timeout_ms() -> u64 {
    30_000
}
fn default_recent_run_seconds() -> u64 {
    3
}
fn default_output_grace_ms() -> u64 {
    2_000
}

fn string_or_int<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Null(()),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Null(()) => default_desktop(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "desktops": [
            { "index": 0, "name": "Thing 1" },
            { "index": 1, "name": "Thing 2" }
        ],
        "apps": [
            { "name": "Mail", "path": "/usr/bin/thunderbird", "desktop": "Thing 1", "waitForWindow": true },
            { "name": "Term", "path": "kitty", "args": "--single-instance", "desktop": 1, "launchTimeoutMs": 100 }
        ],
        "launchDelayMs": 1500
    }"#;

    #[test]
    fn parses_sample_config() {
        let cfg = parse(SAMPLE).unwrap();
        assert_eq!(cfg.desktops.len(), 2);
        assert_eq!(cfg.apps[0].desktop, "Thing 1");
        assert!(cfg.apps[0].wait_for_window);
        assert_eq!(cfg.apps[1].desktop, "1");
        assert_eq!(cfg.apps[1].args.as_deref(), Some("--single-instance"));
        assert_eq!(cfg.launch_delay(), Duration::from_millis(1500));
        assert_eq!(cfg.settle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn launch_timeout_defaults_when_unset_or_non_positive() {
        let cfg = parse(SAMPLE).unwrap();
        assert_eq!(cfg.apps[0].launch_timeout(), Duration::from_secs(45));
        assert_eq!(cfg.apps[1].launch_timeout(), Duration::from_millis(100));

        let app = AppSpec {
            launch_timeout_ms: Some(-5),
            ..cfg.apps[1].clone()
        };
        assert_eq!(app.launch_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        let cfg = parse(r#"{ "apps": [ { "name": "x", "path": "y" } ] }"#).unwrap();
        assert_eq!(cfg.apps[0].desktop, "0");
        assert!(!cfg.apps[0].wait_for_window);
        assert_eq!(cfg.launch_delay(), Duration::from_millis(800));
        assert_eq!(cfg.recent_run_window(), Duration::from_secs(3));
    }

    #[test]
    fn rejects_config_without_apps() {
        let err = parse(r#"{ "desktops": [], "apps": [] }"#).unwrap_err();
        assert!(err.to_string().contains("no 'apps'"));
    }

    #[test]
    fn rejects_negative_numeric_desktop() {
        let err = parse(r#"{ "apps": [ { "name": "x", "path": "y", "desktop": "-1" } ] }"#)
            .unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn desktop_label_falls_back_to_number() {
        let cfg = parse(SAMPLE).unwrap();
        assert_eq!(cfg.desktop_label(1), "Thing 2");
        assert_eq!(cfg.desktop_label(4), "Desktop 4");
    }

    #[test]
    fn keys_are_case_insensitive() {
        let cfg = parse(
            r#"{
                "Desktops": [ { "Index": 1, "NAME": "Chat" } ],
                "Apps": [
                    { "Name": "Mail", "Path": "/bin/true", "WaitForWindow": true, "LaunchTimeoutMs": 100 }
                ],
                "LaunchDelayMs": 50,
                "settledelayms": 10
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.desktop_label(1), "Chat");
        assert!(cfg.apps[0].wait_for_window);
        assert_eq!(cfg.apps[0].launch_timeout(), Duration::from_millis(100));
        assert_eq!(cfg.launch_delay(), Duration::from_millis(50));
        assert_eq!(cfg.settle_delay(), Duration::from_millis(10));
    }

    #[test]
    fn comments_and_trailing_commas_are_accepted() {
        let cfg = parse(
            r#"{
                // restored at login
                "apps": [
                    { "name": "Web", /* inline */ "path": "https://example.com/a//b", },
                ],
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.apps.len(), 1);
        assert_eq!(cfg.apps[0].path, "https://example.com/a//b");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse(r#"{ "apps": [ { "name": "x", "path": "y", "waitForWindows": true } ] }"#)
            .unwrap_err();
        assert!(format!("{err:#}").contains("waitforwindows"));

        let err = parse(r#"{ "apps": [ { "name": "x" } ], "lauchDelayMs": 5 }"#).unwrap_err();
        assert!(format!("{err:#}").contains("lauchdelayms"));
    }

    #[test]
    fn keys_differing_only_in_case_conflict() {
        let err = parse(r#"{ "apps": [ { "name": "x" } ], "Apps": [] }"#).unwrap_err();
        assert!(err.to_string().contains("Duplicate key"));
    }

    #[test]
    fn load_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn locate_prefers_explicit_path() {
        let path = PathBuf::from("/tmp/custom.json");
        assert_eq!(locate(Some(path.clone())).unwrap(), path);
    }
}
