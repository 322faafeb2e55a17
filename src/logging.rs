use std::{path::PathBuf, sync::OnceLock};

use flexi_logger::{DeferredNow, Record};

use crate::config::APP_DIR_NAME;

pub const COLOR_VAR: &str = "COLOR";
pub const LOG_PATH_ENV: &str = "BOOTSPACE_LOG";
pub const LOG_FILE_NAME: &str = "bootspace.log";

static COLOR: OnceLock<bool> = OnceLock::new();

pub fn should_color() -> bool {
    COLOR.get().is_some_and(|it| *it)
}

pub fn default_log_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(LOG_PATH_ENV) {
        return Some(path.into());
    }
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR_NAME).join(LOG_FILE_NAME))
}

fn write_record(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
    color: bool,
) -> Result<(), std::io::Error> {
    let line_display = record.line();
    let line_display = if let Some(line) = &line_display {
        format_args!("{}", *line)
    } else {
        format_args!("?")
    };

    let now_display = now.format("%Y-%m-%d %H:%M:%S");
    let now_display = if color {
        format_args!("\x1b[35m{now_display}\x1b[0m")
    } else {
        format_args!("{now_display}")
    };

    let level = record.level();
    let level_colored;
    let level_display = if color {
        level_colored = flexi_logger::style(level).paint(level.to_string());
        format_args!("{level_colored}")
    } else {
        format_args!("{level}")
    };

    write!(
        w,
        "[{now_display}] {level_display} [{}:{line_display}] {}",
        record.file().unwrap_or("<unknown>"),
        record.args(),
    )
}

fn format_for_files(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    write_record(w, now, record, false)
}

fn format_for_stderr(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    write_record(w, now, record, should_color())
}

/// Logs to `log_path` (appending) and mirrors warnings to stderr. Without a path everything
/// goes to stderr.
pub fn init_logger(log_path: Option<PathBuf>) {
    let doit = || -> anyhow::Result<()> {
        use flexi_logger::*;

        let color = std::env::var(COLOR_VAR);
        let color = match color.as_deref().unwrap_or("auto") {
            "never" | "no" | "off" | "false" => false,
            "always" | "yes" | "on" | "true" => true,
            _ => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        };
        _ = COLOR.set(color);

        let default_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };
        let log_spec = LogSpecification::env_or_parse(default_level)?;

        let logger = Logger::with(log_spec).format_for_stderr(format_for_stderr);
        let logger = match &log_path {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                logger
                    .log_to_file(FileSpec::try_from(path)?)
                    .append()
                    .format_for_files(format_for_files)
                    .duplicate_to_stderr(Duplicate::Warn)
            }
            None => logger.log_to_stderr(),
        };
        std::mem::forget(logger.start()?);

        let hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            log::error!("{info}");
            hook(info);
        }));

        Ok(())
    };
    match doit() {
        Ok(()) => log::debug!("Started logger, file: {log_path:?}"),
        Err(err) => eprintln!("Failed to start logger: {err}."),
    }
}
