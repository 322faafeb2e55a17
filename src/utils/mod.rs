use std::time::Duration;

use tokio_util::sync::CancellationToken;

mod channels;
pub use channels::*;

pub trait ResultExt {
    type Ok;
    #[track_caller]
    fn ok_or_log(self) -> Option<Self::Ok>;
    #[track_caller]
    fn ok_or_debug(self) -> Option<Self::Ok>;
}
impl<T, E: Into<anyhow::Error>> ResultExt for Result<T, E> {
    type Ok = T;
    #[track_caller]
    fn ok_or_log(self) -> Option<T> {
        match self {
            Ok(val) => Some(val),
            Err(err) => {
                log::error!("{:?}", err.into());
                None
            }
        }
    }
    #[track_caller]
    fn ok_or_debug(self) -> Option<T> {
        match self {
            Ok(val) => Some(val),
            Err(err) => {
                log::debug!("{:#}", err.into());
                None
            }
        }
    }
}

/// Returns `false` if `cancel` fired before `dur` elapsed.
pub async fn sleep_or_cancel(dur: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if dur.is_zero() {
        return true;
    }
    cancel
        .run_until_cancelled(tokio::time::sleep(dur))
        .await
        .is_some()
}

/// Per-thread log capture for tests. Current-thread runtimes keep records on the test thread.
#[cfg(test)]
pub mod test_log {
    use std::cell::RefCell;

    thread_local! {
        static RECORDS: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
    }

    struct Capture;

    impl log::Log for Capture {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }
        fn log(&self, record: &log::Record) {
            RECORDS.with_borrow_mut(|records| {
                records.push((record.level(), record.args().to_string()))
            });
        }
        fn flush(&self) {}
    }

    static CAPTURE: Capture = Capture;

    /// Installs the capture logger if needed and clears this thread's records.
    pub fn start() {
        if log::set_logger(&CAPTURE).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
        RECORDS.with_borrow_mut(Vec::clear);
    }

    pub fn warned(message: &str) -> bool {
        RECORDS.with_borrow(|records| {
            records
                .iter()
                .any(|(level, msg)| *level == log::Level::Warn && msg == message)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_runs_to_completion_without_cancel() {
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();
        assert!(sleep_or_cancel(Duration::from_millis(300), &cancel).await);
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_returns_early_on_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let start = tokio::time::Instant::now();
        assert!(!sleep_or_cancel(Duration::from_secs(60), &cancel).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn already_cancelled_never_sleeps() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!sleep_or_cancel(Duration::ZERO, &cancel).await);
    }
}
