//! Tracing setup for the batch binary.
//!
//! Results go to stdout, so log lines go to stderr or, with `CM_LOG_DIR`
//! set, to a daily-rotated `<app>.log` in that directory.

use std::{panic, path::PathBuf, sync::OnceLock};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Logging knobs read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogSettings {
    pub dir: Option<PathBuf>,
    /// Also run the default panic hook, which prints the backtrace.
    pub chain_default_panic_hook: bool,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dir = lookup("CM_LOG_DIR")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        let chain_default_panic_hook = lookup("CM_LOG_INCLUDE_BACKTRACE")
            .is_some_and(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true"));

        Self {
            dir,
            chain_default_panic_hook,
        }
    }
}

/// Install the global subscriber (`RUST_LOG`, default `info`). The returned
/// guard flushes the file writer on drop and must live as long as `main`.
pub fn init_tracing_subscriber(app_name: &str, settings: &LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let Some(dir) = &settings.dir else {
        let _ = builder.with_writer(std::io::stderr).try_init();
        return None;
    };

    if let Err(err) = std::fs::create_dir_all(dir) {
        let _ = builder.with_writer(std::io::stderr).try_init();
        tracing::warn!(
            dir = %dir.display(),
            error = %err,
            "cannot create log dir; logging to stderr"
        );
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = builder.with_writer(writer).with_ansi(false).try_init();
    Some(guard)
}

/// Report panics as `error` events tagged with the run id. Installed once.
pub fn install_tracing_panic_hook(app_name: &'static str, settings: &LogSettings) {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    let chain = settings.chain_default_panic_hook;

    INSTALLED.get_or_init(|| {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            tracing::error!(
                application = app_name,
                run_id = crate::run_id::get(),
                panic = %info,
                "run panicked"
            );
            if chain {
                default_hook(info);
            }
        }));
    });
}
