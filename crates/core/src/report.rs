use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct Tally {
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    scope: &'static str,
    tally: Arc<Tally>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new("pipeline")
    }
}

impl Reporter {
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            tally: Arc::new(Tally::default()),
        }
    }

    /// Same counters, different scope label.
    pub fn scoped(&self, scope: &'static str) -> Self {
        Self {
            scope,
            tally: Arc::clone(&self.tally),
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        let scope = self.scope;
        match level {
            LogLevel::Debug => debug!(scope, "{message}"),
            LogLevel::Info => info!(scope, "{message}"),
            LogLevel::Success => info!(scope, status = "success", "{message}"),
            LogLevel::Warning => {
                self.tally.warnings.fetch_add(1, Ordering::Relaxed);
                warn!(scope, "{message}")
            }
            LogLevel::Error => {
                self.tally.errors.fetch_add(1, Ordering::Relaxed);
                error!(scope, "{message}")
            }
        }
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl fmt::Display) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, message);
    }

    pub fn warnings(&self) -> usize {
        self.tally.warnings.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> usize {
        self.tally.errors.load(Ordering::Relaxed)
    }
}
