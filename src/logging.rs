//! Injected logging handle
//!
//! Components never reach for a process-wide logger of their own. They take a
//! [`Logger`] at construction, which forwards to the `log` facade under the
//! component's own target. The embedding application picks the backend.
//!
//! Inside the crate the `error!`, `warn!`, `info!` and `debug!` macros read
//! like their `log` counterparts, with the handle first:
//! `info!(self.log, "Installed {} regions", n)`.

use std::fmt;
use std::sync::Arc;

/// Cheap, clonable logging handle scoped to a log target
#[derive(Clone)]
pub struct Logger {
    target: Arc<str>,
    enabled: bool,
}

impl Logger {
    /// Create a logger writing under `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: Arc::from(target.into()),
            enabled: true,
        }
    }

    /// A logger that drops every message
    pub fn silent() -> Self {
        Self {
            target: Arc::from("tablesight"),
            enabled: false,
        }
    }

    /// Derive a child logger, e.g. `tablesight` -> `tablesight::scheduler`
    pub fn scoped(&self, component: &str) -> Self {
        Self {
            target: Arc::from(format!("{}::{}", self.target, component)),
            enabled: self.enabled,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(log::Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(log::Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(log::Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(log::Level::Debug, args);
    }

    fn log(&self, level: log::Level, args: fmt::Arguments<'_>) {
        if self.enabled {
            log::log!(target: self.target.as_ref(), level, "{}", args);
        }
    }
}

macro_rules! error {
    ($log:expr, $($arg:tt)+) => {
        $log.error(format_args!($($arg)+))
    };
}

macro_rules! log_warn {
    ($log:expr, $($arg:tt)+) => {
        $log.warn(format_args!($($arg)+))
    };
}

macro_rules! info {
    ($log:expr, $($arg:tt)+) => {
        $log.info(format_args!($($arg)+))
    };
}

macro_rules! debug {
    ($log:expr, $($arg:tt)+) => {
        $log.debug(format_args!($($arg)+))
    };
}

pub(crate) use {debug, error, info};
pub(crate) use log_warn as warn;

impl Default for Logger {
    fn default() -> Self {
        Self::new("tablesight")
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("target", &self.target)
            .field("enabled", &self.enabled)
            .finish()
    }
}
