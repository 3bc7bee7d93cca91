use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SnapshotConfig;
use crate::constants::{
    DEFAULT_ACCOUNTING_LOGS, DEFAULT_COLLECTOR_TIMEOUT_SECS, DEFAULT_COMMAND_TIMEOUT_SECS,
    DEFAULT_DAEMON_LOGS,
};

/// How many log files of one kind to capture.
///
/// Kept as three states on purpose: `Unset` falls back to the tool default,
/// while `Zero` means no log directory is created at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogCount {
    #[default]
    Unset,
    Explicit(NonZeroUsize),
    Zero,
}

impl LogCount {
    pub fn from_count(count: usize) -> Self {
        match NonZeroUsize::new(count) {
            Some(n) => LogCount::Explicit(n),
            None => LogCount::Zero,
        }
    }

    /// Number of files to copy, or `None` when nothing may be created
    pub fn resolve(&self, default: usize) -> Option<usize> {
        match self {
            LogCount::Unset => NonZeroUsize::new(default).map(|n| n.get()),
            LogCount::Explicit(n) => Some(n.get()),
            LogCount::Zero => None,
        }
    }

    /// Keep `self` unless unset, then take the fallback
    pub fn or(self, fallback: Option<usize>) -> Self {
        match (self, fallback) {
            (LogCount::Unset, Some(n)) => LogCount::from_count(n),
            (count, _) => count,
        }
    }
}

/// Host platform as far as collectors care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    pub fn is_linux(&self) -> bool {
        *self == Platform::Linux
    }
}

/// Configuration of one capture session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Parent directory of the snapshot tree and archive
    pub out_dir: PathBuf,
    pub accounting_logs: LogCount,
    pub daemon_logs: LogCount,
    pub obfuscate: bool,
    /// `None` detects from the effective uid
    pub elevated: Option<bool>,
    pub platform: Platform,
    pub command_timeout: Duration,
    pub collector_timeout: Duration,
    /// Register `pbs_snapshot.log` (the CLI writes it into the tree)
    pub include_own_log: bool,
}

impl SessionOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            accounting_logs: LogCount::Unset,
            daemon_logs: LogCount::Unset,
            obfuscate: false,
            elevated: None,
            platform: Platform::current(),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            collector_timeout: Duration::from_secs(DEFAULT_COLLECTOR_TIMEOUT_SECS),
            include_own_log: false,
        }
    }

    pub fn with_log_counts(mut self, accounting: LogCount, daemon: LogCount) -> Self {
        self.accounting_logs = accounting;
        self.daemon_logs = daemon;
        self
    }

    pub fn with_obfuscation(mut self, obfuscate: bool) -> Self {
        self.obfuscate = obfuscate;
        self
    }

    pub fn with_elevated(mut self, elevated: bool) -> Self {
        self.elevated = Some(elevated);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Fill unset values from a tuning file
    pub fn apply_config(mut self, config: &SnapshotConfig) -> Self {
        self.accounting_logs = self.accounting_logs.or(config.accounting_logs);
        self.daemon_logs = self.daemon_logs.or(config.daemon_logs);
        self.command_timeout = Duration::from_secs(config.command_timeout_secs);
        self.collector_timeout = Duration::from_secs(config.collector_timeout_secs);
        self
    }

    pub fn daemon_log_limit(&self) -> Option<usize> {
        self.daemon_logs.resolve(DEFAULT_DAEMON_LOGS)
    }

    pub fn accounting_log_limit(&self) -> Option<usize> {
        self.accounting_logs.resolve(DEFAULT_ACCOUNTING_LOGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_count_resolution() {
        assert_eq!(LogCount::Unset.resolve(5), Some(5));
        assert_eq!(LogCount::from_count(2).resolve(5), Some(2));
        assert_eq!(LogCount::from_count(0), LogCount::Zero);
        assert_eq!(LogCount::Zero.resolve(5), None);
    }

    #[test]
    fn test_config_fills_only_unset() {
        let config = SnapshotConfig {
            daemon_logs: Some(9),
            accounting_logs: Some(0),
            ..SnapshotConfig::default()
        };
        let options = SessionOptions::new("/tmp")
            .with_log_counts(LogCount::Unset, LogCount::from_count(2))
            .apply_config(&config);
        assert_eq!(options.daemon_log_limit(), Some(2));
        assert_eq!(options.accounting_logs, LogCount::Zero);
        assert_eq!(options.accounting_log_limit(), None);
    }

    #[test]
    fn test_defaults() {
        let options = SessionOptions::new("/tmp");
        assert_eq!(options.daemon_log_limit(), Some(DEFAULT_DAEMON_LOGS));
        assert_eq!(options.accounting_log_limit(), Some(DEFAULT_ACCOUNTING_LOGS));
        assert!(!options.obfuscate);
    }
}
