use clap::Parser;
use std::path::PathBuf;

use crate::config::{LogCount, SessionOptions, SnapshotConfig};

/// Command-line arguments for pbs_snapshot.
///
/// Captures a point-in-time diagnostic snapshot of a PBS cluster into a
/// single archive under the output directory.
#[derive(Parser, Debug)]
#[clap(
    name = "pbs_snapshot",
    version,
    about = "Capture a diagnostic snapshot of a PBS cluster"
)]
pub struct Args {
    /// Directory that receives the snapshot tree and archive
    #[clap(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,

    /// Number of accounting log files to capture (0 captures none)
    #[clap(long)]
    pub accounting_logs: Option<usize>,

    /// Number of daemon log files to capture per daemon (0 captures none)
    #[clap(long)]
    pub daemon_logs: Option<usize>,

    /// Replace user and group names with placeholders
    #[clap(long)]
    pub obfuscate: bool,

    /// Path to a YAML tuning file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Session options from flags, with unset values filled from `config`
    pub fn session_options(&self, config: &SnapshotConfig) -> SessionOptions {
        let count = |n: Option<usize>| n.map(LogCount::from_count).unwrap_or_default();
        let mut options = SessionOptions::new(&self.output_dir)
            .with_log_counts(count(self.accounting_logs), count(self.daemon_logs))
            .with_obfuscation(self.obfuscate)
            .apply_config(config);
        options.include_own_log = true;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_args_parsing() {
        let args = Args::parse_from(["pbs_snapshot", "-o", "/tmp/out", "--verbose"]);

        assert_eq!(args.output_dir, PathBuf::from("/tmp/out"));
        assert!(args.verbose);
        assert!(!args.obfuscate);
        assert_eq!(args.accounting_logs, None);
        assert_eq!(args.daemon_logs, None);
    }

    #[test]
    fn test_output_dir_required() {
        assert!(Args::try_parse_from(["pbs_snapshot", "--obfuscate"]).is_err());
    }

    #[test]
    fn test_log_counts() {
        let args = Args::parse_from([
            "pbs_snapshot",
            "--output-dir",
            "/tmp/out",
            "--accounting-logs",
            "0",
            "--daemon-logs",
            "2",
            "--obfuscate",
        ]);

        let options = args.session_options(&SnapshotConfig::default());
        assert_eq!(options.accounting_logs, LogCount::Zero);
        assert_eq!(options.daemon_log_limit(), Some(2));
        assert!(options.obfuscate);
        assert!(options.include_own_log);
    }

    #[test]
    fn test_config_fills_unset_counts() {
        let args = Args::parse_from(["pbs_snapshot", "-o", "/tmp/out", "-c", "tune.yaml"]);
        let config = SnapshotConfig {
            daemon_logs: Some(7),
            ..SnapshotConfig::default()
        };

        assert_eq!(args.config, Some(PathBuf::from("tune.yaml")));
        let options = args.session_options(&config);
        assert_eq!(options.daemon_log_limit(), Some(7));
        assert_eq!(options.accounting_logs, LogCount::Unset);
    }
}
