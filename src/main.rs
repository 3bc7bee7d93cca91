use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};
use tokio::runtime::Runtime;

use pbs_snapshot::cli::Args;
use pbs_snapshot::cluster::{PbsCli, PbsLayout};
use pbs_snapshot::config::{load_config, pbs_conf};
use pbs_snapshot::constants::{SNAPSHOT_ANNOUNCE_PREFIX, SNAPSHOT_LOG_FILE};
use pbs_snapshot::session::SnapshotSession;

fn main() -> Result<()> {
    let args = Args::parse();
    let log_file = initialize_logging(args.verbose)?;

    let config = load_config(args.config.as_deref())?;
    let conf_path = config.pbs_conf.clone().unwrap_or_else(pbs_conf::pbs_conf_path);
    let layout = PbsLayout::from_conf(&conf_path)
        .with_context(|| format!("Failed to load PBS configuration from {}", conf_path.display()))?;

    let options = args.session_options(&config);
    let cluster = Arc::new(PbsCli::new(layout, options.command_timeout));

    let mut session = SnapshotSession::open(options, cluster)
        .context("Failed to start snapshot session")?;

    log_file.attach(&session.root().join(SNAPSHOT_LOG_FILE))?;
    info!("Starting PBS snapshot capture");

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    runtime
        .block_on(session.capture_all())
        .context("Snapshot capture failed")?;

    let archive = session.finalize().context("Failed to finalize snapshot")?;
    println!("{}: {}", SNAPSHOT_ANNOUNCE_PREFIX, archive.path.display());
    Ok(())
}

/// Terminal logging on stderr plus the snapshot's own log file.
///
/// Stdout is reserved for the announcement line. The file does not exist
/// until the session is open, so records are buffered until then.
fn initialize_logging(verbose: bool) -> Result<DeferredLogFile> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_file = DeferredLogFile::default();

    CombinedLogger::init(vec![
        TermLogger::new(
            log_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, Config::default(), log_file.clone()),
    ])
    .context("Failed to initialize logger")?;
    Ok(log_file)
}

enum LogTarget {
    Buffer(Vec<u8>),
    File(File),
}

/// Writer that holds log records in memory until a file is attached
#[derive(Clone)]
struct DeferredLogFile(Arc<Mutex<LogTarget>>);

impl Default for DeferredLogFile {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(LogTarget::Buffer(Vec::new()))))
    }
}

impl DeferredLogFile {
    /// Create `path`, flush the buffered records into it and write through
    /// from now on
    fn attach(&self, path: &Path) -> Result<()> {
        let mut file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut target = self
            .0
            .lock()
            .map_err(|_| anyhow::anyhow!("Log writer lock poisoned"))?;
        if let LogTarget::Buffer(buffered) = &*target {
            file.write_all(buffered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        *target = LogTarget::File(file);
        Ok(())
    }
}

impl Write for DeferredLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut target = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        match &mut *target {
            LogTarget::Buffer(buffered) => {
                buffered.extend_from_slice(buf);
                Ok(buf.len())
            }
            LogTarget::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut target = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        match &mut *target {
            LogTarget::Buffer(_) => Ok(()),
            LogTarget::File(file) => file.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_deferred_log_keeps_early_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SNAPSHOT_LOG_FILE);
        let mut writer = DeferredLogFile::default();

        writer.write_all(b"Running with root privileges\n").unwrap();
        writer.attach(&path).unwrap();
        writer.write_all(b"Starting PBS snapshot capture\n").unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Running with root privileges\nStarting PBS snapshot capture\n"
        );
    }
}
