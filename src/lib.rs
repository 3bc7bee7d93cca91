//! # pbs_snapshot
//!
//! Point-in-time diagnostic snapshots of a PBS cluster.
//!
//! A snapshot gathers server, scheduler, node, job, reservation, hook,
//! communication relay and datastore state, daemon and accounting logs, and
//! host facts into one directory tree, then packs it into a single archive
//! for support and postmortem analysis.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use pbs_snapshot::cluster::{PbsCli, PbsLayout};
//! use pbs_snapshot::config::SessionOptions;
//! use pbs_snapshot::session::SnapshotSession;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let layout = PbsLayout::from_conf(std::path::Path::new("/etc/pbs.conf"))?;
//! let options = SessionOptions::new("/var/tmp");
//! let cluster = Arc::new(PbsCli::new(layout, options.command_timeout));
//!
//! let mut session = SnapshotSession::open(options, cluster)?;
//! session.capture_all().await?;
//! let archive = session.finalize()?;
//! println!("Snapshot available at: {}", archive.path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`session`]: capture orchestration and the scoped snapshot directory
//! - [`discovery`]: scheduler instance discovery
//! - [`collectors`]: one collector per information category
//! - [`registry`]: in-memory manifest of captured items
//! - [`obfuscate`]: user and group identifier redaction
//! - [`cluster`]: the boundary to PBS commands and daemons
//! - [`utils`]: archive packing and the snapshot manifest

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Boundary to PBS administrative commands, host tools and daemons
pub mod cluster;

/// Category collectors
pub mod collectors;

/// Tuning file, pbs.conf parsing and session options
pub mod config;

/// Snapshot layout paths, registry keys and defaults
pub mod constants;

/// Scheduler instance discovery
pub mod discovery;

/// Error taxonomy
pub mod error;

/// Core data models
pub mod models;

/// Identifier obfuscation
pub mod obfuscate;

/// Privilege detection
pub mod privileges;

/// Registry of captured items
pub mod registry;

/// Capture orchestration
pub mod session;

/// Archive and manifest helpers
pub mod utils;
