mod env_vars;
pub mod pbs_conf;
mod session_options;
mod snapshot_config;

pub use env_vars::{expand_vars_with, parse_unix_env_vars};

pub use session_options::{LogCount, Platform, SessionOptions};

pub use snapshot_config::{load_config, SnapshotConfig};
