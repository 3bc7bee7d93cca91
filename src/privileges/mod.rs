use log::{info, warn};

/// Check if the process is running with elevated privileges
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Log the privilege level the session will run with
pub fn announce_privileges(elevated: bool) {
    if elevated {
        info!("Running as root");
    } else {
        warn!("Not running as root, privileged items (datastore logs, dmesg, core backtraces) will be skipped");
    }
}

/// Get instructions for elevating privileges on the current platform
pub fn get_elevation_instructions() -> String {
    format!(
        "Run with sudo: 'sudo {}'",
        std::env::args().collect::<Vec<_>>().join(" ")
    )
}
