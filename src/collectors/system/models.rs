use serde::{Deserialize, Serialize};

/// Host identity and platform
#[derive(Debug, Serialize, Deserialize)]
pub struct OsInfo {
    pub hostname: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub uptime_secs: u64,
    pub boot_time: u64,
    pub cpu_info: CpuInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CpuInfo {
    pub count: usize,
    pub brand: Option<String>,
    pub frequency: u64,
}

/// One PBS-related process
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    pub name: String,
    pub cmd: Vec<String>,
    pub status: String,
    pub start_time: u64,
    pub memory_usage: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_memory: u64,
    pub used_memory: u64,
    pub total_swap: u64,
    pub used_swap: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiskInfo {
    pub name: String,
    pub mount_point: String,
    pub total_space: u64,
    pub available_space: u64,
    pub file_system: Option<String>,
    pub is_removable: bool,
}
