use log::debug;
use sysinfo::{CpuExt, DiskExt, PidExt, ProcessExt, ProcessStatus, System, SystemExt};

use crate::cluster::Daemon;
use crate::collectors::system::models::*;

/// One sysinfo sample of the local host
pub struct HostSampler {
    system: System,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self { system }
    }

    pub fn os_info(&self) -> OsInfo {
        debug!("Collecting OS information");

        let cpu_info = CpuInfo {
            count: self.system.cpus().len(),
            brand: self
                .system
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string()),
            frequency: self.system.cpus().first().map_or(0, |cpu| cpu.frequency()),
        };

        OsInfo {
            hostname: self.system.host_name(),
            os_name: self.system.name(),
            os_version: self.system.os_version(),
            kernel_version: self.system.kernel_version(),
            uptime_secs: self.system.uptime(),
            boot_time: self.system.boot_time(),
            cpu_info,
        }
    }

    /// Processes whose name matches any of `names`, ordered by pid
    pub fn processes_named(&self, names: &[&str]) -> Vec<ProcessInfo> {
        let mut processes: Vec<ProcessInfo> = self
            .system
            .processes()
            .iter()
            .filter(|(_, p)| names.contains(&p.name()))
            .map(|(pid, p)| ProcessInfo {
                pid: pid.as_u32(),
                parent_pid: p.parent().map(|pp| pp.as_u32()),
                name: p.name().to_string(),
                cmd: p.cmd().to_vec(),
                status: status_name(p.status()).to_string(),
                start_time: p.start_time(),
                memory_usage: p.memory(),
            })
            .collect();
        processes.sort_by_key(|p| p.pid);
        processes
    }

    /// Every PBS daemon process on the host
    pub fn pbs_processes(&self) -> Vec<ProcessInfo> {
        let names: Vec<&str> = Daemon::ALL
            .iter()
            .flat_map(|d| d.process_names().iter().copied())
            .collect();
        self.processes_named(&names)
    }

    pub fn memory(&self) -> MemoryInfo {
        MemoryInfo {
            total_memory: self.system.total_memory(),
            used_memory: self.system.used_memory(),
            total_swap: self.system.total_swap(),
            used_swap: self.system.used_swap(),
        }
    }

    pub fn disks(&self) -> Vec<DiskInfo> {
        self.system
            .disks()
            .iter()
            .map(|disk| DiskInfo {
                name: disk.name().to_string_lossy().to_string(),
                mount_point: disk.mount_point().to_string_lossy().to_string(),
                total_space: disk.total_space(),
                available_space: disk.available_space(),
                file_system: std::str::from_utf8(disk.file_system())
                    .ok()
                    .map(|s| s.to_string()),
                is_removable: disk.is_removable(),
            })
            .collect()
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn status_name(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Run => "Running",
        ProcessStatus::Sleep => "Sleeping",
        ProcessStatus::Stop => "Stopped",
        ProcessStatus::Zombie => "Zombie",
        ProcessStatus::Idle => "Idle",
        _ => "Unknown",
    }
}

/// Plain-text process listing, `ps`-like
pub fn render_process_table(processes: &[ProcessInfo]) -> String {
    let mut text = String::from("PID\tPPID\tSTATUS\tNAME\tCMD\n");
    for p in processes {
        text.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            p.pid,
            p.parent_pid.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
            p.status,
            p.name,
            p.cmd.join(" ")
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_host() {
        let sampler = HostSampler::new();
        let os = sampler.os_info();
        assert!(os.cpu_info.count > 0);

        let memory = sampler.memory();
        assert!(memory.total_memory > 0);
        assert!(memory.used_swap <= memory.total_swap);
    }

    #[test]
    fn test_render_process_table() {
        let processes = vec![ProcessInfo {
            pid: 42,
            parent_pid: Some(1),
            name: "pbs_comm".into(),
            cmd: vec!["/opt/pbs/sbin/pbs_comm".into(), "-N".into()],
            status: "Sleeping".into(),
            start_time: 0,
            memory_usage: 1024,
        }];
        let table = render_process_table(&processes);
        assert!(table.starts_with("PID\tPPID"));
        assert!(table.contains("42\t1\tSleeping\tpbs_comm\t/opt/pbs/sbin/pbs_comm -N\n"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_name(ProcessStatus::Run), "Running");
        assert_eq!(status_name(ProcessStatus::Zombie), "Zombie");
    }
}
