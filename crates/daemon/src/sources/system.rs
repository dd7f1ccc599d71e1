use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use printdash_core::Snapshot;
use sysinfo::{Disks, System};
use thiserror::Error;

use crate::config::SystemConfig;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Local host reading that has no safe fallback.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("no mounted filesystem holds {0}")]
    MountNotFound(PathBuf),
    #[error("metrics state poisoned by an earlier panic")]
    Poisoned,
    #[error("metrics worker failed: {0}")]
    Worker(String),
}

/// Produces the `system` snapshot.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn read(&self) -> Result<Snapshot, MetricsError>;
}

/// Host CPU, memory, disk and uptime via `sysinfo`.
pub struct SystemMetrics {
    sys: Arc<Mutex<System>>,
    disk_mount: PathBuf,
}

impl SystemMetrics {
    pub fn new(cfg: &SystemConfig) -> Self {
        let mut sys = System::new();
        // CPU usage is a delta; the first refresh only sets the baseline.
        sys.refresh_cpu_usage();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disk_mount: PathBuf::from(&cfg.disk_mount),
        }
    }
}

#[async_trait]
impl MetricsSource for SystemMetrics {
    async fn read(&self) -> Result<Snapshot, MetricsError> {
        let sys = Arc::clone(&self.sys);
        let mount = self.disk_mount.clone();
        tokio::task::spawn_blocking(move || sample(&sys, &mount))
            .await
            .map_err(|e| MetricsError::Worker(e.to_string()))?
    }
}

fn sample(sys: &Mutex<System>, mount: &Path) -> Result<Snapshot, MetricsError> {
    let (cpu, mem_used, mem_total) = {
        let mut sys = sys.lock().map_err(|_| MetricsError::Poisoned)?;
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        (
            f64::from(sys.global_cpu_usage()),
            sys.used_memory(),
            sys.total_memory(),
        )
    };

    let target = std::fs::canonicalize(mount)
        .map_err(|_| MetricsError::MountNotFound(mount.to_path_buf()))?;
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .filter(|d| target.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().components().count())
        .ok_or_else(|| MetricsError::MountNotFound(mount.to_path_buf()))?;
    let disk_total = disk.total_space();
    let disk_used = disk_total.saturating_sub(disk.available_space());

    Ok(Snapshot::new()
        .with("cpu", round1(cpu))
        .with("mem_used", gib(mem_used))
        .with("mem_total", gib(mem_total))
        .with("mem_percent", percent(mem_used, mem_total))
        .with("disk_used", gib(disk_used))
        .with("disk_total", gib(disk_total))
        .with("disk_percent", percent(disk_used, disk_total))
        .with("uptime", System::uptime()))
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn gib(bytes: u64) -> f64 {
    round1(bytes as f64 / GIB)
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(used as f64 * 100.0 / total as f64)
}
