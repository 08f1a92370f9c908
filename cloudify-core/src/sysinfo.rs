//! Best-effort host capacity reporting.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::CString;

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Host capacity snapshot for overview reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostProfile {
    /// Logical CPU count.
    pub cpu_count: u32,
    /// Total system memory in gigabytes, zero when undetectable.
    pub total_memory_gb: u32,
    /// Available disk space in gigabytes, when detectable.
    pub available_disk_gb: Option<u32>,
    /// Human-readable hint about the probed storage location.
    pub storage_hint: Option<String>,
}

/// Source of host capacity information.
#[async_trait]
pub trait SystemProfileProvider: Send + Sync {
    async fn host_profile(&self) -> Result<HostProfile>;
}

/// Reads capacity from the current machine. Every probe is best-effort and
/// degrades to a missing value rather than failing.
#[derive(Debug, Clone, Default)]
pub struct HostSystemProfile;

impl HostSystemProfile {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SystemProfileProvider for HostSystemProfile {
    async fn host_profile(&self) -> Result<HostProfile> {
        let cpu_count =
            std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1);
        let total_memory_gb = read_total_memory_gb().unwrap_or(0);
        let (available_disk_gb, storage_hint) = read_disk_profile();

        Ok(HostProfile { cpu_count, total_memory_gb, available_disk_gb, storage_hint })
    }
}

/// Total memory from /proc/meminfo, in gigabytes rounded up.
fn read_total_memory_gb() -> Option<u32> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;

    for line in meminfo.lines() {
        if !line.starts_with("MemTotal") {
            continue;
        }
        let kilobytes: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
        let bytes = kilobytes * 1024;
        return Some(bytes.div_ceil(BYTES_PER_GB) as u32);
    }

    None
}

/// Available space on the root filesystem via statvfs.
fn read_disk_profile() -> (Option<u32>, Option<String>) {
    let Ok(path) = CString::new("/") else {
        return (None, Some("Disk availability could not be detected.".to_string()));
    };

    let mut stats = std::mem::MaybeUninit::<libc::statvfs>::uninit();
    let rc = unsafe { libc::statvfs(path.as_ptr(), stats.as_mut_ptr()) };
    if rc != 0 {
        return (None, Some("Disk availability could not be detected.".to_string()));
    }

    let stats = unsafe { stats.assume_init() };
    let available_bytes = stats.f_bavail as u64 * stats.f_frsize as u64;
    let available_gb = (available_bytes / BYTES_PER_GB) as u32;

    (Some(available_gb), Some("Volume /".to_string()))
}
