/// Best-effort CPU/memory snapshot for `GenerateReport`. Reads
/// `/proc/self/status` on Linux; returns `None` fields everywhere else
/// rather than pulling in a cross-platform sysinfo dependency.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemSnapshot {
    pub resident_memory_bytes: Option<u64>,
    pub cpu_user_ms: Option<u64>,
}

pub fn snapshot() -> SystemSnapshot {
    #[cfg(target_os = "linux")]
    {
        linux_snapshot()
    }
    #[cfg(not(target_os = "linux"))]
    {
        SystemSnapshot::default()
    }
}

#[cfg(target_os = "linux")]
fn linux_snapshot() -> SystemSnapshot {
    let mut snapshot = SystemSnapshot::default();
    if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                if let Some(kb) = rest.trim().strip_suffix("kB").map(str::trim) {
                    snapshot.resident_memory_bytes = kb.parse::<u64>().ok().map(|kb| kb * 1024);
                }
            }
        }
    }
    if let Ok(stat) = std::fs::read_to_string("/proc/self/stat") {
        if let Some(utime) = stat.split_whitespace().nth(13) {
            snapshot.cpu_user_ms = utime.parse::<u64>().ok().map(|ticks| ticks * 10);
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_does_not_panic() {
        let _ = snapshot();
    }
}
