#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

/// Point-in-time process resources, taken at service boundaries.
#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub cpu_percent: f32,
    pub rss_mb: u64,
    /// Change since the previous snapshot. Dataset services hold whole
    /// sanction lists in memory, so this shows which service grew the
    /// process.
    pub rss_delta_mb: i64,
    pub peak_rss_mb: u64,
    pub elapsed: Duration,
}

/// Samples process CPU and memory between screening services when
/// --monitor is set.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
    peak_rss: Mutex<u64>,
    last_rss: Mutex<u64>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let mut system = System::new_with_specifics(RefreshKind::everything());
        system.refresh_all();

        Self {
            system: Mutex::new(system),
            pid: sysinfo::get_current_pid().ok(),
            started: Instant::now(),
            peak_rss: Mutex::new(0),
            last_rss: Mutex::new(0),
            enabled,
        }
    }

    pub fn snapshot(&self) -> Option<ResourceSnapshot> {
        if !self.enabled {
            return None;
        }

        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_all();
        let process = system.process(pid)?;

        let rss_mb = process.memory() / 1024 / 1024;

        let mut peak = self.peak_rss.lock().ok()?;
        if rss_mb > *peak {
            *peak = rss_mb;
        }
        let peak_rss_mb = *peak;
        drop(peak);

        let mut last = self.last_rss.lock().ok()?;
        let rss_delta_mb = rss_mb as i64 - *last as i64;
        *last = rss_mb;

        Some(ResourceSnapshot {
            cpu_percent: process.cpu_usage(),
            rss_mb,
            rss_delta_mb,
            peak_rss_mb,
            elapsed: self.started.elapsed(),
        })
    }

    pub fn checkpoint(&self, label: &str) {
        if let Some(snap) = self.snapshot() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB ({:+}MB), Peak: {}MB, Time: {:?}",
                label,
                snap.cpu_percent,
                snap.rss_mb,
                snap.rss_delta_mb,
                snap.peak_rss_mb,
                snap.elapsed
            );
        }
    }

    pub fn finish(&self) {
        if let Some(snap) = self.snapshot() {
            tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                snap.elapsed,
                snap.peak_rss_mb
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// No-op stand-in when the crate is built without the CLI feature.
#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn checkpoint(&self, _label: &str) {}

    pub fn finish(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
