use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_LOG_STRIDE: usize = 25;

/// Completion counter shared by the in-flight lookups of one service.
/// Emits "<done> de <total> (<pct>)" lines every `stride` completions and
/// once more when the last document lands.
pub struct ProgressTracker {
    service: String,
    total: usize,
    done: AtomicUsize,
    stride: usize,
}

impl ProgressTracker {
    pub fn new(service: &str, total: usize) -> Self {
        Self {
            service: service.to_string(),
            total,
            done: AtomicUsize::new(0),
            stride: DEFAULT_LOG_STRIDE,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// Records one finished document and returns the running count.
    pub fn record_done(&self) -> usize {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if self.total > 0 && (done % self.stride == 0 || done == self.total) {
            let fraction = done as f64 / self.total as f64;
            tracing::info!(
                "🔍 {}: {} de {} ({:.1}%)",
                self.service,
                done,
                self.total,
                fraction * 100.0
            );
        }
        done
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
