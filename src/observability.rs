//! Rotation counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle shared by a rotator and its background tasks
#[derive(Debug, Default)]
pub struct Metrics {
    bytes_written: AtomicU64,
    rotations: AtomicU64,
    rotation_failures: AtomicU64,
    entries_compressed: AtomicU64,
    entries_pruned: AtomicU64,
    retire_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_written(&self, n: usize) {
        self.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "rotations", "Metric incremented");
    }

    pub fn rotation_failed(&self) {
        self.rotation_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "rotation_failures", "Metric incremented");
    }

    pub fn entry_compressed(&self) {
        self.entries_compressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entries_pruned(&self, n: usize) {
        self.entries_pruned.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn retire_failed(&self) {
        self.retire_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "retire_failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            rotation_failures: self.rotation_failures.load(Ordering::Relaxed),
            entries_compressed: self.entries_compressed.load(Ordering::Relaxed),
            entries_pruned: self.entries_pruned.load(Ordering::Relaxed),
            retire_failures: self.retire_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub bytes_written: u64,
    pub rotations: u64,
    pub rotation_failures: u64,
    pub entries_compressed: u64,
    pub entries_pruned: u64,
    pub retire_failures: u64,
}
