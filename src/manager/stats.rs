use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Point-in-time view of manager activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    pub submitted_serial: u64,
    pub submitted_parallel: u64,
    pub completed: u64,
    pub failed: u64,
    /// Tasks lost because their worker future was cancelled
    pub lost: u64,
    pub in_flight: usize,
    /// Highest number of serial tasks ever executing at once
    pub peak_serial_in_flight: usize,
    pub peak_parallel_in_flight: usize,
}

/// Lock-free counters updated from both threads
#[derive(Debug, Default)]
pub(crate) struct AtomicManagerStats {
    submitted_serial: AtomicU64,
    submitted_parallel: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    lost: AtomicU64,
    in_flight: AtomicUsize,
    peak_serial_in_flight: AtomicUsize,
    peak_parallel_in_flight: AtomicUsize,
}

impl AtomicManagerStats {
    #[inline]
    pub fn record_submitted(&self, serial: bool) {
        let counter = if serial {
            &self.submitted_serial
        } else {
            &self.submitted_parallel
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_started(&self, serial_running: usize, parallel_running: usize) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.peak_serial_in_flight
            .fetch_max(serial_running, Ordering::Relaxed);
        self.peak_parallel_in_flight
            .fetch_max(parallel_running, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_finished(&self, failed: bool) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_lost(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ManagerStats {
        ManagerStats {
            submitted_serial: self.submitted_serial.load(Ordering::Relaxed),
            submitted_parallel: self.submitted_parallel.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            peak_serial_in_flight: self.peak_serial_in_flight.load(Ordering::Relaxed),
            peak_parallel_in_flight: self.peak_parallel_in_flight.load(Ordering::Relaxed),
        }
    }
}
