//! Periodic progress logging.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use crate::logging::format_count;

/// Default number of records between progress messages.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Logs a message each time a running count crosses a multiple of an interval.
///
/// The count is atomic, so a tracker can be shared by reference.
///
/// # Example
/// ```
/// use pkgq_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Read records").with_interval(100);
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs "Read records 250 (complete)"
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Create a tracker with the default interval.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            interval: DEFAULT_PROGRESS_INTERVAL,
            message: message.into(),
            count: AtomicU64::new(0),
        }
    }

    /// Set the logging interval. Zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Add to the count, logging once for every interval boundary crossed.
    ///
    /// Returns `true` if the count now sits exactly on a boundary, meaning the last
    /// message already reported it.
    pub fn log_if_needed(&self, additional: u64) -> bool {
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let now = prev + additional;

        for i in (prev / self.interval + 1)..=(now / self.interval) {
            info!("{} {}", self.message, format_count(i * self.interval));
        }
        now > 0 && now.is_multiple_of(self.interval)
    }

    /// Log the final count unless the last boundary message already did.
    pub fn log_final(&self) {
        let count = self.count();
        if count > 0 && !count.is_multiple_of(self.interval) {
            info!("{} {} (complete)", self.message, format_count(count));
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
