//! Logging helpers for human-readable counts, durations and run summaries.

use std::time::{Duration, Instant};

use crate::pipeline::PipelineStats;

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use pkgq_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a percentage with specified decimal places.
///
/// # Examples
///
/// ```
/// use pkgq_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form.
///
/// # Examples
///
/// ```
/// use pkgq_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(45)), "45s");
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a rate (records per second), falling back to records per minute for
/// slow runs.
///
/// # Examples
///
/// ```
/// use pkgq_lib::logging::format_rate;
/// use std::time::Duration;
///
/// assert_eq!(format_rate(1000, Duration::from_secs(1)), "1,000 records/s");
/// assert_eq!(format_rate(30, Duration::from_secs(60)), "30.0 records/min");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} records/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} records/s", format_count(rate as u64))
    } else {
        let per_min = count as f64 / (secs / 60.0);
        format!("{per_min:.1} records/min")
    }
}

/// Logs how the formatting work was split between the two threads.
#[allow(clippy::cast_precision_loss)]
pub fn log_pipeline_summary(stats: &PipelineStats) {
    log::debug!("Pipeline Summary:");
    log::debug!("  Records submitted: {}", format_count(stats.records_submitted));
    log::debug!("  Records written: {}", format_count(stats.records_written));
    log::debug!("  Bytes written: {}", format_count(stats.bytes_written));
    log::debug!("  Formatted by worker: {}", format_count(stats.worker_records));

    let producer = stats.producer_records();
    if stats.records_submitted > 0 {
        let share = producer as f64 / stats.records_submitted as f64;
        log::debug!(
            "  Formatted by producer: {} ({}; full {}, balanced {}, drain {})",
            format_count(producer),
            format_percent(share, 1),
            format_count(stats.aided_when_full),
            format_count(stats.aided_balanced),
            format_count(stats.aided_at_drain)
        );
    }
    if stats.producer_waits > 0 {
        log::debug!("  Producer waits on a full queue: {}", format_count(stats.producer_waits));
    }
}

/// Operation timing and summary helper.
///
/// # Examples
///
/// ```no_run
/// use pkgq_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Querying packages");
///
/// // ... do work ...
///
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time since the timer was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the completion with record count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.elapsed();
        log::info!(
            "{} completed: {} records in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
