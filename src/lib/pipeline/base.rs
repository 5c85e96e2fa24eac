//! Shared infrastructure for the two pipeline actors.
//!
//! Both actors see the same [`Shared`] value: a single mutex over the queue, the
//! sink, the abort point and the statistics, plus the two condition variables that
//! gate progress. Decoding and formatting run outside the lock through [`run_job`].

use std::io::Write;

use log::error;
use parking_lot::{Condvar, Mutex};

use super::queue::{AidPolicy, Cookie, DEFAULT_QUEUE_CAPACITY, OrderedWorkQueue};
use crate::errors::{BoxError, PkgqError, Result};

// ============================================================================
// Collaborator traits
// ============================================================================

/// Turns a raw blob into a structured record.
///
/// Shared by reference between the producer and the worker.
pub trait Decoder: Send + Sync + 'static {
    /// The decoded record. Never crosses threads.
    type Record;
    type Error: Into<BoxError>;

    /// Decode one blob.
    fn decode(&self, blob: Vec<u8>) -> std::result::Result<Self::Record, Self::Error>;
}

/// Renders a decoded record as text. The format itself is immutable.
pub trait Formatter<R>: Send + Sync + 'static {
    type Error: Into<BoxError>;

    /// Append the rendering of `record` to `out`.
    fn format(&self, record: &R, out: &mut Vec<u8>) -> std::result::Result<(), Self::Error>;
}

/// Decode and format one blob. Called without the queue lock held.
pub(crate) fn run_job<D, F>(decoder: &D, formatter: &F, index: u64, blob: Vec<u8>) -> Result<Vec<u8>>
where
    D: Decoder,
    F: Formatter<D::Record>,
{
    let record =
        decoder.decode(blob).map_err(|e| PkgqError::Decode { index, source: e.into() })?;
    let mut out = Vec::new();
    formatter.format(&record, &mut out).map_err(|e| PkgqError::Format { index, source: e.into() })?;
    Ok(out)
}

// ============================================================================
// Configuration and statistics
// ============================================================================

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Number of queue slots, including in-flight and finished entries.
    pub queue_capacity: usize,
    /// When the producer may format records while it still has room to submit.
    pub aid: AidPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: DEFAULT_QUEUE_CAPACITY, aid: AidPolicy::default() }
    }
}

/// Why the producer formatted a record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AidKind {
    QueueFull,
    Balanced,
    Drain,
}

/// Counters collected over one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records accepted by `submit`.
    pub records_submitted: u64,
    /// Records decoded and formatted by the worker thread.
    pub worker_records: u64,
    /// Records the producer formatted because the queue was full.
    pub aided_when_full: u64,
    /// Records the producer formatted through the balanced heuristic.
    pub aided_balanced: u64,
    /// Records the producer formatted while draining.
    pub aided_at_drain: u64,
    /// Times the producer blocked waiting for room.
    pub producer_waits: u64,
    /// Records written to the sink.
    pub records_written: u64,
    /// Bytes written to the sink.
    pub bytes_written: u64,
}

impl PipelineStats {
    /// Records the producer formatted itself, for any reason.
    #[must_use]
    pub fn producer_records(&self) -> u64 {
        self.aided_when_full + self.aided_balanced + self.aided_at_drain
    }

    pub(crate) fn record_aid(&mut self, kind: AidKind) {
        match kind {
            AidKind::QueueFull => self.aided_when_full += 1,
            AidKind::Balanced => self.aided_balanced += 1,
            AidKind::Drain => self.aided_at_drain += 1,
        }
    }
}

/// What a successful run hands back: the sink and the run's counters.
#[derive(Debug)]
pub struct PipelineOutcome<W> {
    pub sink: W,
    pub stats: PipelineStats,
}

// ============================================================================
// Shared state
// ============================================================================

/// Everything guarded by the pipeline mutex.
pub(crate) struct State<W> {
    pub queue: OrderedWorkQueue,
    pub sink: W,
    /// First arrival position that must never be written, once a failure occurred.
    pub abort_before: Option<u64>,
    pub stats: PipelineStats,
}

impl<W: Write> State<W> {
    pub fn new(config: &PipelineConfig, sink: W) -> Self {
        Self {
            queue: OrderedWorkQueue::new(config.queue_capacity, config.aid.clone()),
            sink,
            abort_before: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_before.is_some()
    }

    /// Fail fast once the pipeline has been aborted.
    pub fn ensure_running(&self) -> Result<()> {
        if self.is_aborted() { Err(PkgqError::Aborted) } else { Ok(()) }
    }

    /// Whether output for the record at `index` may still be written.
    pub fn accepts(&self, index: u64) -> bool {
        self.abort_before.is_none_or(|limit| index < limit)
    }

    /// Move the abort point down to `limit`; it never moves back up.
    pub fn abort_at(&mut self, limit: u64) {
        self.abort_before = Some(self.abort_before.map_or(limit, |current| current.min(limit)));
    }

    /// Hand a finished record back to the queue and flush what became writable.
    pub fn put_back(&mut self, cookie: Cookie, output: Vec<u8>) -> Result<()> {
        let Self { queue, sink, .. } = self;
        queue.put_back(cookie, output, sink)?;
        Ok(())
    }
}

/// The first arrival position a failure forbids writing.
///
/// A record that failed to decode or format stops output at its own position so
/// everything before it can still be flushed. Any other fault stops all output.
pub(crate) fn abort_limit(error: &PkgqError) -> u64 {
    match error {
        PkgqError::Decode { index, .. } | PkgqError::Format { index, .. } => *index,
        _ => 0,
    }
}

/// State shared by the producer and the worker.
pub(crate) struct Shared<W> {
    pub state: Mutex<State<W>>,
    /// Signalled when a full queue gains a free slot.
    pub room_available: Condvar,
    /// Signalled when a pending entry or the sentinel appears.
    pub work_available: Condvar,
}

impl<W: Write> Shared<W> {
    pub fn new(config: &PipelineConfig, sink: W) -> Self {
        Self {
            state: Mutex::new(State::new(config, sink)),
            room_available: Condvar::new(),
            work_available: Condvar::new(),
        }
    }

    /// Record a failure, wake the other actor and hand the error back.
    pub fn fail(&self, state: &mut State<W>, err: PkgqError) -> PkgqError {
        if !matches!(err, PkgqError::Aborted) {
            error!("Aborting pipeline: {err}");
            state.abort_at(abort_limit(&err));
        }
        self.wake_all();
        err
    }

    /// Wake both actors so they can observe an abort.
    pub fn wake_all(&self) {
        self.room_available.notify_all();
        self.work_available.notify_all();
    }
}
