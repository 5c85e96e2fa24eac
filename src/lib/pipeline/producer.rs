//! The producer side of the pipeline: the caller's thread.
//!
//! [`QueryPipeline`] is what callers drive. `submit` queues one blob, formatting
//! records itself when the queue is full (or nearly full and well stocked) instead
//! of blocking. `finish` drains the remaining work, stops the worker and hands the
//! sink back.

use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::debug;
use parking_lot::MutexGuard;

use super::base::{
    AidKind, Decoder, Formatter, PipelineConfig, PipelineOutcome, Shared, State, run_job,
};
use super::queue::Claim;
use super::worker::spawn_worker;
use crate::errors::{PkgqError, Result};

/// Owns the worker thread. Dropping it before the worker was joined aborts the
/// pipeline and waits for the thread to exit.
struct WorkerHandle<W: Write> {
    shared: Arc<Shared<W>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl<W: Write> WorkerHandle<W> {
    fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| PkgqError::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for WorkerHandle<W> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            {
                let mut state = self.shared.state.lock();
                state.abort_at(0);
                self.shared.wake_all();
            }
            let _ = handle.join();
        }
    }
}

/// A two-thread pipeline that formats blobs and writes the results to `W` in
/// submission order.
///
/// # Example
///
/// ```
/// use pkgq_lib::pipeline::{Decoder, Formatter, PipelineConfig, QueryPipeline};
///
/// struct Utf8;
///
/// impl Decoder for Utf8 {
///     type Record = String;
///     type Error = std::string::FromUtf8Error;
///     fn decode(&self, blob: Vec<u8>) -> Result<String, Self::Error> {
///         String::from_utf8(blob)
///     }
/// }
///
/// struct Line;
///
/// impl Formatter<String> for Line {
///     type Error = std::convert::Infallible;
///     fn format(&self, record: &String, out: &mut Vec<u8>) -> Result<(), Self::Error> {
///         out.extend_from_slice(record.as_bytes());
///         out.push(b'\n');
///         Ok(())
///     }
/// }
///
/// # fn main() -> pkgq_lib::errors::Result<()> {
/// let mut pipeline = QueryPipeline::new(&PipelineConfig::default(), Utf8, Line, Vec::new())?;
/// pipeline.submit(b"bash".to_vec())?;
/// pipeline.submit(b"rpm".to_vec())?;
/// let outcome = pipeline.finish()?;
/// assert_eq!(outcome.sink, b"bash\nrpm\n");
/// # Ok(())
/// # }
/// ```
pub struct QueryPipeline<W, D, F>
where
    W: Write + Send + 'static,
    D: Decoder,
    F: Formatter<D::Record>,
{
    shared: Arc<Shared<W>>,
    decoder: Arc<D>,
    formatter: Arc<F>,
    worker: WorkerHandle<W>,
}

impl<W, D, F> QueryPipeline<W, D, F>
where
    W: Write + Send + 'static,
    D: Decoder,
    F: Formatter<D::Record>,
{
    /// Create the pipeline and start its worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable or the thread cannot be spawned.
    pub fn new(config: &PipelineConfig, decoder: D, formatter: F, sink: W) -> Result<Self> {
        if config.queue_capacity == 0 {
            return Err(PkgqError::InvalidParameter {
                parameter: "queue-capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let shared = Arc::new(Shared::new(config, sink));
        let decoder = Arc::new(decoder);
        let formatter = Arc::new(formatter);
        let handle =
            spawn_worker(Arc::clone(&shared), Arc::clone(&decoder), Arc::clone(&formatter))?;
        let worker = WorkerHandle { shared: Arc::clone(&shared), handle: Some(handle) };

        debug!(
            "Started pipeline with queue capacity {} (balanced aid {})",
            config.queue_capacity,
            if config.aid.enabled { "on" } else { "off" }
        );
        Ok(Self { shared, decoder, formatter, worker })
    }

    /// Queue one blob for formatting.
    ///
    /// Blocks only while the queue is full and holds nothing the producer can take
    /// without starving the worker.
    ///
    /// # Errors
    ///
    /// Returns the first failure of either thread. The pipeline is aborted and the
    /// worker joined before this returns.
    pub fn submit(&mut self, blob: Vec<u8>) -> Result<()> {
        match self.submit_inner(blob) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.teardown(e)),
        }
    }

    fn submit_inner(&self, blob: Vec<u8>) -> Result<()> {
        let mut state = self.shared.state.lock();

        while state.queue.is_full() {
            state.ensure_running()?;
            if let Some(claim) = state.queue.claim_second_earliest() {
                self.aid(&mut state, claim, AidKind::QueueFull)?;
            } else {
                state.stats.producer_waits += 1;
                self.shared.room_available.wait(&mut state);
            }
        }
        state.ensure_running()?;

        let was_idle = state.queue.pending_count() == 0;
        if state.queue.try_enqueue(blob).is_err() {
            return Err(PkgqError::Invariant("enqueue rejected with a free slot".to_string()));
        }
        state.stats.records_submitted += 1;
        if was_idle {
            self.shared.work_available.notify_one();
        }

        while let Some(claim) = state.queue.claim_balanced() {
            self.aid(&mut state, claim, AidKind::Balanced)?;
        }
        Ok(())
    }

    /// Format the remaining work, stop the worker and return the sink.
    ///
    /// # Errors
    ///
    /// Returns the first failure of either thread, or an invariant error if the
    /// queue still holds work after the worker stopped.
    pub fn finish(self) -> Result<PipelineOutcome<W>> {
        let QueryPipeline { shared, decoder, formatter, mut worker } = self;

        let drained = drain(&shared, decoder.as_ref(), formatter.as_ref());
        if let Err(e) = drained {
            return Err(abort_and_join(&shared, &mut worker, e));
        }
        worker.join()?;
        drop(worker);
        drop(decoder);
        drop(formatter);

        let shared = Arc::try_unwrap(shared).map_err(|_| {
            PkgqError::Invariant("pipeline state still shared after the worker exited".to_string())
        })?;
        let State { queue, mut sink, mut stats, .. } = shared.state.into_inner();

        queue.verify_bookkeeping()?;
        if queue.pending_count() != 0 || queue.pending_bytes() != 0 || !queue.holds_only_sentinel()
        {
            return Err(PkgqError::Invariant(format!(
                "queue not empty after drain: {} entries, {} pending ({} bytes)",
                queue.len(),
                queue.pending_count(),
                queue.pending_bytes()
            )));
        }
        sink.flush().map_err(PkgqError::Sink)?;

        stats.records_written = queue.records_flushed();
        stats.bytes_written = queue.bytes_flushed();
        debug!("Pipeline finished: {stats:?}");
        Ok(PipelineOutcome { sink, stats })
    }

    fn aid(&self, state: &mut MutexGuard<'_, State<W>>, claim: Claim, kind: AidKind) -> Result<()> {
        aid(state, self.decoder.as_ref(), self.formatter.as_ref(), claim, kind)
    }

    fn teardown(&mut self, err: PkgqError) -> PkgqError {
        abort_and_join(&self.shared, &mut self.worker, err)
    }
}

/// Producer side of shutdown: format every remaining pending entry, then append
/// the sentinel so the worker stops once it is done with its last claim.
fn drain<W, D, F>(shared: &Shared<W>, decoder: &D, formatter: &F) -> Result<()>
where
    W: Write,
    D: Decoder,
    F: Formatter<D::Record>,
{
    let mut state = shared.state.lock();

    loop {
        state.ensure_running()?;
        let Some(claim) = state.queue.claim_earliest() else { break };
        aid(&mut state, decoder, formatter, claim, AidKind::Drain)?;
    }

    while state.queue.is_full() {
        state.ensure_running()?;
        state.stats.producer_waits += 1;
        shared.room_available.wait(&mut state);
    }
    state.ensure_running()?;

    if !state.queue.enqueue_sentinel() {
        return Err(PkgqError::Invariant("no room for the end-of-input marker".to_string()));
    }
    shared.work_available.notify_one();
    Ok(())
}

/// Format a claimed entry on the producer thread and hand it back.
fn aid<W, D, F>(
    state: &mut MutexGuard<'_, State<W>>,
    decoder: &D,
    formatter: &F,
    claim: Claim,
    kind: AidKind,
) -> Result<()>
where
    W: Write,
    D: Decoder,
    F: Formatter<D::Record>,
{
    let Claim { cookie, blob } = claim;
    let index = blob.index();
    let output =
        MutexGuard::unlocked(state, || run_job(decoder, formatter, index, blob.into_bytes()))?;

    if !state.accepts(index) {
        return Err(PkgqError::Aborted);
    }
    state.put_back(cookie, output)?;
    state.stats.record_aid(kind);
    Ok(())
}

/// Abort after a producer-side failure, join the worker and pick the error to report.
///
/// When the producer only noticed that the worker had aborted, the worker's own
/// error is the one worth reporting.
fn abort_and_join<W: Write>(
    shared: &Shared<W>,
    worker: &mut WorkerHandle<W>,
    err: PkgqError,
) -> PkgqError {
    let err = {
        let mut state = shared.state.lock();
        shared.fail(&mut state, err)
    };

    match (err, worker.join()) {
        (PkgqError::Aborted, Err(worker_err)) => worker_err,
        (err, _) => err,
    }
}
