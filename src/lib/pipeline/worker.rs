//! The dedicated worker thread.

use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::debug;

use super::base::{Decoder, Formatter, Shared, run_job};
use super::queue::{Claim, Cookie, WorkerClaim};
use crate::errors::{PkgqError, Result};

const WORKER_THREAD_NAME: &str = "pkgq-worker";

/// A finished record waiting to be handed back on the next lock acquisition.
struct Finished {
    cookie: Cookie,
    index: u64,
    output: Vec<u8>,
}

/// Marks the pipeline aborted if the worker unwinds, so the producer never waits
/// for a thread that is gone.
struct AbortOnPanic<'a, W: Write> {
    shared: &'a Shared<W>,
}

impl<W: Write> Drop for AbortOnPanic<'_, W> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut state = self.shared.state.lock();
            state.abort_at(0);
            self.shared.wake_all();
        }
    }
}

/// Start the worker thread.
pub(crate) fn spawn_worker<W, D, F>(
    shared: Arc<Shared<W>>,
    decoder: Arc<D>,
    formatter: Arc<F>,
) -> Result<JoinHandle<Result<()>>>
where
    W: Write + Send + 'static,
    D: Decoder,
    F: Formatter<D::Record>,
{
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let _guard = AbortOnPanic { shared: &shared };
            debug!("Worker thread started");
            let result = worker_loop(&shared, decoder.as_ref(), formatter.as_ref());
            debug!("Worker thread finished: {}", if result.is_ok() { "ok" } else { "aborted" });
            result
        })
        .map_err(PkgqError::Spawn)
}

/// Claim, format and hand back entries until the sentinel is reached.
///
/// Each pass takes the lock once: it hands back the previous result, signals room
/// if that freed a slot in a full queue, then claims the next entry.
fn worker_loop<W, D, F>(shared: &Shared<W>, decoder: &D, formatter: &F) -> Result<()>
where
    W: Write,
    D: Decoder,
    F: Formatter<D::Record>,
{
    let mut finished: Option<Finished> = None;

    loop {
        let mut state = shared.state.lock();
        let was_full = state.queue.is_full();

        if let Some(Finished { cookie, index, output }) = finished.take() {
            if !state.accepts(index) {
                return Err(PkgqError::Aborted);
            }
            if let Err(e) = state.put_back(cookie, output) {
                return Err(shared.fail(&mut state, e));
            }
            state.stats.worker_records += 1;
        }
        state.ensure_running()?;

        if was_full && !state.queue.is_full() {
            shared.room_available.notify_one();
        }

        let Claim { cookie, blob } = loop {
            state.ensure_running()?;
            match state.queue.claim_for_worker() {
                WorkerClaim::Job(claim) => break claim,
                WorkerClaim::Shutdown => return Ok(()),
                WorkerClaim::Idle => shared.work_available.wait(&mut state),
            }
        };
        drop(state);

        let index = blob.index();
        match run_job(decoder, formatter, index, blob.into_bytes()) {
            Ok(output) => finished = Some(Finished { cookie, index, output }),
            Err(e) => {
                let mut state = shared.state.lock();
                return Err(shared.fail(&mut state, e));
            }
        }
    }
}
