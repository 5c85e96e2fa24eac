//! Two-thread, order-preserving formatting pipeline.
//!
//! The caller's thread (the producer) submits raw blobs; one dedicated worker
//! thread decodes and formats them. Output reaches the sink strictly in submission
//! order, whichever thread finished a record first.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  submit   ┌──────────────────────────────┐  claim   ┌──────────┐
//! │  producer  │──────────>│  bounded ordered queue (N)   │<─────────│  worker  │
//! │ (caller)   │<──────────│  Pending → InFlight → Done   │─────────>│ (thread) │
//! └────────────┘  aid when │                              │ put back └──────────┘
//!                 full     └──────────────┬───────────────┘
//!                                         │ flush Done prefix, in order
//!                                         v
//!                                       sink
//! ```
//!
//! One `parking_lot::Mutex` guards the queue, the sink, the abort point and the
//! statistics. Two condition variables gate progress: "room available" wakes a
//! producer blocked on a full queue, "work available" wakes an idle worker.
//! Decoding and formatting always run outside the lock.
//!
//! Instead of idling on a full queue, the producer formats the earliest pending
//! record itself as long as another pending record is left for the worker. While
//! it still has room it may also take work through a balanced heuristic (see
//! [`AidPolicy`]).
//!
//! # Failure
//!
//! Any failure aborts the pipeline. A record that fails to decode or format sets
//! the abort point to its own position: earlier records that are already done or
//! finishing are still written, nothing at or after it is. Sink and internal faults
//! stop all output. The failing thread wakes the other one and both stop; the
//! producer joins the worker and reports the first real error.
//!
//! # Module Structure
//!
//! - `base`: collaborator traits, configuration, statistics and shared state
//! - `queue`: the bounded ordered queue
//! - `producer`: [`QueryPipeline`], the caller-facing side
//! - `worker`: the worker thread loop

mod base;
mod producer;
pub mod queue;
mod worker;

pub use base::{Decoder, Formatter, PipelineConfig, PipelineOutcome, PipelineStats};
pub use producer::QueryPipeline;
pub use queue::{AidPolicy, DEFAULT_QUEUE_CAPACITY, OrderedWorkQueue};
