//! Bounded, order-preserving work queue shared by the two pipeline actors.
//!
//! Every submitted blob occupies one slot from submission until its formatted
//! output has been written. Slots move through three stages:
//!
//! ```text
//!   submit          claim              put back            flush
//!  ───────> Pending ──────> InFlight ──────────> Done ─────────────> (removed)
//!           (blob)          (cookie)             (output)   head-first, in order
//! ```
//!
//! The queue itself is not synchronized: the pipeline keeps it behind a single
//! mutex and every method here is called with that lock held. The queue owns
//! the bookkeeping (pending count and pending byte sum), the claim heuristics
//! and the in-order flush to the sink.
//!
//! # Identity
//!
//! In-flight entries are matched back to their slot by a [`Cookie`] drawn from
//! a process-wide counter when the entry is claimed. Cookies are never reused,
//! so a completion can never be credited to the wrong slot.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::{PkgqError, Result};

/// Default number of slots in the queue.
/// Should be just high enough to keep both threads busy.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Default pending byte sum the balanced aid heuristic leaves in the queue.
pub const DEFAULT_AID_LOW_WATER_BYTES: usize = 16 * 1024;

/// Default number of free pending slots tolerated before balanced aid kicks in.
pub const DEFAULT_AID_NEAR_FULL_SLACK: usize = 1;

/// Default ceiling on a stolen record's size relative to the other pending records.
pub const DEFAULT_AID_MAX_SIZE_RATIO: f64 = 2.0;

static NEXT_COOKIE: AtomicU64 = AtomicU64::new(1);

/// Identity of a claimed entry, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cookie(u64);

impl Cookie {
    fn next() -> Self {
        Self(NEXT_COOKIE.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A raw record awaiting decoding, tagged with its arrival position.
#[derive(Debug, PartialEq, Eq)]
pub struct Blob {
    index: u64,
    bytes: Vec<u8>,
}

impl Blob {
    /// Zero-based arrival position of this record.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Size of the raw record in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the raw record is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take ownership of the raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// An entry handed to a claimant, who owns the blob exclusively until it puts
/// the formatted output back under the same cookie.
#[derive(Debug)]
pub struct Claim {
    pub cookie: Cookie,
    pub blob: Blob,
}

/// Result of the worker's claim attempt.
#[derive(Debug)]
pub enum WorkerClaim {
    /// The earliest pending entry.
    Job(Claim),
    /// The end-of-input sentinel was reached.
    Shutdown,
    /// Nothing is pending.
    Idle,
}

#[derive(Debug)]
enum Entry {
    Pending(Blob),
    InFlight(Cookie),
    Done(Vec<u8>),
    Sentinel,
}

/// Tuning for [`OrderedWorkQueue::claim_balanced`].
#[derive(Debug, Clone, PartialEq)]
pub struct AidPolicy {
    /// Whether balanced aid is attempted at all.
    pub enabled: bool,
    /// Pending bytes that must remain queued after a balanced claim.
    pub low_water_bytes: usize,
    /// Balanced aid only happens when at most this many slots are not pending.
    pub near_full_slack: usize,
    /// A candidate larger than this multiple of the mean size of the other
    /// pending records is left alone.
    pub max_size_ratio: f64,
}

impl Default for AidPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            low_water_bytes: DEFAULT_AID_LOW_WATER_BYTES,
            near_full_slack: DEFAULT_AID_NEAR_FULL_SLACK,
            max_size_ratio: DEFAULT_AID_MAX_SIZE_RATIO,
        }
    }
}

impl AidPolicy {
    /// A policy that never claims through the balanced heuristic.
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }
}

/// Fixed-capacity queue of entries in arrival order.
///
/// Only a contiguous prefix of `Done` entries is ever removed, so output reaches
/// the sink strictly in arrival order no matter which claimant finished first.
#[derive(Debug)]
pub struct OrderedWorkQueue {
    entries: VecDeque<Entry>,
    capacity: usize,
    /// Number of `Pending` entries.
    pending_count: usize,
    /// Sum of the sizes of `Pending` blobs.
    pending_bytes: usize,
    /// Arrival position assigned to the next submitted blob.
    next_index: u64,
    policy: AidPolicy,
    records_flushed: u64,
    bytes_flushed: u64,
}

impl OrderedWorkQueue {
    /// Create an empty queue with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize, policy: AidPolicy) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            pending_count: 0,
            pending_bytes: 0,
            next_index: 0,
            policy,
            records_flushed: 0,
            bytes_flushed: 0,
        }
    }

    /// Append a pending entry if a slot is free.
    ///
    /// Returns the arrival position assigned to the blob, or hands the bytes back
    /// if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the unqueued bytes when every slot is occupied.
    pub fn try_enqueue(&mut self, bytes: Vec<u8>) -> std::result::Result<u64, Vec<u8>> {
        if self.is_full() {
            return Err(bytes);
        }

        let index = self.next_index;
        self.next_index += 1;
        self.pending_count += 1;
        self.pending_bytes += bytes.len();
        self.entries.push_back(Entry::Pending(Blob { index, bytes }));
        Ok(index)
    }

    /// Append the end-of-input sentinel if a slot is free.
    pub fn enqueue_sentinel(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push_back(Entry::Sentinel);
        true
    }

    fn pending_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| matches!(entry, Entry::Pending(_)))
            .map(|(pos, _)| pos)
    }

    /// Move the pending entry at `pos` in flight under a fresh cookie.
    fn claim_at(&mut self, pos: usize) -> Claim {
        let cookie = Cookie::next();
        let Entry::Pending(blob) = std::mem::replace(&mut self.entries[pos], Entry::InFlight(cookie))
        else {
            unreachable!("claimed slot {pos} was not pending");
        };
        self.pending_count -= 1;
        self.pending_bytes -= blob.len();
        Claim { cookie, blob }
    }

    /// Claim the earliest pending entry.
    pub fn claim_earliest(&mut self) -> Option<Claim> {
        let pos = self.pending_positions().next()?;
        Some(self.claim_at(pos))
    }

    /// Claim the earliest pending entry, but only if at least one more pending
    /// entry stays behind for the worker.
    pub fn claim_second_earliest(&mut self) -> Option<Claim> {
        let first = {
            let mut positions = self.pending_positions();
            let first = positions.next()?;
            positions.next()?;
            first
        };
        Some(self.claim_at(first))
    }

    /// Opportunistic claim for the producer while it still has room to enqueue.
    ///
    /// Claims the earliest pending entry only when:
    /// - the pending count is within `near_full_slack` of capacity (and at least two are
    ///   pending, so the worker keeps a job),
    /// - the pending bytes left behind stay at or above `low_water_bytes`, and
    /// - the candidate is no larger than `max_size_ratio` times the mean size of the
    ///   pending entries it leaves behind.
    #[allow(clippy::cast_precision_loss)]
    pub fn claim_balanced(&mut self) -> Option<Claim> {
        if !self.policy.enabled || self.pending_count < 2 {
            return None;
        }
        if self.pending_count + self.policy.near_full_slack < self.capacity {
            return None;
        }

        let pos = self.pending_positions().next()?;
        let Entry::Pending(candidate) = &self.entries[pos] else {
            return None;
        };
        let size = candidate.len();
        let remaining_bytes = self.pending_bytes - size;
        if remaining_bytes < self.policy.low_water_bytes {
            return None;
        }
        // The baseline excludes the candidate, so one huge record cannot raise its own limit.
        let baseline = remaining_bytes as f64 / (self.pending_count - 1) as f64;
        if size as f64 > baseline * self.policy.max_size_ratio {
            return None;
        }

        Some(self.claim_at(pos))
    }

    /// Claim for the dedicated worker: the earliest pending entry, or the sentinel
    /// if every earlier entry has already been claimed.
    pub fn claim_for_worker(&mut self) -> WorkerClaim {
        let next = self.entries.iter().position(|e| matches!(e, Entry::Pending(_) | Entry::Sentinel));
        match next {
            Some(pos) if matches!(self.entries[pos], Entry::Sentinel) => WorkerClaim::Shutdown,
            Some(pos) => WorkerClaim::Job(self.claim_at(pos)),
            None => WorkerClaim::Idle,
        }
    }

    fn in_flight_position(&self, cookie: Cookie) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, Entry::InFlight(c) if *c == cookie))
            .ok_or_else(|| {
                PkgqError::Invariant(format!("no in-flight entry for cookie {}", cookie.get()))
            })
    }

    /// Store the output of a claimed entry without flushing.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if no in-flight entry carries `cookie`.
    pub fn complete(&mut self, cookie: Cookie, output: Vec<u8>) -> Result<()> {
        let pos = self.in_flight_position(cookie)?;
        self.entries[pos] = Entry::Done(output);
        Ok(())
    }

    fn write_output<W: Write + ?Sized>(&mut self, sink: &mut W, output: &[u8]) -> Result<()> {
        sink.write_all(output).map_err(PkgqError::Sink)?;
        self.records_flushed += 1;
        self.bytes_flushed += output.len() as u64;
        Ok(())
    }

    /// Write and remove the contiguous run of `Done` entries at the head.
    ///
    /// Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects a write.
    pub fn flush_prefix<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<usize> {
        let mut flushed = 0;
        while matches!(self.entries.front(), Some(Entry::Done(_))) {
            let Some(Entry::Done(output)) = self.entries.pop_front() else { unreachable!() };
            self.write_output(sink, &output)?;
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Complete a claimed entry and flush whatever became writable.
    ///
    /// An entry at the head is written straight away together with any finished
    /// successors; otherwise its output waits in place for an earlier completion.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown cookie or a failed sink write.
    pub fn put_back<W: Write + ?Sized>(
        &mut self,
        cookie: Cookie,
        output: Vec<u8>,
        sink: &mut W,
    ) -> Result<usize> {
        let pos = self.in_flight_position(cookie)?;
        if pos > 0 {
            self.entries[pos] = Entry::Done(output);
            return Ok(0);
        }

        self.entries.pop_front();
        self.write_output(sink, &output)?;
        Ok(1 + self.flush_prefix(sink)?)
    }

    /// Recount the pending set and compare it with the running bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an invariant error describing the mismatch.
    pub fn verify_bookkeeping(&self) -> Result<()> {
        let (count, bytes) = self
            .entries
            .iter()
            .filter_map(|e| match e {
                Entry::Pending(blob) => Some(blob.len()),
                _ => None,
            })
            .fold((0usize, 0usize), |(n, sum), len| (n + 1, sum + len));

        if count != self.pending_count || bytes != self.pending_bytes {
            return Err(PkgqError::Invariant(format!(
                "pending bookkeeping {}/{}B does not match queue contents {count}/{bytes}B",
                self.pending_count, self.pending_bytes
            )));
        }
        if self.entries.len() > self.capacity {
            return Err(PkgqError::Invariant(format!(
                "queue holds {} entries but capacity is {}",
                self.entries.len(),
                self.capacity
            )));
        }
        Ok(())
    }

    /// Whether the only thing left is the end-of-input sentinel.
    #[must_use]
    pub fn holds_only_sentinel(&self) -> bool {
        self.entries.len() == 1 && matches!(self.entries[0], Entry::Sentinel)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries awaiting a claim.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    /// Total size of the blobs awaiting a claim.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Number of entries currently held by a claimant.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e, Entry::InFlight(_))).count()
    }

    /// Records written to the sink so far.
    #[must_use]
    pub fn records_flushed(&self) -> u64 {
        self.records_flushed
    }

    /// Output bytes written to the sink so far.
    #[must_use]
    pub fn bytes_flushed(&self) -> u64 {
        self.bytes_flushed
    }
}
