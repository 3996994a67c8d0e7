use std::time::{Duration, Instant};

// Fragments from the upstream stream are accumulated and flushed as a
// single progress event when either threshold is exceeded. This keeps the
// event volume far below one-event-per-token while a client-side typewriter
// animation smooths out the visual presentation.
//
// Two-phase batching:
// 1) The first batch uses aggressive thresholds to improve time-to-first-token.
// 2) Subsequent batches use larger thresholds to keep event volume efficient.

/// First batch: flush when 3 fragments accumulated
pub const FIRST_BATCH_MAX_FRAGMENTS: usize = 3;
/// First batch: flush at most every 100 ms
pub const FIRST_BATCH_MAX_INTERVAL: Duration = Duration::from_millis(100);
/// Steady state: flush when 20 fragments accumulated
pub const STEADY_MAX_FRAGMENTS: usize = 20;
/// Steady state: flush at most every 300 ms
pub const STEADY_MAX_INTERVAL: Duration = Duration::from_millis(300);

/// One phase's flush thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushThresholds {
    pub max_fragments: usize,
    pub max_interval: Duration,
}

/// Two-phase threshold selector
///
/// Starts in the first-batch phase; the first flush switches it to the
/// steady-state phase permanently for the rest of the session.
#[derive(Debug, Clone)]
pub struct FlushPolicy {
    first_batch: FlushThresholds,
    steady: FlushThresholds,
    steady_active: bool,
}

impl FlushPolicy {
    pub fn new(first_batch: FlushThresholds, steady: FlushThresholds) -> Self {
        Self {
            first_batch,
            steady,
            steady_active: false,
        }
    }

    /// Thresholds for the current phase
    pub fn active(&self) -> FlushThresholds {
        if self.steady_active {
            self.steady
        } else {
            self.first_batch
        }
    }

    pub fn is_steady(&self) -> bool {
        self.steady_active
    }

    /// One-way transition taken on the first flush
    fn mark_flushed(&mut self) {
        self.steady_active = true;
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::new(
            FlushThresholds {
                max_fragments: FIRST_BATCH_MAX_FRAGMENTS,
                max_interval: FIRST_BATCH_MAX_INTERVAL,
            },
            FlushThresholds {
                max_fragments: STEADY_MAX_FRAGMENTS,
                max_interval: STEADY_MAX_INTERVAL,
            },
        )
    }
}

/// Immutable result of draining the batch buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushedBatch {
    /// Strictly increasing across the session, never reused; equals the
    /// order the sink observes the batch in
    pub seq: u64,
    pub text: String,
    pub fragments: usize,
}

/// Accumulates stream fragments and decides when a batch is ready
///
/// `should_flush` is a pure check against the active thresholds; time is
/// passed in so callers (and tests) control the clock. Only one task may
/// own a batcher; nothing here is shared.
pub struct TokenBatcher {
    buffer: Vec<String>,
    policy: FlushPolicy,
    next_seq: u64,
    last_flush: Instant,
}

impl TokenBatcher {
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            buffer: Vec::new(),
            policy,
            next_seq: 1,
            last_flush: Instant::now(),
        }
    }

    /// Append a fragment to the current batch
    pub fn push(&mut self, fragment: impl Into<String>) {
        self.buffer.push(fragment.into());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    /// Batches flushed so far this session
    pub fn batches_flushed(&self) -> u64 {
        self.next_seq - 1
    }

    /// True when the active phase's fragment-count or interval threshold is
    /// reached; never true while the batch is empty
    pub fn should_flush(&self, now: Instant) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        let thresholds = self.policy.active();
        self.buffer.len() >= thresholds.max_fragments
            || now.duration_since(self.last_flush) >= thresholds.max_interval
    }

    /// Drain the buffer into an ordered text blob and reset the timer
    ///
    /// An empty buffer is a no-op: no batch, no sequence number consumed,
    /// no phase transition.
    pub fn flush(&mut self, now: Instant) -> Option<FlushedBatch> {
        if self.buffer.is_empty() {
            return None;
        }
        let fragments = self.buffer.len();
        let text = std::mem::take(&mut self.buffer).concat();
        self.last_flush = now;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.policy.mark_flushed();
        Some(FlushedBatch {
            seq,
            text,
            fragments,
        })
    }
}

impl Default for TokenBatcher {
    fn default() -> Self {
        Self::new(FlushPolicy::default())
    }
}
