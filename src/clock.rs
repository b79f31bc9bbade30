//! Discovery sequencing and timestamping for first-touch events
//!
//! This module couples a gapless atomic discovery counter with a low-overhead
//! timestamp source. The registry consults it exactly once per genuine first
//! touch, so the sequence values handed out are a permutation of `0..N-1`
//! where N is the number of distinct pages discovered.
//!
//! Timestamps are raw ticks from the cheapest source the platform offers
//! (TSC on x86_64, monotonic clock elsewhere). They are sampled immediately
//! after the sequence assignment, but core migration and per-core counter
//! skew mean that timestamps of *different* sequences are only ordered in
//! expectation, never guaranteed.

use std::sync::atomic::{AtomicU64, Ordering};

/// A discovery stamp: position in global discovery order plus the raw
/// timestamp sampled at assignment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// 0-based discovery sequence, unique across all threads, no gaps.
    pub sequence: u64,
    /// Raw tick sample taken right after the sequence was assigned.
    pub timestamp: u64,
}

/// Strictly increasing discovery counter with an attached timestamp source.
///
/// # Thread Safety
///
/// `SequenceClock` is thread-safe and lock-free: `next()` is a single atomic
/// `fetch_add` plus a timestamp read. It can be shared across threads via
/// `Arc` or used as a global static.
#[derive(Debug)]
pub struct SequenceClock {
    counter: AtomicU64,
}

impl SequenceClock {
    /// Create a new clock starting at sequence 0.
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Assign the next discovery sequence and sample the timestamp source.
    ///
    /// Every caller receives a unique `sequence`; no value is ever skipped
    /// or handed out twice, regardless of how many threads call in.
    pub fn next(&self) -> Stamp {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst);
        Stamp {
            sequence,
            timestamp: raw_ticks(),
        }
    }

    /// Number of sequences assigned so far.
    pub fn assigned(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl Default for SequenceClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample the platform timestamp source.
///
/// On x86_64 this reads the TSC directly, the cheapest sample available
/// inside an instrumented program.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn raw_ticks() -> u64 {
    // SAFETY: RDTSC reads a counter register and has no memory effects.
    unsafe { core::arch::x86_64::_rdtsc() }
}

/// Sample the platform timestamp source.
///
/// Portable fallback: nanoseconds since the first sample in this process,
/// from the monotonic OS clock. Degrades to 0 on overflow rather than
/// failing; only the relative-timing column of the report suffers.
#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn raw_ticks() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(0)
}
