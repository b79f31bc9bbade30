//! Classification of instrumentation events into page first-touches
//!
//! The instrumentation host calls two entry points: one per basic block (and
//! per in-block page crossing) for code fetches, one per store instruction
//! for data writes. Code marks arrive pre-deduplicated by the host's page
//! transition logic; stores arrive at full rate, so the data path keeps a
//! one-slot cache of the last data page to avoid probing the registry for
//! every store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::registry::{page_of, PageOrigin, PageRegistry};

/// Resolves an instruction address to a human-readable location string.
///
/// Provided by the embedding host's debug-info service. Resolution is
/// comparatively expensive; the classifier consults it only when a page is
/// genuinely new.
pub trait Describe: Send + Sync {
    /// Describe the instruction at `addr`, e.g. `main+0x24 (main.rs:10)`.
    fn describe(&self, addr: u64) -> String;
}

impl<F> Describe for F
where
    F: Fn(u64) -> String + Send + Sync,
{
    fn describe(&self, addr: u64) -> String {
        self(addr)
    }
}

/// Sentinel for "no data page cached yet". Never page-aligned, so it can
/// never compare equal to a real page id.
const NO_PAGE: u64 = u64::MAX;

/// Routes code-fetch and data-store events into the registry.
///
/// The last-data-page cache is a single slot shared by all execution
/// streams. Under concurrent instrumented threads it can over-call the
/// registry (harmless, the registry dedups) and can miss a genuine first
/// touch when two threads interleave stores to one page; accepted
/// inaccuracy, see DESIGN.md.
pub struct AccessClassifier {
    registry: Arc<PageRegistry>,
    describer: Arc<dyn Describe>,
    last_data_page: AtomicU64,
}

impl AccessClassifier {
    /// Wire the classifier to the process-wide registry and the host's
    /// location resolver.
    pub fn new(registry: Arc<PageRegistry>, describer: Arc<dyn Describe>) -> Self {
        Self {
            registry,
            describer,
            last_data_page: AtomicU64::new(NO_PAGE),
        }
    }

    /// The registry this classifier feeds.
    pub fn registry(&self) -> &Arc<PageRegistry> {
        &self.registry
    }

    /// Entry point for a basic-block code fetch at `insn_addr`.
    ///
    /// Called by the host once per instrumented basic block and whenever a
    /// block crosses into a page different from the previously marked one.
    pub fn on_code_fetch(&self, insn_addr: u64) {
        let page_id = page_of(insn_addr);
        self.registry.record_first_touch(page_id, PageOrigin::Code, || {
            self.describer.describe(insn_addr)
        });
    }

    /// Entry point for a store to `target_addr` issued by the instruction
    /// at `insn_addr`.
    ///
    /// The location recorded for a data page is that of the triggering
    /// instruction, not the store target. Consecutive stores landing on the
    /// cached page return without touching the registry.
    pub fn on_data_store(&self, target_addr: u64, insn_addr: u64) {
        let page_id = page_of(target_addr);
        if self.last_data_page.swap(page_id, Ordering::Relaxed) == page_id {
            return;
        }
        self.registry.record_first_touch(page_id, PageOrigin::Data, || {
            self.describer.describe(insn_addr)
        });
    }
}
