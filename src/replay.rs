//! Offline replay of recorded instrumentation event streams
//!
//! The engine normally runs embedded in a binary-instrumentation host that
//! calls the classifier entry points directly. For diagnostics and testing,
//! the same entry points can be driven from a recorded stream: one JSON
//! event per line, in the order the host observed them.
//!
//! ```text
//! {"event":"code_fetch","addr":4096}
//! {"event":"data_store","addr":12368,"insn":8208}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::AccessClassifier;

/// Errors that can occur while replaying an event stream
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read event stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed event on line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
}

/// One recorded instrumentation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Basic-block code fetch at `addr`.
    CodeFetch { addr: u64 },
    /// Store to `addr` issued by the instruction at `insn`.
    DataStore { addr: u64, insn: u64 },
}

/// Feed every event from `reader` through the classifier.
///
/// Returns the number of events replayed. Blank lines are skipped; a
/// malformed line aborts the replay with its 1-based line number.
pub fn replay_reader<R: BufRead>(
    reader: R,
    classifier: &AccessClassifier,
) -> Result<u64, ReplayError> {
    let mut events = 0u64;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: TraceEvent =
            serde_json::from_str(&line).map_err(|source| ReplayError::Malformed {
                line: index + 1,
                source,
            })?;
        match event {
            TraceEvent::CodeFetch { addr } => classifier.on_code_fetch(addr),
            TraceEvent::DataStore { addr, insn } => classifier.on_data_store(addr, insn),
        }
        events += 1;
    }
    Ok(events)
}

/// Replay the event stream recorded at `path`.
pub fn replay_file(path: &Path, classifier: &AccessClassifier) -> Result<u64, ReplayError> {
    let file = File::open(path)?;
    replay_reader(BufReader::new(file), classifier)
}
