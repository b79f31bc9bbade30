//! Pagein - page first-touch tracking and reporting engine
//!
//! This library determines the order and timing in which memory pages are
//! first touched during a program's execution, to diagnose startup and
//! page-in latency. It is designed to run embedded inside a
//! binary-instrumentation host that forwards basic-block code fetches and
//! store instructions to the two [`classifier::AccessClassifier`] entry
//! points; a replay driver is included for feeding recorded event streams
//! through the same path.

pub mod classifier;
pub mod cli;
pub mod clock;
pub mod registry;
pub mod replay;
pub mod report;
pub mod symbolize;
