// src/progress.rs
use crate::acquire::Provenance;
use crate::config::DatasetKind;

/// Lightweight progress reporting for a run. The CLI prints these; tests
/// can record them.
pub trait Progress {
    /// Called at the start with the number of datasets to acquire.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// One dataset acquired.
    fn item_done(&mut self, _kind: DatasetKind, _provenance: &Provenance) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}
