// src/lib.rs
// #![allow(dead_code)]
// #![allow(unused)]

#[macro_use]
pub mod macros;

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod table;

pub mod acquire;
pub mod chain;
pub mod csv;
pub mod log;
pub mod normalize;
pub mod process;
pub mod progress;
pub mod runner;
pub mod sources;
pub mod store;

pub use acquire::{Acquisition, DataAcquisition, Provenance};
pub use config::{AppOptions, DatasetKind};
pub use error::{AcquireError, SourceError};
pub use table::{CanonicalDataset, RawRecordSet};
