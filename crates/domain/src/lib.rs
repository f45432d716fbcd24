//! Domain layer for the DraftPress pipeline.
//!
//! Pure data types and the error taxonomy shared by every other crate.
//! Nothing here performs I/O.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod errors;
pub mod types;

pub use errors::{PipelineError, Result};
pub use types::{
    Article, GeneratedText, JobOutcome, JobStatus, Product, QueuedJob, RunOutcome, WorkUnit,
    WorkUnitStatus,
};
