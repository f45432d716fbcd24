//! # DraftPress Core
//!
//! Pure orchestration layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for every external collaborator
//! - Artifact assembly and structural validation rules
//! - The pipeline driver composing the resilience primitives
//!
//! ## Architecture Principles
//! - Only depends on `draftpress-common` and `draftpress-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod pipeline;

pub use pipeline::driver::{PipelineConfig, PipelineDeps, PipelineDriver};
pub use pipeline::ports::{
    ArticleGenerator, ArticlePublisher, ImageSource, JobQueue, MetricsSink, NotificationSink,
    ProductSource, WorkUnitStore,
};
