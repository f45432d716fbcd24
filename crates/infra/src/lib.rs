//! # DraftPress Infrastructure
//!
//! Adapter implementations of the core pipeline ports.
//!
//! This crate contains:
//! - SQLite persistence (pooled rusqlite): work units, job queue, metrics
//! - The fire-and-forget webhook notifier (reqwest)
//!
//! ## Architecture
//! - Implements traits defined in `draftpress-core`
//! - Contains all "impure" code (database, HTTP)
//! - Blocking SQLite work runs on `tokio::task::spawn_blocking`

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod database;
pub mod errors;
pub mod notify;

pub use database::{DbManager, SqliteJobQueue, SqliteMetricsSink, SqliteWorkUnitStore};
pub use errors::InfraError;
pub use notify::WebhookNotifier;
