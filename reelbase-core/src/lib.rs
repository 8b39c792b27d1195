//! # Reelbase Core
//!
//! Core library for the reelbase movie catalog: resilient access to the
//! external wide-column store, the offline rating aggregation pipeline, and
//! file-based supervision of the aggregation job.
//!
//! ## Overview
//!
//! - [`store`]: a reconnecting store client, typed repositories for movie and
//!   rating rows, and the retry policy that recovers from transient
//!   connection loss.
//! - [`aggregate`]: chunked `(sum, count)` accumulation over the raw rating
//!   log and the publisher that pushes results into both the store and the
//!   denormalized search index file.
//! - [`jobs`]: the job controller supervising the aggregation run as a
//!   detached process, coordinated exclusively through durable status, log
//!   and pid files.
//! - [`index`]: the in-memory search index serving ranked substring lookups
//!   without touching the store.
//! - [`ingest`]: one-time catalog import from CSV into store and index.
//!
//! The serving layer and the operator CLI construct a [`config::Settings`],
//! wire the pieces together explicitly, and consume the public surfaces of
//! [`jobs::JobController`] and [`index::SearchIndex`]. There is no ambient
//! global state.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod jobs;
pub mod store;

pub use config::Settings;
pub use error::{CatalogError, Result};
