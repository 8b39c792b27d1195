//! Offline recomputation of per-movie rating statistics.
//!
//! The engine streams the raw rating log in fixed-size chunks and keeps one
//! running `(sum, count)` per distinct movie, so memory is bounded by the
//! catalog size, not the log size. The publisher then makes the result
//! durable in both representations: batched writes into the store first,
//! then an atomic rewrite of the denormalized index file.

pub mod engine;
pub mod publisher;

pub use engine::RatingAggregator;
pub use publisher::StatsPublisher;
