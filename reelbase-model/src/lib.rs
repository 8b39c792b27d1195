//! Shared domain types for the reelbase movie catalog.
//!
//! Everything here is plain data: the store repositories, the aggregation
//! job, the search index, and the operator CLI all exchange these types.

pub mod job;
pub mod movie;
pub mod rating;
pub mod stats;

pub use job::{JobState, JobStatus};
pub use movie::Movie;
pub use rating::Rating;
pub use stats::{IngestSummary, RatingStats};
