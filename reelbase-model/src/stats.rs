use serde::{Deserialize, Serialize};

/// Per-movie aggregate derived from one full pass over the rating log.
///
/// Only movies observed at least once in the log get an entry; there is no
/// zero-filling for the rest of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    /// Plain arithmetic mean of the observed ratings.
    pub avg: f64,
    pub count: u64,
}

/// Outcome of a one-time catalog import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub movies_stored: usize,
    pub ratings_stored: usize,
    pub index_entries: usize,
    /// Input rows skipped because they failed to parse.
    pub rows_skipped: usize,
}
