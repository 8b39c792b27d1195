use serde::{Deserialize, Serialize};

/// A catalog entry as stored in the wide-column store and mirrored,
/// denormalized, in the search index file.
///
/// `id` is an opaque stable string key. Statistics default to zero until the
/// first aggregation run publishes real values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    /// Pipe-separated free text, e.g. `"Drama|Comedy"`.
    pub genres: String,
    #[serde(default)]
    pub avg_rating: f64,
    #[serde(default)]
    pub rating_count: u64,
}

impl Movie {
    /// A catalog entry with no published statistics yet.
    pub fn new(id: impl Into<String>, title: impl Into<String>, genres: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            genres: genres.into(),
            avg_rating: 0.0,
            rating_count: 0,
        }
    }
}
