use serde::{Deserialize, Serialize};

/// A single rating event.
///
/// Source-of-truth rows in the store are keyed `user_id` + `_` + `movie_id`;
/// the timestamp is carried as opaque text and never parsed for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: String,
    pub movie_id: String,
    pub rating: f64,
    pub timestamp: String,
}

impl Rating {
    /// Row key in the ratings table.
    pub fn row_key(&self) -> String {
        format!("{}_{}", self.user_id, self.movie_id)
    }

    /// Split a ratings row key back into `(user_id, movie_id)`.
    ///
    /// Returns `None` for keys that do not match the `user_movie` layout.
    pub fn split_row_key(key: &str) -> Option<(&str, &str)> {
        let (user_id, movie_id) = key.split_once('_')?;
        if user_id.is_empty() || movie_id.is_empty() || movie_id.contains('_') {
            return None;
        }
        Some((user_id, movie_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_key_round_trip() {
        let rating = Rating {
            user_id: "42".to_string(),
            movie_id: "318".to_string(),
            rating: 5.0,
            timestamp: "964982703".to_string(),
        };
        assert_eq!(rating.row_key(), "42_318");
        assert_eq!(Rating::split_row_key("42_318"), Some(("42", "318")));
    }

    #[test]
    fn split_rejects_malformed_keys() {
        assert_eq!(Rating::split_row_key("no-separator"), None);
        assert_eq!(Rating::split_row_key("_318"), None);
        assert_eq!(Rating::split_row_key("42_"), None);
    }
}
