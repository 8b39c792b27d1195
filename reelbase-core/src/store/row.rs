//! Row decoding with the defined-default contract: every stored field has a
//! default when absent (empty string for text, zero for numerics), so a
//! partial write never produces a missing-field error.

use reelbase_model::{Movie, Rating};
use std::collections::HashMap;

pub(crate) const F_TITLE: &str = "info:title";
pub(crate) const F_GENRES: &str = "info:genres";
pub(crate) const F_AVG_RATING: &str = "info:avg_rating";
pub(crate) const F_RATING_COUNT: &str = "info:rating_count";
pub(crate) const F_RATING: &str = "data:rating";
pub(crate) const F_TIMESTAMP: &str = "data:timestamp";

pub(crate) type Row = HashMap<String, String>;

fn text(row: &Row, field: &str) -> String {
    row.get(field).cloned().unwrap_or_default()
}

fn float(row: &Row, field: &str) -> f64 {
    row.get(field).and_then(|v| v.parse().ok()).unwrap_or(0.0)
}

fn count(row: &Row, field: &str) -> u64 {
    row.get(field).and_then(|v| v.parse().ok()).unwrap_or(0)
}

pub(crate) fn decode_movie(id: &str, row: &Row) -> Movie {
    Movie {
        id: id.to_string(),
        title: text(row, F_TITLE),
        genres: text(row, F_GENRES),
        avg_rating: float(row, F_AVG_RATING),
        rating_count: count(row, F_RATING_COUNT),
    }
}

pub(crate) fn decode_rating(user_id: &str, movie_id: &str, row: &Row) -> Rating {
    Rating {
        user_id: user_id.to_string(),
        movie_id: movie_id.to_string(),
        rating: float(row, F_RATING),
        timestamp: text(row, F_TIMESTAMP),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_decode_to_defaults() {
        let row = Row::new();
        let movie = decode_movie("12", &row);
        assert_eq!(movie.id, "12");
        assert_eq!(movie.title, "");
        assert_eq!(movie.genres, "");
        assert_eq!(movie.avg_rating, 0.0);
        assert_eq!(movie.rating_count, 0);
    }

    #[test]
    fn populated_row_decodes() {
        let mut row = Row::new();
        row.insert(F_TITLE.to_string(), "Heat (1995)".to_string());
        row.insert(F_GENRES.to_string(), "Action|Crime|Thriller".to_string());
        row.insert(F_AVG_RATING.to_string(), "3.95".to_string());
        row.insert(F_RATING_COUNT.to_string(), "1247".to_string());

        let movie = decode_movie("6", &row);
        assert_eq!(movie.title, "Heat (1995)");
        assert_eq!(movie.avg_rating, 3.95);
        assert_eq!(movie.rating_count, 1247);
    }

    #[test]
    fn unparseable_numerics_fall_back_to_zero() {
        let mut row = Row::new();
        row.insert(F_RATING.to_string(), "not-a-number".to_string());
        let rating = decode_rating("7", "42", &row);
        assert_eq!(rating.rating, 0.0);
        assert_eq!(rating.timestamp, "");
    }
}
