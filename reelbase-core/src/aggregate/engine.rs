use crate::error::Result;
use reelbase_model::RatingStats;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// One parsed row of the rating log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub movie_id: String,
    pub rating: f64,
}

impl LogRow {
    /// Parse a `userId,movieId,rating,timestamp` line. Returns `None` for the
    /// header and for rows that do not carry a numeric rating.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().split(',');
        let _user_id = fields.next()?;
        let movie_id = fields.next()?;
        let rating: f64 = fields.next()?.parse().ok()?;
        if movie_id.is_empty() {
            return None;
        }
        Some(Self {
            movie_id: movie_id.to_string(),
            rating,
        })
    }
}

/// Accumulates `(sum, count)` per movie across chunks of the rating log.
///
/// Accumulation order across chunks is irrelevant to the result; only movies
/// observed at least once appear in the output.
#[derive(Debug, Default)]
pub struct RatingAggregator {
    totals: HashMap<String, (f64, u64)>,
    rows_seen: u64,
    rows_skipped: u64,
}

impl RatingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk of parsed rows into the running totals.
    pub fn observe_chunk(&mut self, rows: &[LogRow]) {
        for row in rows {
            let entry = self.totals.entry(row.movie_id.clone()).or_insert((0.0, 0));
            entry.0 += row.rating;
            entry.1 += 1;
        }
        self.rows_seen += rows.len() as u64;
    }

    /// Rows that parsed successfully so far.
    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    /// Rows dropped as unparseable so far.
    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    /// Distinct movies observed so far.
    pub fn distinct_movies(&self) -> usize {
        self.totals.len()
    }

    /// Collapse the running totals into per-movie `(avg, count)`.
    pub fn finish(self) -> HashMap<String, RatingStats> {
        self.totals
            .into_iter()
            .map(|(movie_id, (sum, count))| {
                (
                    movie_id,
                    RatingStats {
                        avg: sum / count as f64,
                        count,
                    },
                )
            })
            .collect()
    }

    /// Stream a rating log file through the aggregator in chunks of
    /// `chunk_size` lines, reporting after every chunk through `on_chunk`
    /// with the number of rows processed so far.
    pub async fn aggregate_log(
        mut self,
        path: &Path,
        chunk_size: usize,
        mut on_chunk: impl FnMut(u64),
    ) -> Result<HashMap<String, RatingStats>> {
        info!(path = %path.display(), "reading rating log");

        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut chunk = Vec::with_capacity(chunk_size);
        let mut first = true;

        while let Some(line) = lines.next_line().await? {
            match LogRow::parse(&line) {
                Some(row) => chunk.push(row),
                None => {
                    // The header parses as no row; anything later is noise.
                    if !first {
                        self.rows_skipped += 1;
                        warn!(line = %line.trim(), "skipping unparseable rating row");
                    }
                }
            }
            first = false;

            if chunk.len() >= chunk_size {
                self.observe_chunk(&chunk);
                chunk.clear();
                on_chunk(self.rows_seen);
                debug!(
                    rows = self.rows_seen,
                    movies = self.distinct_movies(),
                    "aggregation chunk folded"
                );
            }
        }

        if !chunk.is_empty() {
            self.observe_chunk(&chunk);
            on_chunk(self.rows_seen);
        }

        info!(
            rows = self.rows_seen,
            skipped = self.rows_skipped,
            movies = self.distinct_movies(),
            "rating log aggregated"
        );
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(movie_id: &str, rating: f64) -> LogRow {
        LogRow {
            movie_id: movie_id.to_string(),
            rating,
        }
    }

    #[test]
    fn parses_data_rows_and_rejects_header() {
        assert_eq!(
            LogRow::parse("1,318,5.0,964982703"),
            Some(row("318", 5.0))
        );
        assert_eq!(LogRow::parse("userId,movieId,rating,timestamp"), None);
        assert_eq!(LogRow::parse("1,318,not-a-rating,0"), None);
        assert_eq!(LogRow::parse(""), None);
    }

    #[test]
    fn averages_and_counts_match_occurrences() {
        let mut agg = RatingAggregator::new();
        agg.observe_chunk(&[row("m1", 4.0), row("m1", 2.0), row("m2", 5.0)]);
        let stats = agg.finish();

        assert_eq!(stats.len(), 2);
        assert!((stats["m1"].avg - 3.0).abs() < f64::EPSILON);
        assert_eq!(stats["m1"].count, 2);
        assert!((stats["m2"].avg - 5.0).abs() < f64::EPSILON);
        assert_eq!(stats["m2"].count, 1);
    }

    #[test]
    fn unseen_movies_are_absent() {
        let mut agg = RatingAggregator::new();
        agg.observe_chunk(&[row("m1", 3.5)]);
        let stats = agg.finish();
        assert!(!stats.contains_key("m2"));
    }

    #[test]
    fn chunk_boundaries_do_not_change_the_result() {
        let rows = [
            row("m1", 1.0),
            row("m2", 4.0),
            row("m1", 3.0),
            row("m3", 2.5),
            row("m1", 5.0),
        ];

        let mut whole = RatingAggregator::new();
        whole.observe_chunk(&rows);
        let whole = whole.finish();

        let mut split = RatingAggregator::new();
        split.observe_chunk(&rows[..2]);
        split.observe_chunk(&rows[2..4]);
        split.observe_chunk(&rows[4..]);
        let split = split.finish();

        assert_eq!(whole.len(), split.len());
        for (movie_id, stats) in &whole {
            let other = &split[movie_id];
            assert!((stats.avg - other.avg).abs() < 1e-12);
            assert_eq!(stats.count, other.count);
        }
    }

    #[tokio::test]
    async fn aggregates_a_log_file_in_chunks() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userId,movieId,rating,timestamp").unwrap();
        for i in 0..10 {
            writeln!(file, "{i},7,4.0,100000{i}").unwrap();
        }
        writeln!(file, "3,9,2.0,1000011").unwrap();
        writeln!(file, "garbage line").unwrap();

        let mut reports = Vec::new();
        let stats = RatingAggregator::new()
            .aggregate_log(file.path(), 4, |rows| reports.push(rows))
            .await
            .unwrap();

        assert_eq!(stats["7"].count, 10);
        assert!((stats["7"].avg - 4.0).abs() < f64::EPSILON);
        assert_eq!(stats["9"].count, 1);
        // 11 data rows in chunks of 4 -> reports after 4, 8, and the tail.
        assert_eq!(reports, vec![4, 8, 11]);
    }
}
