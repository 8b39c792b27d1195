use super::client::StoreClient;
use super::retry::RetryPolicy;
use super::row::{self, Row};
use crate::config::Settings;
use crate::error::Result;
use redis::aio::MultiplexedConnection;
use reelbase_model::{Movie, RatingStats};
use std::sync::Arc;
use tracing::{debug, warn};

/// Typed access to the movies table.
///
/// Every read is wrapped by the retry policy: a connection-signature failure
/// forces the store client to drop its handle and the operation is re-run on
/// a freshly acquired connection. Other errors propagate immediately.
#[derive(Debug)]
pub struct MovieRepository {
    client: Arc<StoreClient>,
    table: String,
    max_scan_rows: usize,
    retry: RetryPolicy,
}

impl MovieRepository {
    pub fn new(client: Arc<StoreClient>, settings: &Settings) -> Self {
        Self {
            client,
            table: settings.movies_table.clone(),
            max_scan_rows: settings.max_scan_rows,
            retry: RetryPolicy::default(),
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.table, id)
    }

    fn pattern(&self) -> String {
        format!("{}:*", self.table)
    }

    fn id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.table)
            .and_then(|rest| rest.strip_prefix(':'))
    }

    async fn reconnect(&self) {
        self.client.release().await;
    }

    /// Fetch one movie row; absent rows decode to `None`, not an error.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Movie>> {
        self.retry
            .run(|| self.find_by_id_once(id), || self.reconnect())
            .await
    }

    async fn find_by_id_once(&self, id: &str) -> Result<Option<Movie>> {
        let mut conn = self.client.acquire().await?;
        let data: Row = redis::cmd("HGETALL")
            .arg(self.key(id))
            .query_async(&mut conn)
            .await?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(row::decode_movie(id, &data)))
    }

    /// Scan the movies table, optionally stopping after `limit` rows.
    /// Results are returned in ascending numeric id order.
    pub async fn find_all(&self, limit: Option<usize>) -> Result<Vec<Movie>> {
        self.retry
            .run(|| self.find_all_once(limit), || self.reconnect())
            .await
    }

    async fn find_all_once(&self, limit: Option<usize>) -> Result<Vec<Movie>> {
        let mut conn = self.client.acquire().await?;
        let mut movies = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (next, keys) = scan_batch(&mut conn, &self.pattern(), cursor).await?;
            cursor = next;

            let mut keys = keys;
            if let Some(limit) = limit {
                let remaining = limit.saturating_sub(movies.len());
                keys.truncate(remaining);
            }
            for (key, data) in fetch_rows(&mut conn, keys).await? {
                if let Some(id) = self.id_from_key(&key) {
                    movies.push(row::decode_movie(id, &data));
                }
            }

            let done = limit.is_some_and(|l| movies.len() >= l);
            if done || cursor == 0 {
                break;
            }
        }

        sort_by_numeric_id(&mut movies);
        Ok(movies)
    }

    /// Case-insensitive substring scan over title and genres, bounded by the
    /// configured scan budget. Exceeding the budget truncates the result with
    /// a warning; it never fails.
    pub async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<Movie>> {
        self.retry
            .run(|| self.search_text_once(query, limit), || self.reconnect())
            .await
    }

    async fn search_text_once(&self, query: &str, limit: usize) -> Result<Vec<Movie>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.client.acquire().await?;
        let mut matched = Vec::new();
        let mut examined = 0usize;
        let mut cursor = 0u64;

        'scan: loop {
            let (next, mut keys) = scan_batch(&mut conn, &self.pattern(), cursor).await?;
            cursor = next;

            let truncated = apply_scan_budget(&mut keys, self.max_scan_rows, examined);
            examined += keys.len();

            for (key, data) in fetch_rows(&mut conn, keys).await? {
                let Some(id) = self.id_from_key(&key) else {
                    continue;
                };
                let movie = row::decode_movie(id, &data);
                if movie.title.to_lowercase().contains(&needle)
                    || movie.genres.to_lowercase().contains(&needle)
                {
                    matched.push(movie);
                    if matched.len() >= limit {
                        break 'scan;
                    }
                }
            }

            if truncated {
                warn!(
                    budget = self.max_scan_rows,
                    "text scan exceeded its row budget, truncating results"
                );
                break;
            }
            if cursor == 0 {
                break;
            }
        }

        debug!(examined, matches = matched.len(), "text scan finished");
        Ok(matched)
    }

    /// Batched statistics write used by the publisher: one pipelined
    /// round-trip per call, average formatted to two decimals.
    pub async fn put_stats_batch(&self, batch: &[(String, RatingStats)]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.acquire().await?;
        let mut pipe = redis::pipe();
        for (id, stats) in batch {
            pipe.cmd("HSET")
                .arg(self.key(id))
                .arg(row::F_AVG_RATING)
                .arg(format!("{:.2}", stats.avg))
                .arg(row::F_RATING_COUNT)
                .arg(stats.count.to_string())
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Batched catalog write used by ingest.
    pub async fn put_movies_batch(&self, movies: &[Movie]) -> Result<()> {
        if movies.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.acquire().await?;
        let mut pipe = redis::pipe();
        for movie in movies {
            pipe.cmd("HSET")
                .arg(self.key(&movie.id))
                .arg(row::F_TITLE)
                .arg(&movie.title)
                .arg(row::F_GENRES)
                .arg(&movie.genres)
                .arg(row::F_AVG_RATING)
                .arg(format!("{:.2}", movie.avg_rating))
                .arg(row::F_RATING_COUNT)
                .arg(movie.rating_count.to_string())
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

/// Cap one scan batch at the remaining row budget: truncates `keys` so the
/// total examined never exceeds `budget`, and reports whether the batch was
/// cut short (meaning the scan must stop after this batch).
pub(super) fn apply_scan_budget(keys: &mut Vec<String>, budget: usize, examined: usize) -> bool {
    let budget_left = budget.saturating_sub(examined);
    let truncated = keys.len() > budget_left;
    keys.truncate(budget_left);
    truncated
}

/// One `SCAN` round-trip; returns the next cursor and the batch of keys.
pub(super) async fn scan_batch(
    conn: &mut MultiplexedConnection,
    pattern: &str,
    cursor: u64,
) -> Result<(u64, Vec<String>)> {
    let reply: (u64, Vec<String>) = redis::cmd("SCAN")
        .arg(cursor)
        .arg("MATCH")
        .arg(pattern)
        .arg("COUNT")
        .arg(500)
        .query_async(conn)
        .await?;
    Ok(reply)
}

/// Fetch full rows for a batch of keys in one pipelined round-trip.
pub(super) async fn fetch_rows(
    conn: &mut MultiplexedConnection,
    keys: Vec<String>,
) -> Result<Vec<(String, Row)>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut pipe = redis::pipe();
    for key in &keys {
        pipe.cmd("HGETALL").arg(key);
    }
    let rows: Vec<Row> = pipe.query_async(conn).await?;
    Ok(keys.into_iter().zip(rows).collect())
}

fn sort_by_numeric_id(movies: &mut [Movie]) {
    movies.sort_by(|a, b| match (a.id.parse::<u64>(), b.id.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.id.cmp(&b.id),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("movies:{i}")).collect()
    }

    #[test]
    fn scan_budget_caps_examined_rows_exactly() {
        // Budget 5 against batches carrying 8 rows: exactly 5 survive.
        let mut examined = 0;
        let mut first = batch(3);
        assert!(!apply_scan_budget(&mut first, 5, examined));
        examined += first.len();
        assert_eq!(first.len(), 3);

        let mut second = batch(5);
        assert!(apply_scan_budget(&mut second, 5, examined));
        examined += second.len();

        assert_eq!(second.len(), 2);
        assert_eq!(examined, 5);
    }

    #[test]
    fn scan_budget_yields_nothing_once_spent() {
        let mut keys = batch(4);
        assert!(apply_scan_budget(&mut keys, 5, 5));
        assert!(keys.is_empty());
    }

    #[test]
    fn batches_within_budget_pass_untouched() {
        let mut keys = batch(4);
        assert!(!apply_scan_budget(&mut keys, 10, 2));
        assert_eq!(keys.len(), 4);

        // A batch landing exactly on the budget is complete, not truncated.
        let mut keys = batch(4);
        assert!(!apply_scan_budget(&mut keys, 6, 2));
        assert_eq!(keys.len(), 4);
    }
}
