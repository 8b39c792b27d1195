use super::client::StoreClient;
use super::movies::{apply_scan_budget, fetch_rows, scan_batch};
use super::retry::RetryPolicy;
use super::row;
use crate::config::Settings;
use crate::error::Result;
use reelbase_model::Rating;
use std::sync::Arc;
use tracing::{debug, warn};

/// Typed access to the ratings table.
///
/// The table is keyed `user_id` + `_` + `movie_id`, so a lookup by movie has
/// no usable key prefix and degenerates into a budgeted full scan, while a
/// lookup by user rides a prefix pattern.
#[derive(Debug)]
pub struct RatingRepository {
    client: Arc<StoreClient>,
    table: String,
    max_scan_rows: usize,
    retry: RetryPolicy,
}

impl RatingRepository {
    pub fn new(client: Arc<StoreClient>, settings: &Settings) -> Self {
        Self {
            client,
            table: settings.ratings_table.clone(),
            max_scan_rows: settings.max_scan_rows,
            retry: RetryPolicy::default(),
        }
    }

    fn key(&self, row_key: &str) -> String {
        format!("{}:{}", self.table, row_key)
    }

    fn row_key_from<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.table)
            .and_then(|rest| rest.strip_prefix(':'))
    }

    async fn reconnect(&self) {
        self.client.release().await;
    }

    /// All ratings for one movie, up to `limit`, examining at most the
    /// configured scan budget of rows. Hitting the budget truncates the
    /// result with a warning rather than failing.
    pub async fn find_by_movie_id(&self, movie_id: &str, limit: usize) -> Result<Vec<Rating>> {
        self.retry
            .run(
                || self.find_by_movie_id_once(movie_id, limit),
                || self.reconnect(),
            )
            .await
    }

    async fn find_by_movie_id_once(&self, movie_id: &str, limit: usize) -> Result<Vec<Rating>> {
        let mut conn = self.client.acquire().await?;
        let pattern = format!("{}:*", self.table);
        let mut ratings = Vec::new();
        let mut examined = 0usize;
        let mut cursor = 0u64;

        'scan: loop {
            let (next, mut keys) = scan_batch(&mut conn, &pattern, cursor).await?;
            cursor = next;

            let truncated = apply_scan_budget(&mut keys, self.max_scan_rows, examined);
            examined += keys.len();

            // Only rows whose key names this movie are worth a fetch.
            let matched_keys: Vec<String> = keys
                .into_iter()
                .filter(|key| {
                    self.row_key_from(key)
                        .and_then(Rating::split_row_key)
                        .is_some_and(|(_, mid)| mid == movie_id)
                })
                .collect();

            for (key, data) in fetch_rows(&mut conn, matched_keys).await? {
                if let Some((user_id, mid)) =
                    self.row_key_from(&key).and_then(Rating::split_row_key)
                {
                    ratings.push(row::decode_rating(user_id, mid, &data));
                    if ratings.len() >= limit {
                        break 'scan;
                    }
                }
            }

            if truncated {
                warn!(
                    budget = self.max_scan_rows,
                    movie_id, "rating scan exceeded its row budget, truncating results"
                );
                break;
            }
            if cursor == 0 {
                break;
            }
        }

        debug!(
            examined,
            matches = ratings.len(),
            movie_id,
            "rating scan finished"
        );
        Ok(ratings)
    }

    /// All ratings by one user, up to `limit`. The key layout makes this a
    /// cheap prefix-pattern scan.
    pub async fn find_by_user_id(&self, user_id: &str, limit: usize) -> Result<Vec<Rating>> {
        self.retry
            .run(
                || self.find_by_user_id_once(user_id, limit),
                || self.reconnect(),
            )
            .await
    }

    async fn find_by_user_id_once(&self, user_id: &str, limit: usize) -> Result<Vec<Rating>> {
        let mut conn = self.client.acquire().await?;
        let pattern = format!("{}:{}_*", self.table, user_id);
        let mut ratings = Vec::new();
        let mut cursor = 0u64;

        'scan: loop {
            let (next, keys) = scan_batch(&mut conn, &pattern, cursor).await?;
            cursor = next;

            for (key, data) in fetch_rows(&mut conn, keys).await? {
                if let Some((uid, movie_id)) =
                    self.row_key_from(&key).and_then(Rating::split_row_key)
                {
                    ratings.push(row::decode_rating(uid, movie_id, &data));
                    if ratings.len() >= limit {
                        break 'scan;
                    }
                }
            }

            if cursor == 0 {
                break;
            }
        }

        Ok(ratings)
    }

    /// Batched rating write used by ingest: one pipelined round-trip per call.
    pub async fn put_batch(&self, ratings: &[Rating]) -> Result<()> {
        if ratings.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.acquire().await?;
        let mut pipe = redis::pipe();
        for rating in ratings {
            pipe.cmd("HSET")
                .arg(self.key(&rating.row_key()))
                .arg(row::F_RATING)
                .arg(rating.rating.to_string())
                .arg(row::F_TIMESTAMP)
                .arg(&rating.timestamp)
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
