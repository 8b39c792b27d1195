//! In-memory search over the denormalized index file.
//!
//! The index is the JSON snapshot the publisher and ingest write; it is
//! loaded once per process lifetime and served entirely from memory, so
//! search never touches the store. After a publish, `reload` picks up the
//! new statistics.

use crate::error::Result;
use reelbase_model::Movie;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Snapshot {
    entries: Vec<Movie>,
    by_id: HashMap<String, usize>,
}

impl Snapshot {
    fn from_entries(entries: Vec<Movie>) -> Self {
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        Self { entries, by_id }
    }
}

/// Read-mostly ranked substring search over the index snapshot.
#[derive(Debug)]
pub struct SearchIndex {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl SearchIndex {
    /// Load the index from disk. A missing file is served as an empty index
    /// with a warning, matching the behavior before the first ingest.
    pub async fn load(path: PathBuf) -> Self {
        let snapshot = match read_entries(&path) {
            Ok(entries) => {
                info!(movies = entries.len(), path = %path.display(), "movie index loaded");
                Snapshot::from_entries(entries)
            }
            Err(e) => {
                warn!(path = %path.display(), "movie index unavailable: {e}");
                Snapshot::default()
            }
        };
        Self {
            path,
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Re-read the index file, used after a publish run.
    pub async fn reload(&self) -> Result<usize> {
        let entries = read_entries(&self.path)?;
        let count = entries.len();
        *self.snapshot.write().await = Snapshot::from_entries(entries);
        info!(movies = count, "movie index reloaded");
        Ok(count)
    }

    pub async fn len(&self) -> usize {
        self.snapshot.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Case-insensitive substring search over title and genres.
    ///
    /// Title hits outrank genre-only hits; ties break on higher average
    /// rating, then higher rating count. The result is truncated to `limit`
    /// after sorting.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<Movie> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let snapshot = self.snapshot.read().await;
        let mut matched: Vec<&Movie> = snapshot
            .entries
            .iter()
            .filter(|m| {
                m.title.to_lowercase().contains(&needle)
                    || m.genres.to_lowercase().contains(&needle)
            })
            .collect();

        matched.sort_by(|a, b| {
            let a_title = a.title.to_lowercase().contains(&needle);
            let b_title = b.title.to_lowercase().contains(&needle);
            b_title
                .cmp(&a_title)
                .then_with(|| b.avg_rating.total_cmp(&a.avg_rating))
                .then_with(|| b.rating_count.cmp(&a.rating_count))
        });

        matched.into_iter().take(limit).cloned().collect()
    }

    /// The fixed landing recommendation: entries for ids `"1"..="count"`,
    /// in that order, skipping ids absent from the index. A convention over
    /// low-valued catalog ids, not a quality signal.
    pub async fn featured(&self, count: usize) -> Vec<Movie> {
        let snapshot = self.snapshot.read().await;
        (1..=count)
            .filter_map(|i| {
                let id = i.to_string();
                snapshot
                    .by_id
                    .get(&id)
                    .map(|&idx| snapshot.entries[idx].clone())
            })
            .collect()
    }

    /// Point lookup in the snapshot.
    pub async fn get(&self, id: &str) -> Option<Movie> {
        let snapshot = self.snapshot.read().await;
        snapshot
            .by_id
            .get(id)
            .map(|&idx| snapshot.entries[idx].clone())
    }
}

fn read_entries(path: &Path) -> Result<Vec<Movie>> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}
