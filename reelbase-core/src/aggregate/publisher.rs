use crate::error::Result;
use crate::store::MovieRepository;
use reelbase_model::{Movie, RatingStats};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Publishes one aggregation result into both representations.
///
/// Callers run `publish_store` first, then `publish_index`. A failure between the
/// store authoritative and the index stale until the next successful run;
/// there is no cross-representation transaction.
#[derive(Debug)]
pub struct StatsPublisher<'a> {
    movies: &'a MovieRepository,
    index_path: PathBuf,
    batch_size: usize,
}

impl<'a> StatsPublisher<'a> {
    pub fn new(movies: &'a MovieRepository, index_path: PathBuf, batch_size: usize) -> Self {
        Self {
            movies,
            index_path,
            batch_size: batch_size.max(1),
        }
    }

    /// Store phase: grouped writes, one pipelined round-trip per batch of
    /// `batch_size` entities.
    pub async fn publish_store(
        &self,
        stats: &HashMap<String, RatingStats>,
        mut on_store_progress: impl FnMut(usize, usize),
    ) -> Result<usize> {
        let total = stats.len();
        info!(movies = total, "publishing statistics to the store");

        let mut written = 0;
        let mut batch = Vec::with_capacity(self.batch_size);
        for (movie_id, movie_stats) in stats {
            batch.push((movie_id.clone(), *movie_stats));
            if batch.len() >= self.batch_size {
                self.movies.put_stats_batch(&batch).await?;
                written += batch.len();
                batch.clear();
                on_store_progress(written, total);
            }
        }
        if !batch.is_empty() {
            self.movies.put_stats_batch(&batch).await?;
            written += batch.len();
            on_store_progress(written, total);
        }

        info!(updated = written, "store publish complete");
        Ok(written)
    }

    /// Index phase: full read-modify-write with an atomic replace. Returns
    /// `None` when no index file exists yet (skipped with a warning).
    pub fn publish_index(&self, stats: &HashMap<String, RatingStats>) -> Result<Option<usize>> {
        match patch_index_file(&self.index_path, stats)? {
            Some(patched) => {
                info!(patched, "index statistics updated");
                Ok(Some(patched))
            }
            None => {
                warn!(
                    path = %self.index_path.display(),
                    "index file not found, skipping index update"
                );
                Ok(None)
            }
        }
    }
}

/// Load the index, patch statistics for matching ids, and replace the file
/// atomically (write-temp-then-rename) so a reader never observes a partial
/// index. Ids on only one side are left untouched. Returns `None` when the
/// index file does not exist.
pub fn patch_index_file(
    path: &Path,
    stats: &HashMap<String, RatingStats>,
) -> Result<Option<usize>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read(path)?;
    let mut entries: Vec<Movie> = serde_json::from_slice(&raw)?;

    let mut patched = 0;
    for entry in &mut entries {
        if let Some(movie_stats) = stats.get(&entry.id) {
            entry.avg_rating = round2(movie_stats.avg);
            entry.rating_count = movie_stats.count;
            patched += 1;
        }
    }

    write_index_file(path, &entries)?;
    Ok(Some(patched))
}

/// Serialize index records and atomically replace the file at `path`.
pub fn write_index_file(path: &Path, entries: &[Movie]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, entries)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Two-decimal rounding via the same `{:.2}` text encoding the store phase
/// writes, so both representations carry the identical value after a publish.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, avg: f64, count: u64) -> Movie {
        Movie {
            id: id.to_string(),
            title: format!("Movie {id}"),
            genres: "Drama".to_string(),
            avg_rating: avg,
            rating_count: count,
        }
    }

    fn read_entries(path: &Path) -> Vec<Movie> {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn patches_matching_ids_and_leaves_strangers_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie_index.json");
        write_index_file(&path, &[entry("1", 0.0, 0), entry("2", 3.0, 4)]).unwrap();

        let mut stats = HashMap::new();
        stats.insert(
            "1".to_string(),
            RatingStats {
                avg: 4.333333,
                count: 3,
            },
        );
        // Id 99 exists only in the aggregation result: not invented in the index.
        stats.insert("99".to_string(), RatingStats { avg: 5.0, count: 1 });

        let patched = patch_index_file(&path, &stats).unwrap();
        assert_eq!(patched, Some(1));

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].avg_rating, 4.33);
        assert_eq!(entries[0].rating_count, 3);
        // Untouched entry keeps its stale values.
        assert_eq!(entries[1].avg_rating, 3.0);
        assert_eq!(entries[1].rating_count, 4);
    }

    #[test]
    fn patching_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie_index.json");
        write_index_file(&path, &[entry("5", 0.0, 0)]).unwrap();

        let mut stats = HashMap::new();
        stats.insert("5".to_string(), RatingStats { avg: 2.5, count: 8 });

        patch_index_file(&path, &stats).unwrap();
        let first = read_entries(&path);
        patch_index_file(&path, &stats).unwrap();
        let second = read_entries(&path);

        assert_eq!(first, second);
    }

    #[test]
    fn index_rounding_matches_the_store_text_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie_index.json");
        write_index_file(&path, &[entry("1", 0.0, 0)]).unwrap();

        // 16.5 over 4 ratings: an exactly representable tie at the second
        // decimal, where naive (x*100).round()/100 drifts to 4.13.
        let avg = 16.5 / 4.0;
        let mut stats = HashMap::new();
        stats.insert("1".to_string(), RatingStats { avg, count: 4 });

        patch_index_file(&path, &stats).unwrap();
        let entries = read_entries(&path);

        let store_text = format!("{avg:.2}");
        assert_eq!(store_text, "4.12");
        assert_eq!(entries[0].avg_rating, store_text.parse::<f64>().unwrap());
    }

    #[test]
    fn missing_index_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let patched = patch_index_file(&path, &HashMap::new()).unwrap();
        assert_eq!(patched, None);
        assert!(!path.exists());
    }
}
