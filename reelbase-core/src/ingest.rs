//! One-time catalog import: movie and rating CSVs into the store, plus the
//! initial build of the denormalized index file.

use crate::aggregate::publisher::write_index_file;
use crate::error::Result;
use crate::store::{MovieRepository, RatingRepository};
use reelbase_model::{IngestSummary, Movie, Rating};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Imports the catalog. Entities are created once here; later aggregation
/// runs only overwrite their statistics.
#[derive(Debug)]
pub struct CatalogIngest<'a> {
    movies: &'a MovieRepository,
    ratings: &'a RatingRepository,
    index_path: PathBuf,
    batch_size: usize,
}

impl<'a> CatalogIngest<'a> {
    pub fn new(
        movies: &'a MovieRepository,
        ratings: &'a RatingRepository,
        index_path: PathBuf,
        batch_size: usize,
    ) -> Self {
        Self {
            movies,
            ratings,
            index_path,
            batch_size: batch_size.max(1),
        }
    }

    /// Load `movies_csv` into the store and the index file; optionally load
    /// `ratings_csv` into the ratings table.
    pub async fn run(
        &self,
        movies_csv: &Path,
        ratings_csv: Option<&Path>,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        let mut entries = self.load_movies(movies_csv, &mut summary).await?;

        // The index file is sorted by numeric identifier.
        entries.sort_by_key(|m| m.id.parse::<u64>().unwrap_or(u64::MAX));
        write_index_file(&self.index_path, &entries)?;
        summary.index_entries = entries.len();
        info!(
            entries = entries.len(),
            path = %self.index_path.display(),
            "index file built"
        );

        if let Some(path) = ratings_csv {
            self.load_ratings(path, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn load_movies(
        &self,
        path: &Path,
        summary: &mut IngestSummary,
    ) -> Result<Vec<Movie>> {
        info!(path = %path.display(), "importing movie catalog");
        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();

        let mut entries = Vec::new();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut first = true;

        while let Some(line) = lines.next_line().await? {
            match parse_movie_line(&line) {
                Some(movie) => {
                    entries.push(movie.clone());
                    batch.push(movie);
                    if batch.len() >= self.batch_size {
                        self.movies.put_movies_batch(&batch).await?;
                        summary.movies_stored += batch.len();
                        batch.clear();
                    }
                }
                None => {
                    if !first {
                        summary.rows_skipped += 1;
                        warn!(line = %line.trim(), "skipping unparseable movie row");
                    }
                }
            }
            first = false;
        }
        if !batch.is_empty() {
            self.movies.put_movies_batch(&batch).await?;
            summary.movies_stored += batch.len();
        }

        info!(movies = summary.movies_stored, "movie catalog imported");
        Ok(entries)
    }

    async fn load_ratings(&self, path: &Path, summary: &mut IngestSummary) -> Result<()> {
        info!(path = %path.display(), "importing rating events");
        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut first = true;

        while let Some(line) = lines.next_line().await? {
            match parse_rating_line(&line) {
                Some(rating) => {
                    batch.push(rating);
                    if batch.len() >= self.batch_size {
                        self.ratings.put_batch(&batch).await?;
                        summary.ratings_stored += batch.len();
                        batch.clear();
                    }
                }
                None => {
                    if !first {
                        summary.rows_skipped += 1;
                    }
                }
            }
            first = false;
        }
        if !batch.is_empty() {
            self.ratings.put_batch(&batch).await?;
            summary.ratings_stored += batch.len();
        }

        info!(ratings = summary.ratings_stored, "rating events imported");
        Ok(())
    }
}

/// Parse a `movieId,title,genres` row. Titles may be quoted and contain
/// commas (`"American President, The (1995)"`).
fn parse_movie_line(line: &str) -> Option<Movie> {
    let fields = split_csv_line(line.trim_end());
    if fields.len() < 3 {
        return None;
    }
    let id = fields[0].trim();
    if id.is_empty() || id.parse::<u64>().is_err() {
        return None;
    }
    Some(Movie::new(id, fields[1].clone(), fields[2].clone()))
}

/// Parse a `userId,movieId,rating,timestamp` row.
fn parse_rating_line(line: &str) -> Option<Rating> {
    let mut fields = line.trim().split(',');
    let user_id = fields.next()?.trim();
    let movie_id = fields.next()?.trim();
    let rating: f64 = fields.next()?.trim().parse().ok()?;
    let timestamp = fields.next().unwrap_or("").trim();
    if user_id.is_empty() || movie_id.is_empty() {
        return None;
    }
    Some(Rating {
        user_id: user_id.to_string(),
        movie_id: movie_id.to_string(),
        rating,
        timestamp: timestamp.to_string(),
    })
}

/// Minimal quoted-field CSV splitter: double quotes delimit fields, doubled
/// quotes escape a literal quote. Enough for the MovieLens catalog format.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
