//! Operator CLI over the reelbase core services.
//!
//! Job control (`start`, `stop`, `status`, `logs`) talks only through the
//! durable files shared with the detached job process; `movie` exercises the
//! retried repository read path; `search` and `featured` serve from the
//! in-memory index; `ingest` performs the one-time catalog import.

use anyhow::Context;
use clap::{Parser, Subcommand};
use reelbase_core::index::SearchIndex;
use reelbase_core::ingest::CatalogIngest;
use reelbase_core::jobs::JobController;
use reelbase_core::store::{MovieRepository, RatingRepository, StoreClient};
use reelbase_core::{CatalogError, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "reelbasectl")]
#[command(about = "Operate the reelbase movie catalog: aggregation job control and catalog tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the aggregation job status record
    Status,
    /// Print the accumulated log of the most recent run
    Logs,
    /// Launch the aggregation job as a detached process
    Start,
    /// Stop a running aggregation job (idempotent)
    Stop,
    /// Look up one movie in the store by id
    Movie {
        id: String,
    },
    /// Ranked substring search over the index file
    Search {
        query: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// The fixed landing recommendation from the index file
    Featured {
        #[arg(long, default_value_t = 8)]
        count: usize,
    },
    /// Import the movie catalog (and optionally ratings) into the store and
    /// build the index file
    Ingest {
        /// Movie catalog CSV; defaults to the configured movies_catalog path
        #[arg(long)]
        movies: Option<PathBuf>,
        /// Rating events CSV to load into the store as well
        #[arg(long)]
        ratings: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    settings
        .ensure_directories()
        .context("failed to create data directory")?;

    match cli.command {
        Command::Status => {
            let status = JobController::new(&settings).status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Logs => {
            print!("{}", JobController::new(&settings).logs());
        }
        Command::Start => match JobController::new(&settings).start() {
            Ok(pid) => println!("aggregation job started (pid {pid})"),
            Err(CatalogError::JobConflict(pid)) => {
                anyhow::bail!("an aggregation job is already running (pid {pid})")
            }
            Err(e) => return Err(e.into()),
        },
        Command::Stop => {
            let status = JobController::new(&settings).stop()?;
            println!("job status: {}", status.status);
        }
        Command::Movie { id } => {
            let client = Arc::new(StoreClient::new(&settings));
            let movies = MovieRepository::new(client.clone(), &settings);
            let movie = movies
                .find_by_id(&id)
                .await?
                .ok_or_else(|| CatalogError::NotFound(format!("movie {id}")))?;
            client.release().await;
            println!("{}", serde_json::to_string_pretty(&movie)?);
        }
        Command::Search { query, limit } => {
            let index = SearchIndex::load(settings.index_file()).await;
            for movie in index.search(&query, limit).await {
                println!(
                    "{}\t{}\t{}\t{:.2} ({} ratings)",
                    movie.id, movie.title, movie.genres, movie.avg_rating, movie.rating_count
                );
            }
        }
        Command::Featured { count } => {
            let index = SearchIndex::load(settings.index_file()).await;
            for movie in index.featured(count).await {
                println!("{}\t{}", movie.id, movie.title);
            }
        }
        Command::Ingest { movies, ratings } => {
            let movies_csv = movies.unwrap_or_else(|| settings.movies_catalog.clone());
            let client = Arc::new(StoreClient::new(&settings));
            let movie_repo = MovieRepository::new(client.clone(), &settings);
            let rating_repo = RatingRepository::new(client.clone(), &settings);
            let ingest = CatalogIngest::new(
                &movie_repo,
                &rating_repo,
                settings.index_file(),
                settings.publish_batch_size,
            );
            let summary = ingest
                .run(&movies_csv, ratings.as_deref())
                .await
                .context("catalog import failed")?;
            client.release().await;
            println!(
                "imported {} movies, {} ratings, {} index entries ({} rows skipped)",
                summary.movies_stored,
                summary.ratings_stored,
                summary.index_entries,
                summary.rows_skipped
            );
        }
    }

    Ok(())
}
