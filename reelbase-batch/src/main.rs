//! The detached aggregation job.
//!
//! Launched by the job controller as an independent process (it survives a
//! controller restart), this binary recomputes per-movie rating statistics
//! from the raw rating log and publishes them into the store and the search
//! index file. Everything an external observer needs (progress, outcome,
//! diagnostics) goes through the durable status and log files; stdout and
//! stderr are detached to null by the launcher.

use anyhow::Context;
use reelbase_core::aggregate::{RatingAggregator, StatsPublisher};
use reelbase_core::jobs::{JobLog, StatusFile};
use reelbase_core::store::{MovieRepository, StoreClient};
use reelbase_core::Settings;
use reelbase_model::{JobState, JobStatus};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Durable reporting for one run: every milestone goes to both the status
/// record and the append-only log, so a disconnected observer can diagnose
/// the run after the fact. Reporting failures never abort the job itself.
struct RunReporter {
    status: StatusFile,
    log: JobLog,
}

impl RunReporter {
    fn milestone(&self, state: JobState, progress: u8, message: &str) {
        if let Err(e) = self.status.write(&JobStatus::new(state, progress, message)) {
            error!("failed to write status record: {e}");
        }
        if let Err(e) = self.log.info(message) {
            error!("failed to append job log: {e}");
        }
    }

    fn failed(&self, message: &str) {
        let _ = self
            .status
            .write(&JobStatus::new(JobState::Failed, 0, message));
        let _ = self.log.error(message);
    }
}

async fn run(settings: &Settings, reporter: &RunReporter) -> anyhow::Result<()> {
    let started = Instant::now();
    reporter.milestone(JobState::Running, 0, "aggregation job started");

    let ratings_log = settings.ratings_log.clone();
    if !ratings_log.exists() {
        anyhow::bail!("rating log not found: {}", ratings_log.display());
    }
    reporter.milestone(
        JobState::Running,
        5,
        &format!("rating log: {}", ratings_log.display()),
    );

    reporter.milestone(JobState::Running, 10, "computing rating statistics");
    let log = reporter.log.clone();
    let stats = RatingAggregator::new()
        .aggregate_log(&ratings_log, settings.aggregation_chunk_size, |rows| {
            let _ = log.info(&format!("processed {rows} ratings"));
        })
        .await
        .context("rating aggregation failed")?;
    reporter.milestone(
        JobState::Running,
        50,
        &format!("statistics computed for {} movies, connecting to store", stats.len()),
    );

    let client = Arc::new(StoreClient::new(settings));
    // Proves connectivity before the publish starts.
    client.acquire().await.context("store unreachable")?;

    let movies = MovieRepository::new(client.clone(), settings);
    let publisher = StatsPublisher::new(&movies, settings.index_file(), settings.publish_batch_size);

    let status = reporter.status.clone();
    let log = reporter.log.clone();
    let store_updated = publisher
        .publish_store(&stats, |written, total| {
            let progress = if total == 0 {
                90
            } else {
                (10 + written * 80 / total).min(90) as u8
            };
            let message = format!("updating store: {written}/{total}");
            let _ = status.write(&JobStatus::new(JobState::Running, progress, &message));
            let _ = log.info(&message);
        })
        .await
        .context("store publish failed")?;

    reporter.milestone(JobState::Running, 90, "updating search index");
    let patched = publisher.publish_index(&stats).context("index update failed")?;
    match patched {
        Some(patched) => reporter.milestone(
            JobState::Running,
            95,
            &format!("index statistics patched for {patched} movies"),
        ),
        None => reporter.milestone(
            JobState::Running,
            95,
            "index file absent, skipped index update",
        ),
    }

    client.release().await;

    let elapsed = started.elapsed().as_secs_f64();
    let message = format!(
        "completed: {store_updated} movies updated in {elapsed:.1}s"
    );
    reporter.milestone(JobState::Completed, 100, &message);
    info!("{message}");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env();
    if let Err(e) = settings.ensure_directories() {
        eprintln!("failed to create data directory: {e}");
        std::process::exit(1);
    }

    let reporter = RunReporter {
        status: StatusFile::new(settings.status_file()),
        log: JobLog::new(settings.log_file()),
    };

    if let Err(e) = run(&settings, &reporter).await {
        let message = format!("aggregation job failed: {e:#}");
        error!("{message}");
        reporter.failed(&message);
        std::process::exit(1);
    }
}
