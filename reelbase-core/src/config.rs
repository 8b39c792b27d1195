use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, resolved from the environment with per-field
/// defaults. Both the serving process and the detached batch process build
/// their own `Settings`; nothing is shared in memory across them.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // Store settings
    pub store_url: String,
    pub store_connect_timeout_ms: u64,

    // Logical table names (key prefixes in the store)
    pub movies_table: String,
    pub ratings_table: String,

    // Durable job-control files and the search index live here
    pub data_dir: PathBuf,

    // Raw inputs for aggregation and ingest
    pub ratings_log: PathBuf,
    pub movies_catalog: PathBuf,

    // Tunables
    pub max_scan_rows: usize,
    pub aggregation_chunk_size: usize,
    pub publish_batch_size: usize,

    /// Executable the controller launches as the detached job process.
    pub batch_executable: String,
}

impl Settings {
    pub fn from_env() -> Self {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let data_dir: PathBuf = env::var("REELBASE_DATA_DIR")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        Self {
            store_url: env::var("REELBASE_STORE_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            store_connect_timeout_ms: env::var("REELBASE_STORE_CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),

            movies_table: env::var("REELBASE_MOVIES_TABLE")
                .unwrap_or_else(|_| "movies".to_string()),
            ratings_table: env::var("REELBASE_RATINGS_TABLE")
                .unwrap_or_else(|_| "ratings".to_string()),

            ratings_log: env::var("REELBASE_RATINGS_LOG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("ratings.csv")),
            movies_catalog: env::var("REELBASE_MOVIES_CATALOG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("movies.csv")),

            max_scan_rows: env::var("REELBASE_MAX_SCAN_ROWS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            aggregation_chunk_size: env::var("REELBASE_AGGREGATION_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100_000),
            publish_batch_size: env::var("REELBASE_PUBLISH_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_000),

            batch_executable: env::var("REELBASE_BATCH_EXECUTABLE")
                .unwrap_or_else(|_| "reelbase-batch".to_string()),

            data_dir,
        }
    }

    pub fn store_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.store_connect_timeout_ms)
    }

    pub fn index_file(&self) -> PathBuf {
        self.data_dir.join("movie_index.json")
    }

    pub fn status_file(&self) -> PathBuf {
        self.data_dir.join("batch_status.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("batch_log.txt")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join("batch.pid")
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

impl Default for Settings {
    /// Defaults without touching the environment; used by tests.
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            store_url: "redis://127.0.0.1:6379".to_string(),
            store_connect_timeout_ms: 30_000,
            movies_table: "movies".to_string(),
            ratings_table: "ratings".to_string(),
            ratings_log: data_dir.join("ratings.csv"),
            movies_catalog: data_dir.join("movies.csv"),
            max_scan_rows: 10_000,
            aggregation_chunk_size: 100_000,
            publish_batch_size: 1_000,
            batch_executable: "reelbase-batch".to_string(),
            data_dir,
        }
    }
}
