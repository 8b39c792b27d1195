use crate::config::Settings;
use crate::error::{CatalogError, Result};
use redis::aio::MultiplexedConnection;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Owns the single lazily-(re)established connection to the external store.
///
/// `acquire` probes the held connection before handing it out and replaces it
/// with a fresh one when the probe fails, so callers always receive a handle
/// that was live a moment ago. The client performs exactly one implicit
/// close-then-reopen per acquire; it never retries the operation that
/// observed the failure, that is the repository retry policy's job.
///
/// One client per process, constructed explicitly and shared by reference.
pub struct StoreClient {
    url: String,
    connect_timeout: Duration,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreClient")
            .field("url", &self.url)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl StoreClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            url: settings.store_url.clone(),
            connect_timeout: settings.store_connect_timeout(),
            conn: Mutex::new(None),
        }
    }

    /// Hand out a live connection, transparently replacing a dead or
    /// never-established one.
    pub async fn acquire(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.conn.lock().await;

        if let Some(conn) = guard.as_mut() {
            if Self::probe(conn).await {
                return Ok(conn.clone());
            }
            warn!("store liveness probe failed, reconnecting");
            // Dropping the stale multiplexed handle is the close; close
            // errors cannot surface here.
            *guard = None;
        }

        let conn = self.open().await?;
        info!(url = %self.url, "store connection established");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Idempotent: closes and clears the held connection if any.
    pub async fn release(&self) {
        let mut guard = self.conn.lock().await;
        if guard.take().is_some() {
            info!("store connection closed");
        }
    }

    async fn open(&self) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(self.url.as_str())
            .map_err(|e| CatalogError::Connection(format!("invalid store url: {e}")))?;

        match tokio::time::timeout(
            self.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(CatalogError::Connection(format!(
                "failed to connect to store at {}: {e}",
                self.url
            ))),
            Err(_) => Err(CatalogError::Connection(format!(
                "timed out connecting to store at {} after {:?}",
                self.url, self.connect_timeout
            ))),
        }
    }

    /// Cheap liveness round-trip proving the connection still answers.
    async fn probe(conn: &mut MultiplexedConnection) -> bool {
        let pong: redis::RedisResult<String> =
            redis::cmd("PING").query_async(conn).await;
        match pong {
            Ok(_) => true,
            Err(e) => {
                warn!("store probe error: {e}");
                false
            }
        }
    }
}
