use crate::error::Result;
use std::future::Future;
use tracing::warn;

/// Wrapping combinator that retries an operation after errors matching the
/// connection-failure signature, running a recovery action (in practice: a
/// forced reconnect through the [`StoreClient`](super::StoreClient)) before
/// each retry.
///
/// Non-matching errors propagate immediately; exhausting the attempt budget
/// propagates the last error.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        debug_assert!(max_attempts >= 1);
        Self { max_attempts }
    }

    pub async fn run<T, Op, OpFut, Rec, RecFut>(&self, mut op: Op, mut recover: Rec) -> Result<T>
    where
        Op: FnMut() -> OpFut,
        OpFut: Future<Output = Result<T>>,
        Rec: FnMut() -> RecFut,
        RecFut: Future<Output = ()>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_connection_failure() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "connection failure, forcing reconnect before retry: {err}"
                    );
                    recover().await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use std::cell::Cell;

    fn transient() -> CatalogError {
        CatalogError::Connection("connection reset by peer".to_string())
    }

    #[tokio::test]
    async fn succeeds_after_one_recovery() {
        let calls = Cell::new(0u32);
        let recoveries = Cell::new(0u32);

        let result = RetryPolicy::default()
            .run(
                || async {
                    calls.set(calls.get() + 1);
                    if calls.get() == 1 {
                        Err(transient())
                    } else {
                        Ok(7)
                    }
                },
                || async {
                    recoveries.set(recoveries.get() + 1);
                },
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);
        assert_eq!(recoveries.get(), 1);
    }

    #[tokio::test]
    async fn non_transient_errors_propagate_without_retry() {
        let calls = Cell::new(0u32);

        let result: Result<()> = RetryPolicy::default()
            .run(
                || async {
                    calls.set(calls.get() + 1);
                    Err(CatalogError::NotFound("movie 9".to_string()))
                },
                || async { panic!("recovery must not run for non-transient errors") },
            )
            .await;

        assert!(matches!(result, Err(CatalogError::NotFound(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_error() {
        let calls = Cell::new(0u32);
        let recoveries = Cell::new(0u32);

        let result: Result<()> = RetryPolicy::new(3)
            .run(
                || async {
                    calls.set(calls.get() + 1);
                    Err(transient())
                },
                || async {
                    recoveries.set(recoveries.get() + 1);
                },
            )
            .await;

        assert!(matches!(result, Err(CatalogError::Connection(_))));
        assert_eq!(calls.get(), 3);
        assert_eq!(recoveries.get(), 2);
    }
}
