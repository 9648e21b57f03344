use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::StoreError;
use crate::domain::session::ports::RefreshTokenRepository;

/// Periodic deletion of refresh token records past their retention window.
///
/// The delete predicate is an absolute cutoff, so several instances may sweep
/// the same store concurrently.
pub struct RetentionSweeper {
    repository: Arc<dyn RefreshTokenRepository>,
    retention: chrono::Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        repository: Arc<dyn RefreshTokenRepository>,
        retention: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            repository,
            retention,
            interval,
        }
    }

    /// Delete records that expired or were revoked more than `retention` before `now`.
    ///
    /// # Returns
    /// Number of deleted records
    ///
    /// # Errors
    /// * `StoreError` - Delete failed
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.repository.purge_stale(now - self.retention).await
    }

    /// Sweep on every tick until `shutdown` is cancelled.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention.num_days(),
            "Starting refresh token sweeper"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Refresh token sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep_once(Utc::now()).await {
                        Ok(0) => tracing::debug!("Sweep found nothing to delete"),
                        Ok(deleted) => tracing::info!(deleted = deleted, "Stale refresh tokens deleted"),
                        Err(e) => tracing::error!(error = %e, "Refresh token sweep failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use mockall::mock;

    use super::*;
    use crate::domain::session::models::RefreshTokenId;
    use crate::domain::session::models::RefreshTokenRecord;
    use crate::domain::user::models::UserId;

    mock! {
        pub TestRefreshTokenRepository {}

        #[async_trait]
        impl RefreshTokenRepository for TestRefreshTokenRepository {
            async fn create(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;
            async fn find_by_selector(&self, selector: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;
            async fn find_active_by_user(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Vec<RefreshTokenRecord>, StoreError>;
            async fn revoke(&self, id: &RefreshTokenId, revoked_at: DateTime<Utc>) -> Result<bool, StoreError>;
            async fn revoke_all_for_user(&self, user_id: &UserId, revoked_at: DateTime<Utc>) -> Result<u64, StoreError>;
            async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
        }
    }

    #[tokio::test]
    async fn test_sweep_once_uses_retention_cutoff() {
        let now = Utc::now();
        let expected_cutoff = now - chrono::Duration::days(7);

        let mut repository = MockTestRefreshTokenRepository::new();
        repository
            .expect_purge_stale()
            .withf(move |cutoff| *cutoff == expected_cutoff)
            .times(1)
            .returning(|_| Ok(3));

        let sweeper = RetentionSweeper::new(
            Arc::new(repository),
            chrono::Duration::days(7),
            Duration::from_secs(3600),
        );

        assert_eq!(sweeper.sweep_once(now).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_survives_errors_and_stops_on_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut repository = MockTestRefreshTokenRepository::new();
        repository.expect_purge_stale().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Timeout)
        });

        let sweeper = RetentionSweeper::new(
            Arc::new(repository),
            chrono::Duration::days(7),
            Duration::from_millis(10),
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
