//! Daily subscription expiry sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::DatabaseConnection;
use services::ServiceError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Runs `expire_subscriptions`, never more than one pass at a time.
#[derive(Clone, Debug)]
pub struct ExpirySweep {
    db: DatabaseConnection,
    in_flight: Arc<Mutex<()>>,
}

/// Time left until the next 00:00 UTC.
pub fn until_next_midnight(now: DateTime<Utc>) -> Duration {
    let tomorrow = now.date_naive() + Duration::days(1);
    tomorrow.and_time(NaiveTime::MIN).and_utc() - now
}

impl ExpirySweep {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// One sweep pass. `Ok(None)` means a pass was already running and this
    /// one was skipped.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<Option<u64>, ServiceError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("Previous subscription sweep still running, skipping");
            return Ok(None);
        };
        let expired = services::bank::expire_subscriptions(&self.db, Utc::now()).await?;
        info!("Subscription sweep finished, {} expired", expired);
        Ok(Some(expired))
    }

    /// Runs the sweep every day at midnight UTC until the task is aborted.
    pub fn spawn_daily(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let wait = until_next_midnight(Utc::now());
                debug!("Next subscription sweep in {}s", wait.num_seconds());
                tokio::time::sleep(wait.to_std().unwrap_or_default()).await;

                let sweep = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = sweep.run_once().await {
                        error!("Subscription sweep failed: {}", e);
                    }
                });
            }
        })
    }
}
