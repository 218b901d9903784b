use anyhow::Result;
use tracing::info;

use crate::config::{Settings, initialize_app_state};
use crate::scheduler::ExpirySweep;

/// One-off run of the nightly sweep, for cron or manual use.
pub async fn sweep_subscriptions(database_url: Option<String>) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(url) = database_url {
        settings.database_url = url;
    }
    let state = initialize_app_state(settings).await?;

    let expired = ExpirySweep::new(state.db).run_once().await?;
    info!("Expired {} subscriptions", expired.unwrap_or_default());
    Ok(())
}
