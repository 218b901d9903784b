use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, trace};

use super::initdb::apply_migrations;
use crate::config::{Settings, initialize_app_state};
use crate::router::create_router;
use crate::scheduler::ExpirySweep;

pub async fn serve(
    database_url: Option<String>,
    bind_address: Option<String>,
    migrate: bool,
) -> Result<()> {
    trace!("Entering serve function");
    info!("ClientCRM starting up");

    let mut settings = Settings::load()?;
    if let Some(url) = database_url {
        settings.database_url = url;
    }
    if let Some(address) = bind_address {
        settings.bind_address = address;
    }
    let bind_address = settings.bind_address.clone();
    let sweep_enabled = settings.sweep_enabled;

    let state = initialize_app_state(settings).await?;
    debug!("Application state initialized successfully");
    if migrate {
        apply_migrations(&state.db).await?;
    }

    let sweeper = sweep_enabled.then(|| ExpirySweep::new(state.db.clone()).spawn_daily());
    if sweeper.is_some() {
        info!("Daily subscription sweep scheduled for 00:00 UTC");
    }

    let app = create_router(state);
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to address {bind_address}"))?;

    info!("ClientCRM API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    let served = axum::serve(listener, app).await;
    if let Some(task) = sweeper {
        task.abort();
    }
    served.context("Server error")?;

    info!("Server shutdown gracefully");
    Ok(())
}
