use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use sea_orm::{ConnectOptions, Database};
use serde::Deserialize;
use services::auth::TokenKeys;
use services::bank::GatewayConfig;
use services::mail::{LogMailer, Mailer, SmtpMailer};
use tracing::{debug, info, trace, warn};

use crate::schemas::AppState;

fn default_database_url() -> String {
    "sqlite://clientcrm.db?mode=rwc".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_access_ttl() -> i64 {
    15
}

fn default_refresh_ttl() -> i64 {
    15
}

fn default_mail_from() -> String {
    "ClientCRM <no-reply@clientcrm.local>".to_string()
}

fn default_true() -> bool {
    true
}

/// Runtime settings, read from the environment (and `.env`).
#[derive(Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub jwt_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_days: i64,
    /// Marks the refresh cookie `Secure`; off for plain-HTTP development
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default)]
    pub merchant_key: String,
    #[serde(default)]
    pub bank_secret: String,
    #[serde(default)]
    pub success_url: String,
    /// Sends payments to the gateway sandbox
    #[serde(default)]
    pub testing: bool,
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_true")]
    pub sweep_enabled: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("database_url", &self.database_url)
            .field("bind_address", &self.bind_address)
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("cookie_secure", &self.cookie_secure)
            .field("merchant_key", &self.merchant_key)
            .field("success_url", &self.success_url)
            .field("testing", &self.testing)
            .field("smtp_host", &self.smtp_host)
            .field("mail_from", &self.mail_from)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("sweep_enabled", &self.sweep_enabled)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Loads settings from environment variables such as `JWT_SECRET`.
    pub fn load() -> Result<Self> {
        trace!("Loading settings from environment");
        let settings: Settings = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration, is JWT_SECRET set?")?;
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn token_keys(&self) -> TokenKeys {
        TokenKeys::new(
            &self.jwt_secret,
            Duration::minutes(self.access_token_ttl_minutes),
            Duration::days(self.refresh_token_ttl_days),
        )
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            merchant: self.merchant_key.clone(),
            secret: self.bank_secret.clone(),
            success_url: self.success_url.clone(),
            testing: self.testing,
        }
    }

    /// SMTP when a host is configured, a logging mailer otherwise.
    pub fn mailer(&self) -> Result<Arc<dyn Mailer>> {
        match &self.smtp_host {
            Some(host) => {
                info!("Using SMTP relay {}", host);
                let mailer = SmtpMailer::new(
                    host,
                    self.smtp_username.as_deref().unwrap_or_default(),
                    self.smtp_password.as_deref().unwrap_or_default(),
                    &self.mail_from,
                )?;
                Ok(Arc::new(mailer))
            }
            None => {
                warn!("SMTP_HOST is not set, outgoing mail is only logged");
                Ok(Arc::new(LogMailer::new()))
            }
        }
    }
}

/// Connects to the database and assembles the shared application state.
pub async fn initialize_app_state(settings: Settings) -> Result<AppState> {
    info!("Connecting to database: {}", settings.database_url);
    let mut options = ConnectOptions::new(settings.database_url.clone());
    options.sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .with_context(|| format!("Failed to connect to {}", settings.database_url))?;

    let mailer = settings.mailer()?;
    Ok(AppState::new(db, settings, mailer))
}
