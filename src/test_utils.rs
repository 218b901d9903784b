#[cfg(test)]
pub mod test_utils {
    use std::sync::Arc;

    use crate::config::Settings;
    use crate::router::create_router;
    use crate::schemas::{ApiResponse, AppState};
    use axum::Router;
    use axum::http::{HeaderName, HeaderValue, StatusCode, header};
    use axum_test::TestServer;
    use migration::{Migrator, MigratorTrait};
    use model::entities::role;
    use sea_orm::{Database, DatabaseConnection};
    use serde_json::{Value, json};
    use services::mail::LogMailer;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const PASSWORD: &str = "correct-horse";

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    pub fn test_settings() -> Settings {
        Settings {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 15,
            cookie_secure: false,
            merchant_key: "test-merchant".to_string(),
            bank_secret: "test-bank-secret".to_string(),
            success_url: "http://localhost:5173/payment/success/".to_string(),
            testing: true,
            smtp_host: None,
            smtp_username: None,
            smtp_password: None,
            mail_from: "ClientCRM <no-reply@clientcrm.test>".to_string(),
            metrics_enabled: false,
            sweep_enabled: false,
        }
    }

    /// Create AppState for testing, with the mailer it records into
    pub async fn setup_test_state_with_mailer() -> (AppState, Arc<LogMailer>) {
        let db = setup_test_db().await;
        let mailer = Arc::new(LogMailer::new());
        let state = AppState::new(db, test_settings(), mailer.clone());
        (state, mailer)
    }

    pub async fn setup_test_app_state() -> AppState {
        setup_test_state_with_mailer().await.0
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level comes from RUST_LOG and defaults to WARN. The returned
    /// guard uninstalls the subscriber when dropped.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        let _ = init_test_tracing();
        create_router(setup_test_app_state().await)
    }

    /// A test server plus direct access to its state and outgoing mail.
    pub struct TestContext {
        pub server: TestServer,
        pub state: AppState,
        pub mailer: Arc<LogMailer>,
    }

    pub async fn setup_test_context() -> TestContext {
        let _ = init_test_tracing();
        let (state, mailer) = setup_test_state_with_mailer().await;
        let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");
        TestContext {
            server,
            state,
            mailer,
        }
    }

    pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        (
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header value"),
        )
    }

    pub fn email_of(username: &str) -> String {
        format!("{username}@shop.test")
    }

    /// Registers an account and returns its id.
    pub async fn register_user(server: &TestServer, username: &str) -> i32 {
        let response = server
            .post("/api/v1/users/register")
            .json(&json!({
                "username": username,
                "email": email_of(username),
                "password": PASSWORD,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        body.data["id"].as_i64().expect("user id") as i32
    }

    /// Logs in and returns the access token.
    pub async fn login(server: &TestServer, username: &str) -> String {
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": email_of(username), "password": PASSWORD }))
            .await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        body.data["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    /// Registers and logs in a plain user, returning `(user_id, token)`.
    pub async fn user_session(server: &TestServer, username: &str) -> (i32, String) {
        let id = register_user(server, username).await;
        (id, login(server, username).await)
    }

    /// A user promoted to admin, logged in after the promotion.
    pub async fn admin_session(ctx: &TestContext, username: &str) -> (i32, String) {
        let id = register_user(&ctx.server, username).await;
        services::roles::grant_role(&ctx.state.db, id, role::ADMIN)
            .await
            .expect("Failed to grant admin role");
        (id, login(&ctx.server, username).await)
    }

    /// Creates a client through the API and returns its id.
    pub async fn create_client(server: &TestServer, token: &str, phone: &str, percentage: i32) -> i32 {
        let (name, value) = bearer(token);
        let response = server
            .post("/api/v1/clients/create")
            .add_header(name, value)
            .json(&json!({
                "name": "Test Client",
                "phone": phone,
                "cashback_percentage": percentage,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        body.data["id"].as_i64().expect("client id") as i32
    }
}
