use std::sync::Arc;

use common::{
    ActiveClients, ChurnRate, ClientActivityDays, ClientLtv, ClientMeanCheck,
    ClientPurchaseFrequency, CohortBucket, MainMetrics, MonthlyValue, RepeatPurchaseRate,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use services::auth::TokenKeys;
use services::bank::GatewayConfig;
use services::mail::Mailer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::config::Settings;
use crate::handlers::{
    auth::{LoginRequest, TokenCheckResponse, TokenResponse},
    bank::{PaymentFormResponse, SubscriptionResponse},
    clients::{
        ClientOverviewResponse, ClientResponse, CreateClientRequest, GrantClientRequest,
        UpdateClientRequest,
    },
    mail::{SendMessageRequest, SendVerificationRequest},
    managers::{CreateManagerRequest, ManagerResponse, UpdateManagerRequest},
    purchases::{CreatePurchaseRequest, PurchaseReceiptResponse, PurchaseResponse, PurchaseReversalResponse},
    roles::{AssignRoleRequest, CreateRoleRequest, RoleResponse},
    tariffs::{AssignTariffRequest, CreateTariffRequest, TariffResponse, UpdateTariffRequest},
    transactions::CashbackTransactionResponse,
    users::{ProfileResponse, RegisterRequest, UpdateUserRequest, UserResponse},
    visits::VisitResponse,
};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
    /// JWT signing keys
    pub keys: Arc<TokenKeys>,
    pub gateway: Arc<GatewayConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, settings: Settings, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            keys: Arc::new(settings.token_keys()),
            gateway: Arc::new(settings.gateway()),
            settings: Arc::new(settings),
            mailer,
        }
    }
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

/// Error response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::update_token,
        crate::handlers::auth::logout,
        crate::handlers::auth::check_token,
        crate::handlers::users::register,
        crate::handlers::users::get_users,
        crate::handlers::users::get_profile,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::roles::get_roles,
        crate::handlers::roles::create_role,
        crate::handlers::roles::delete_role,
        crate::handlers::roles::grant_role,
        crate::handlers::roles::replace_role,
        crate::handlers::tariffs::get_tariffs,
        crate::handlers::tariffs::create_tariff,
        crate::handlers::tariffs::update_tariff,
        crate::handlers::tariffs::delete_tariff,
        crate::handlers::tariffs::assign_tariff,
        crate::handlers::clients::get_all_clients,
        crate::handlers::clients::create_client,
        crate::handlers::clients::get_client,
        crate::handlers::clients::find_client,
        crate::handlers::clients::get_clients,
        crate::handlers::clients::update_client,
        crate::handlers::clients::delete_client,
        crate::handlers::clients::grant_client,
        crate::handlers::purchases::get_all_purchases,
        crate::handlers::purchases::create_purchase,
        crate::handlers::purchases::get_purchases,
        crate::handlers::purchases::cancel_purchase,
        crate::handlers::purchases::delete_purchase,
        crate::handlers::visits::get_all_visits,
        crate::handlers::visits::get_client_visits,
        crate::handlers::visits::get_visits,
        crate::handlers::reports::get_mean_check,
        crate::handlers::reports::get_client_mean_check,
        crate::handlers::reports::get_active_clients,
        crate::handlers::reports::get_cohorts,
        crate::handlers::reports::get_repeat_rate,
        crate::handlers::reports::get_churn_rate,
        crate::handlers::reports::get_lifetime_values,
        crate::handlers::reports::get_average_ltv,
        crate::handlers::reports::get_activity_days,
        crate::handlers::reports::get_purchase_frequency,
        crate::handlers::reports::get_main_metrics,
        crate::handlers::transactions::pay_by_bonus,
        crate::handlers::transactions::get_client_transactions,
        crate::handlers::bank::buy_subscription,
        crate::handlers::bank::confirm_payment,
        crate::handlers::bank::get_subscription,
        crate::handlers::mail::send_message,
        crate::handlers::mail::send_verification,
        crate::handlers::mail::send_password_change,
        crate::handlers::managers::create_manager,
        crate::handlers::managers::get_managers,
        crate::handlers::managers::update_manager,
        crate::handlers::managers::delete_manager,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            LoginRequest,
            TokenResponse,
            TokenCheckResponse,
            RegisterRequest,
            UpdateUserRequest,
            UserResponse,
            ProfileResponse,
            CreateRoleRequest,
            AssignRoleRequest,
            RoleResponse,
            CreateTariffRequest,
            UpdateTariffRequest,
            AssignTariffRequest,
            TariffResponse,
            CreateClientRequest,
            UpdateClientRequest,
            GrantClientRequest,
            ClientResponse,
            ClientOverviewResponse,
            CreatePurchaseRequest,
            PurchaseResponse,
            PurchaseReceiptResponse,
            PurchaseReversalResponse,
            VisitResponse,
            CashbackTransactionResponse,
            PaymentFormResponse,
            SubscriptionResponse,
            SendMessageRequest,
            SendVerificationRequest,
            CreateManagerRequest,
            UpdateManagerRequest,
            ManagerResponse,
            MonthlyValue,
            ClientMeanCheck,
            ActiveClients,
            CohortBucket,
            RepeatPurchaseRate,
            ChurnRate,
            ClientLtv,
            ClientActivityDays,
            ClientPurchaseFrequency,
            MainMetrics,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Login and token rotation"),
        (name = "users", description = "User accounts"),
        (name = "roles", description = "Role management"),
        (name = "tariffs", description = "Tariff plans and client quotas"),
        (name = "clients", description = "Client records"),
        (name = "purchases", description = "Purchases and cashback credits"),
        (name = "visits", description = "Client visits"),
        (name = "reports", description = "Sales analytics"),
        (name = "transactions", description = "Cashback ledger"),
        (name = "bank", description = "Subscription payments"),
        (name = "mail", description = "Outgoing mail"),
        (name = "managers", description = "Delegated manager accounts"),
    ),
    info(
        title = "ClientCRM API",
        description = "Client management for small businesses: clients, purchases, cashback, subscriptions and sales reports",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;
