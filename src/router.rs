use crate::auth::{ADMIN, ANYONE, OWNERS, RoleGate, STAFF, require_roles};
use crate::handlers::{auth, bank, clients, health, mail, managers, purchases, reports, roles, tariffs, transactions, users, visits};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Puts every route of `routes` behind the role gate.
fn gated(state: &AppState, allowed: &'static [&'static str], routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(middleware::from_fn_with_state(
        RoleGate::new(state, allowed),
        require_roles,
    ))
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/update-token", post(auth::update_token))
        .route("/users/register", post(users::register))
        .route("/mail/verify", post(mail::send_verification))
}

fn authenticated_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", get(auth::logout))
        .route("/auth/check-token", get(auth::check_token))
        .route("/users/profile", get(users::get_profile))
        .route("/users/:user_id", get(users::get_user).put(users::update_user))
        .route("/bank/buy/:plan/:count", get(bank::buy_subscription))
        .route("/bank/make-success/:order_id", get(bank::confirm_payment))
        .route("/bank/status", get(bank::get_subscription))
        .route("/mail/send", post(mail::send_message))
        .route("/mail/change-pass/:code", get(mail::send_password_change))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users/all", get(users::get_users))
        .route("/users/:user_id", delete(users::delete_user))
        .route("/roles", get(roles::get_roles).post(roles::create_role))
        .route("/roles/:role_id", delete(roles::delete_role))
        .route("/roles/users/:user_id", put(roles::grant_role))
        .route("/roles/users/:user_id/replace", put(roles::replace_role))
        .route("/tarrif/show", get(tariffs::get_tariffs))
        .route("/tarrif/create", post(tariffs::create_tariff))
        .route("/tarrif/update/:tariff_id", put(tariffs::update_tariff))
        .route("/tarrif/delete/:tariff_id", delete(tariffs::delete_tariff))
        .route("/tarrif/add/:user_id", put(tariffs::assign_tariff))
        .route("/clients/all-users", get(clients::get_all_clients))
        .route("/purchase", get(purchases::get_all_purchases))
        .route("/purchase/:purchase_id", delete(purchases::delete_purchase))
        .route("/visit", get(visits::get_all_visits))
}

fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/clients/:client_id/grant", post(clients::grant_client))
        .route("/manager/create", post(managers::create_manager))
        .route("/manager/show", get(managers::get_managers))
        .route(
            "/manager/:manager_id",
            put(managers::update_manager).delete(managers::delete_manager),
        )
}

fn staff_routes() -> Router<AppState> {
    Router::new()
        // Clients
        .route("/clients/create", post(clients::create_client))
        .route("/clients/id/:client_id", get(clients::get_client))
        .route("/clients/current", get(clients::find_client))
        .route("/clients/show", get(clients::get_clients))
        .route(
            "/clients/:client_id",
            put(clients::update_client).delete(clients::delete_client),
        )
        // Purchases and visits
        .route("/purchase/create/:client_id", post(purchases::create_purchase))
        .route("/purchase/all", get(purchases::get_purchases))
        .route("/purchase/cancel/:purchase_id", post(purchases::cancel_purchase))
        .route("/visit/current/:client_id", get(visits::get_client_visits))
        .route("/visit/user", get(visits::get_visits))
        // Cashback ledger
        .route("/transaction/bill", post(transactions::pay_by_bonus))
        .route("/transaction/client/:client_id", get(transactions::get_client_transactions))
        // Reports
        .route("/report/mean-check", get(reports::get_mean_check))
        .route("/report/mean-check/:client_id", get(reports::get_client_mean_check))
        .route("/report/active", get(reports::get_active_clients))
        .route("/report/cohort", get(reports::get_cohorts))
        .route("/report/repeat", get(reports::get_repeat_rate))
        .route("/report/churn", get(reports::get_churn_rate))
        .route("/report/ltv", get(reports::get_lifetime_values))
        .route("/report/average-ltv", get(reports::get_average_ltv))
        .route("/report/activity-days", get(reports::get_activity_days))
        .route("/report/purchase-frequency", get(reports::get_purchase_frequency))
        .route("/report/main-metrics", get(reports::get_main_metrics))
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let api = public_routes()
        .merge(gated(&state, ANYONE, authenticated_routes()))
        .merge(gated(&state, ADMIN, admin_routes()))
        .merge(gated(&state, OWNERS, owner_routes()))
        .merge(gated(&state, STAFF, staff_routes()));

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    if state.settings.metrics_enabled {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/metrics", get(move || async move { metric_handle.render() }))
            .layer(prometheus_layer);
        info!("Prometheus metrics exposed on /metrics");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
