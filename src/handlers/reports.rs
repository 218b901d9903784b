//! Sales analytics over the caller's clients.
//!
//! Every report accepts the same window: either `days` back from now, or a
//! `startDate`/`endDate` pair in `YYYY-MM-DD` form, or nothing for all time.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::Utc;
use common::{
    ActiveClients, ChurnRate, ClientActivityDays, ClientLtv, ClientMeanCheck,
    ClientPurchaseFrequency, CohortBucket, MainMetrics, MonthlyValue, RepeatPurchaseRate,
};
use serde::Deserialize;
use services::auth::Principal;
use services::reports::{self, DateFilter};
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{ApiError, ApiResult, respond, service_error};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct ReportQuery {
    /// Look back this many days from now
    #[validate(range(min = 1, max = 36500))]
    pub days: Option<i64>,
    /// Window start, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Window end, `YYYY-MM-DD`, included
    pub end_date: Option<String>,
}

impl ReportQuery {
    fn filter(&self) -> Result<DateFilter, ApiError> {
        DateFilter::from_params(
            self.days,
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            Utc::now(),
        )
        .map_err(service_error)
    }
}

/// Average check per month
#[utoipa::path(
    get,
    path = "/api/v1/report/mean-check",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<Vec<MonthlyValue>>),
        (status = 400, description = "Invalid window", body = ErrorResponse),
        (status = 409, description = "Conflicting window parameters", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_mean_check(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<MonthlyValue>> {
    let filter = query.filter()?;
    let months = reports::mean_check_by_month(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    debug!("Mean check over {} months", months.len());
    respond(StatusCode::OK, months, "Mean check computed")
}

/// Average check of a single client
#[utoipa::path(
    get,
    path = "/api/v1/report/mean-check/{client_id}",
    tag = "reports",
    security(("bearer" = [])),
    params(
        ("client_id" = i32, Path, description = "Client ID"),
        ReportQuery
    ),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<ClientMeanCheck>),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_client_mean_check(
    Path(client_id): Path<i32>,
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ClientMeanCheck> {
    let filter = query.filter()?;
    let mean = reports::mean_check_for_client(&state.db, &principal, client_id, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, mean, "Mean check computed")
}

#[utoipa::path(
    get,
    path = "/api/v1/report/active",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<ActiveClients>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_active_clients(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ActiveClients> {
    let filter = query.filter()?;
    let active = reports::active_clients(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, active, "Active clients computed")
}

/// New clients grouped by the month of their first purchase
#[utoipa::path(
    get,
    path = "/api/v1/report/cohort",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<Vec<CohortBucket>>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_cohorts(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<CohortBucket>> {
    let filter = query.filter()?;
    let buckets = reports::cohorts(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, buckets, "Cohorts computed")
}

#[utoipa::path(
    get,
    path = "/api/v1/report/repeat",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<RepeatPurchaseRate>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_repeat_rate(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<RepeatPurchaseRate> {
    let filter = query.filter()?;
    let rate = reports::repeat_purchase_rate(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, rate, "Repeat purchase rate computed")
}

#[utoipa::path(
    get,
    path = "/api/v1/report/churn",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<ChurnRate>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_churn_rate(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ChurnRate> {
    let filter = query.filter()?;
    let churn = reports::churn_rate(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, churn, "Churn rate computed")
}

/// Lifetime value per client
#[utoipa::path(
    get,
    path = "/api/v1/report/ltv",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<Vec<ClientLtv>>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_lifetime_values(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<ClientLtv>> {
    let filter = query.filter()?;
    let values = reports::lifetime_values(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, values, "Lifetime values computed")
}

#[utoipa::path(
    get,
    path = "/api/v1/report/average-ltv",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<Vec<MonthlyValue>>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_average_ltv(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<MonthlyValue>> {
    let filter = query.filter()?;
    let months = reports::average_ltv(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, months, "Average lifetime value computed")
}

/// Days between first and last purchase per client
#[utoipa::path(
    get,
    path = "/api/v1/report/activity-days",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<Vec<ClientActivityDays>>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_activity_days(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<ClientActivityDays>> {
    let filter = query.filter()?;
    let days = reports::activity_days(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, days, "Activity days computed")
}

#[utoipa::path(
    get,
    path = "/api/v1/report/purchase-frequency",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<Vec<ClientPurchaseFrequency>>),
        (status = 400, description = "Invalid window", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_purchase_frequency(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<ClientPurchaseFrequency>> {
    let filter = query.filter()?;
    let frequency = reports::purchase_frequency(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, frequency, "Purchase frequency computed")
}

/// Dashboard bundle of the main reports
#[utoipa::path(
    get,
    path = "/api/v1/report/main-metrics",
    tag = "reports",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<MainMetrics>),
        (status = 400, description = "Invalid window", body = ErrorResponse),
        (status = 409, description = "Conflicting window parameters", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_main_metrics(
    Valid(Query(query)): Valid<Query<ReportQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<MainMetrics> {
    let filter = query.filter()?;
    let metrics = reports::main_metrics(&state.db, &principal, &filter)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, metrics, "Main metrics computed")
}
