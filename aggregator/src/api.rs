//! HTTP routes for the dashboard.

use crate::clients::AnalysisListing;
use crate::errors::{DashboardError, RequestError, UpstreamError};
use crate::executor::DashboardExecutor;
use crate::metrics_defs::{DASHBOARD_FAILURES, DASHBOARD_REQUESTS};
use crate::request::{DashboardParams, DashboardRequest, RECENTLY_RAN_INTERVAL};
use crate::response::{
    AnonymousDashboardResponse, AppsResponse, DashboardResponse, TaskOutputs,
};
use crate::task_graph::{Task, TaskPlan};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use feeds::{FeedCache, FeedSnapshot};
use serde::Serialize;
use shared::counter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub executor: DashboardExecutor,
    pub feeds: FeedCache,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(anonymous_dashboard))
        .route("/healthz", get(healthz))
        .route("/feeds", get(public_feeds))
        .route("/apps/public", get(public_apps))
        .route("/apps/recently-ran", get(recently_ran_apps))
        .route("/users", get(missing_username))
        .route("/users/", get(missing_username))
        .route("/users/{username}", get(user_dashboard))
        .route("/users/{username}/apps/public", get(user_public_apps))
        .route(
            "/users/{username}/apps/recently-added",
            get(user_recently_added_apps),
        )
        .route(
            "/users/{username}/apps/popular-featured",
            get(user_popular_featured_apps),
        )
        .route(
            "/users/{username}/apps/recently-used",
            get(user_recently_used_apps),
        )
        .route("/users/{username}/analyses/recent", get(user_recent_analyses))
        .route(
            "/users/{username}/analyses/running",
            get(user_running_analyses),
        )
        .with_state(state)
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Dashboard(#[from] DashboardError),

    /// A call made outside the task graph, such as a health or interval
    /// check.
    #[error(transparent)]
    Upstream(UpstreamError),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Request(_) => "request",
            ApiError::Dashboard(e) => e.kind(),
            ApiError::Upstream(_) => "upstream",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Request(_) => StatusCode::BAD_REQUEST,
            ApiError::Dashboard(DashboardError::DeadlineExceeded(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Dashboard(_) | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorResponse {
            error_message: self.to_string(),
        });

        (self.status(), body).into_response()
    }
}

/// Runs `plan` for the parsed request, recording request and failure metrics.
async fn execute(
    state: &AppState,
    route: &'static str,
    plan: TaskPlan,
    request: Result<DashboardRequest, RequestError>,
) -> Result<TaskOutputs, ApiError> {
    counter!(DASHBOARD_REQUESTS, "route" => route).increment(1);

    let result = match request {
        Ok(request) => match check_interval(state, &plan, &request).await {
            Ok(()) => state
                .executor
                .execute(&plan, &request)
                .await
                .map_err(ApiError::from),
            Err(e) => Err(e),
        },
        Err(e) => Err(ApiError::from(e)),
    };

    if let Err(e) = &result {
        counter!(DASHBOARD_FAILURES, "route" => route, "kind" => e.kind()).increment(1);
        match e {
            ApiError::Request(_) => tracing::info!(route, error = %e, "rejected request"),
            _ => tracing::error!(route, error = %e, "request failed"),
        }
    }
    result
}

/// Asks the database whether a caller supplied interval parses, before any
/// task starts.
async fn check_interval(
    state: &AppState,
    plan: &TaskPlan,
    request: &DashboardRequest,
) -> Result<(), ApiError> {
    if !request.custom_interval || !plan.uses_interval() {
        return Ok(());
    }

    let interval = &request.start_date_interval;
    match state.executor.apps().validate_interval(interval).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(RequestError::InvalidInterval(interval.clone()).into()),
        Err(e) => Err(ApiError::Upstream(e)),
    }
}

async fn missing_username() -> ApiError {
    RequestError::MissingUsername.into()
}

async fn anonymous_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AnonymousDashboardResponse>, ApiError> {
    let outputs = execute(
        &state,
        "anonymous_dashboard",
        TaskPlan::anonymous_dashboard(),
        DashboardRequest::anonymous(&params),
    )
    .await?;
    let response = AnonymousDashboardResponse::assemble(outputs, state.feeds.snapshot())?;
    Ok(Json(response))
}

async fn user_dashboard(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let outputs = execute(
        &state,
        "user_dashboard",
        TaskPlan::dashboard(),
        DashboardRequest::for_user(&username, &params),
    )
    .await?;
    let response = DashboardResponse::assemble(outputs, state.feeds.snapshot())?;
    Ok(Json(response))
}

async fn healthz(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state
        .executor
        .apps()
        .healthz()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "health check failed");
            ApiError::Upstream(e)
        })?;
    Ok(StatusCode::OK)
}

async fn public_feeds(State(state): State<AppState>) -> Json<Arc<FeedSnapshot>> {
    Json(state.feeds.snapshot())
}

/// Runs a single app listing and returns it alone.
async fn listing(
    state: &AppState,
    route: &'static str,
    task: Task,
    request: Result<DashboardRequest, RequestError>,
) -> Result<Json<AppsResponse>, ApiError> {
    let mut outputs = execute(state, route, TaskPlan::for_targets(&[task]), request).await?;
    Ok(Json(AppsResponse {
        apps: outputs.take_apps(task)?,
    }))
}

async fn analyses(
    state: &AppState,
    route: &'static str,
    task: Task,
    request: Result<DashboardRequest, RequestError>,
) -> Result<Json<AnalysisListing>, ApiError> {
    let mut outputs = execute(state, route, TaskPlan::for_targets(&[task]), request).await?;
    Ok(Json(outputs.take_analyses(task)?))
}

async fn public_apps(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AppsResponse>, ApiError> {
    listing(
        &state,
        "public_apps",
        Task::PublicApps,
        DashboardRequest::anonymous(&params),
    )
    .await
}

async fn recently_ran_apps(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AppsResponse>, ApiError> {
    listing(
        &state,
        "recently_ran_apps",
        Task::RecentlyRanApps,
        DashboardRequest::anonymous_with_interval(&params, RECENTLY_RAN_INTERVAL),
    )
    .await
}

async fn user_public_apps(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AppsResponse>, ApiError> {
    listing(
        &state,
        "user_public_apps",
        Task::PublicApps,
        DashboardRequest::for_user(&username, &params),
    )
    .await
}

async fn user_recently_added_apps(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AppsResponse>, ApiError> {
    listing(
        &state,
        "user_recently_added_apps",
        Task::RecentlyAddedApps,
        DashboardRequest::for_user(&username, &params),
    )
    .await
}

async fn user_popular_featured_apps(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AppsResponse>, ApiError> {
    listing(
        &state,
        "user_popular_featured_apps",
        Task::PopularFeaturedApps,
        DashboardRequest::for_user(&username, &params),
    )
    .await
}

async fn user_recently_used_apps(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AppsResponse>, ApiError> {
    listing(
        &state,
        "user_recently_used_apps",
        Task::RecentlyUsedApps,
        DashboardRequest::for_user(&username, &params),
    )
    .await
}

async fn user_recent_analyses(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AnalysisListing>, ApiError> {
    analyses(
        &state,
        "user_recent_analyses",
        Task::RecentAnalyses,
        DashboardRequest::for_user(&username, &params),
    )
    .await
}

async fn user_running_analyses(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<AnalysisListing>, ApiError> {
    analyses(
        &state,
        "user_running_analyses",
        Task::RunningAnalyses,
        DashboardRequest::for_user(&username, &params),
    )
    .await
}
