use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use trawl_core::error::AppError;
use trawl_core::job::{JobStatus, ScrapeOptions};
use trawl_core::models::AiOptions;

use crate::dto::{
    AnalysisResponse, AnalyzeRequest, HealthResponse, JobListResponse, JobResponse,
    ListJobsQuery, ScrapeRequest, ScrapingResultResponse, StartJobRequest, StartJobResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

type JsonBody<T> = Result<axum::Json<T>, JsonRejection>;

/// Build the full router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/scrape", post(scrape))
        .route("/v1/jobs", post(start_job).get(list_jobs))
        .route("/v1/jobs/{id}", get(get_job).delete(delete_job))
        .route("/v1/jobs/{id}/analyze", post(analyze_job));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Scrape
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 200, description = "One result per target, in input order", body = [ScrapingResultResponse]),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
    ),
    tag = "scrape"
)]
pub async fn scrape(
    State(state): State<Arc<AppState>>,
    body: JsonBody<ScrapeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let axum::Json(body) = body?;

    let cancel = state.shutdown.child_token();
    let results = state.scheduler.scrape_many(&body.targets, &cancel).await?;

    let response: Vec<ScrapingResultResponse> = results
        .into_iter()
        .map(ScrapingResultResponse::from)
        .collect();
    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/jobs",
    request_body = StartJobRequest,
    responses(
        (status = 202, description = "Job accepted", body = StartJobResponse),
        (status = 400, description = "Invalid URL or body", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn start_job(
    State(state): State<Arc<AppState>>,
    body: JsonBody<StartJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let axum::Json(body) = body?;

    let job_id = state.controller.start(ScrapeOptions::from(body))?;

    let response = StartJobResponse {
        job_id,
        status: JobStatus::InProgress.to_string(),
    };
    Ok((StatusCode::ACCEPTED, axum::Json(response)))
}

#[utoipa::path(
    get,
    path = "/v1/jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "Jobs, oldest first", body = JobListResponse),
        (status = 400, description = "Unknown status filter", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListJobsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let status_filter = query
        .status
        .map(|s| s.parse::<JobStatus>().map_err(AppError::InvalidInput))
        .transpose()?;

    let jobs = state
        .controller
        .list_jobs()
        .into_iter()
        .filter(|job| status_filter.is_none_or(|status| job.status == status))
        .map(JobResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let total = jobs.len();

    Ok(axum::Json(JobListResponse { jobs, total }))
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = JobResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .controller
        .get_status(id)
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {id}")))?;

    Ok(axum::Json(JobResponse::try_from(job)?))
}

#[utoipa::path(
    delete,
    path = "/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 204, description = "Job removed; a running pipeline is cancelled"),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if state.controller.delete_job(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Job not found: {id}")).into())
    }
}

#[utoipa::path(
    post,
    path = "/v1/jobs/{id}/analyze",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis attached to the job", body = AnalysisResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Job has not completed", body = crate::dto::ErrorResponse),
        (status = 502, description = "Analysis worker failed", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn analyze_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: JsonBody<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let axum::Json(body) = body?;

    let analysis = state
        .controller
        .run_ai_analysis(id, &AiOptions::from(body))
        .await?;

    Ok(axum::Json(AnalysisResponse::from(analysis)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        jobs: state.registry().len(),
        running_jobs: state.controller.running_jobs(),
    })
}
