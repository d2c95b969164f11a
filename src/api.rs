//! REST API handlers for the rostering service.
//!
//! Solves run on the blocking thread pool; every call owns its compiled
//! instance and solver handle, so there is no shared mutable state between
//! concurrent requests.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::compile::{self, CompileError};
use crate::demo_data::{self, DemoData};
use crate::dto::{OptimizeRequest, OptimizeResponse, RecheckRequest, ReoptimizeRequest};
use crate::solver::{self, CancelFlag, RecheckReport, SolveError};

/// Creates the API router.
pub fn router() -> Router {
    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(service_info))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{id}", get(get_demo_data))
        // Rostering
        .route("/optimize", post(optimize))
        .route("/reoptimize", post(reoptimize))
        .route("/recheck", post(recheck))
        .route("/recommend", post(recheck))
}

/// Error envelope for 4xx/5xx responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// API-level failures with their HTTP mapping.
#[derive(Debug)]
pub enum ApiError {
    Compile(CompileError),
    Solver(String),
    Internal(String),
}

impl From<CompileError> for ApiError {
    fn from(err: CompileError) -> Self {
        ApiError::Compile(err)
    }
}

impl From<SolveError> for ApiError {
    fn from(err: SolveError) -> Self {
        match err {
            SolveError::Compile(inner) => ApiError::Compile(inner),
            SolveError::Backend(reason) => ApiError::Solver(reason),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Compile(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    error: err.kind(),
                    message: err.to_string(),
                },
            ),
            ApiError::Solver(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "solver_failure",
                    message,
                },
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "internal",
                    message,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /health - Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    name: &'static str,
    version: &'static str,
    solver_engine: &'static str,
}

/// GET /info - Application info endpoint.
async fn service_info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Nurse Scheduling",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: "good_lp/HiGHS",
    })
}

/// GET /demo-data - List available demo data sets.
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

/// GET /demo-data/{id} - A ready-to-post optimize request.
async fn get_demo_data(Path(id): Path<String>) -> Result<Json<OptimizeRequest>, StatusCode> {
    match id.parse::<DemoData>() {
        Ok(demo) => Ok(Json(demo_data::generate(demo))),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

/// POST /optimize - Compile, solve and enumerate diverse plans.
async fn optimize(
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let alternatives = request.alternatives.clamp(1, 10) as usize;
    info!(
        %request_id,
        year = request.year,
        month = request.month,
        nurses = request.nurses.len(),
        alternatives,
        "optimize request"
    );

    let instance = compile::compile(request.year, request.month, &request.nurses, &request.policy)?;
    let cfg = request.solver;
    let response = tokio::task::spawn_blocking(move || {
        solver::optimize(&instance, alternatives, &cfg, &CancelFlag::new())
            .map(|outcome| OptimizeResponse::from_outcome(outcome, &instance, &cfg))
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))??;
    Ok(Json(response))
}

/// POST /reoptimize - Re-solve with user-pinned cells.
async fn reoptimize(
    Json(request): Json<ReoptimizeRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let alternatives = request.base.alternatives.clamp(1, 10) as usize;
    info!(
        %request_id,
        year = request.base.year,
        month = request.base.month,
        pins = request.fixed.len(),
        alternatives,
        "reoptimize request"
    );

    let instance = compile::compile(
        request.base.year,
        request.base.month,
        &request.base.nurses,
        &request.base.policy,
    )?;
    let cfg = request.base.solver;
    let base_cells = request.assignments;
    let pins = request.fixed;
    let response = tokio::task::spawn_blocking(move || {
        let base = (!base_cells.is_empty()).then_some(base_cells.as_slice());
        solver::reoptimize(&instance, base, &pins, alternatives, &cfg, &CancelFlag::new())
            .map(|outcome| OptimizeResponse::from_outcome(outcome, &instance, &cfg))
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))??;
    Ok(Json(response))
}

/// POST /recheck, POST /recommend - Validate a grid without solving.
async fn recheck(Json(request): Json<RecheckRequest>) -> Result<Json<RecheckReport>, ApiError> {
    let instance = compile::compile(request.year, request.month, &request.nurses, &request.policy)?;
    Ok(Json(solver::recheck(&request.assignments, &instance)))
}
