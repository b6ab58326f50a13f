//! Build API Handlers
//!
//! Start, inspect, discard and retrigger builds.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use stepwise::core::{BuildId, StepPath};
use stepwise::state::BuildSnapshot;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct StartedBuild {
    #[serde(rename = "build-id")]
    pub build_id: BuildId,
}

#[derive(Debug, Serialize)]
pub struct RetriggeredStep {
    #[serde(rename = "build-id")]
    pub build_id: BuildId,
    #[serde(rename = "step-id")]
    pub step_id: StepPath,
}

/// GET /api/builds
/// Build IDs, most recent first
pub async fn list_builds(State(state): State<AppState>) -> ApiResult<Json<Vec<BuildId>>> {
    Ok(Json(state.engine.list_builds().await?))
}

/// POST /api/builds
/// Start a new build
pub async fn start_build(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<StartedBuild>)> {
    let handle = state.engine.start_build().await?;
    tracing::info!(build_id = %handle.build_id(), "Build started via API");

    Ok((
        StatusCode::CREATED,
        Json(StartedBuild {
            build_id: handle.build_id().clone(),
        }),
    ))
}

/// GET /api/builds/{build_id}
pub async fn get_build(
    State(state): State<AppState>,
    Path(build_id): Path<String>,
) -> ApiResult<Json<BuildSnapshot>> {
    let build_id = BuildId::from(build_id);
    Ok(Json(state.engine.state(&build_id).await?))
}

/// DELETE /api/builds/{build_id}
pub async fn discard_build(
    State(state): State<AppState>,
    Path(build_id): Path<String>,
) -> ApiResult<StatusCode> {
    let build_id = BuildId::from(build_id);
    if state.engine.discard_build(&build_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Unknown build: {build_id}")))
    }
}

/// POST /api/builds/{build_id}/{step_index}/retrigger
/// Re-run a finished top-level action
pub async fn retrigger_step(
    State(state): State<AppState>,
    Path((build_id, step_index)): Path<(String, String)>,
) -> ApiResult<Json<RetriggeredStep>> {
    let build_id = BuildId::from(build_id);
    let handle = state
        .engine
        .retrigger(&build_id, &step_index)
        .await
        .map_err(|e| {
            tracing::warn!(build_id = %build_id, step_index = %step_index, error = %e, "Retrigger rejected");
            ApiError::from(e)
        })?;

    Ok(Json(RetriggeredStep {
        build_id: handle.build_id().clone(),
        step_id: handle.path().clone(),
    }))
}
