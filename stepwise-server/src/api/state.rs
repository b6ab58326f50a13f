//! Pipeline State API Handler
//!
//! Pollers read per-step results from here. The response shape depends on
//! the deployment's [`StateMode`].

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stepwise::core::BuildId;
use stepwise::state::BuildSnapshot;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::config::StateMode;

#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    /// Build to report on.
    pub build: Option<String>,
}

/// Body of the state endpoint.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PipelineState {
    /// `{buildId: {stepId: result}}`
    Builds(BTreeMap<BuildId, BuildSnapshot>),
    /// `{stepId: result}`
    Steps(BuildSnapshot),
}

/// GET /api/pipeline-state
pub async fn get_pipeline_state(
    State(state): State<AppState>,
    Query(query): Query<StateQuery>,
) -> ApiResult<Json<PipelineState>> {
    let requested = query.build.map(BuildId::from);
    tracing::debug!(build = ?requested, mode = ?state.state_mode, "Reading pipeline state");

    let body = match (state.state_mode, requested) {
        (StateMode::AllBuilds, Some(build_id)) => {
            let snapshot = state.engine.state(&build_id).await?;
            PipelineState::Builds(BTreeMap::from([(build_id, snapshot)]))
        }
        (StateMode::AllBuilds, None) => PipelineState::Builds(state.engine.all_states().await?),
        (StateMode::SingleBuild, Some(build_id)) => {
            PipelineState::Steps(state.engine.state(&build_id).await?)
        }
        (StateMode::SingleBuild, None) => match state.engine.latest_build().await? {
            Some(build_id) => PipelineState::Steps(state.engine.state(&build_id).await?),
            None => PipelineState::Steps(BuildSnapshot::new()),
        },
    };

    Ok(Json(body))
}
