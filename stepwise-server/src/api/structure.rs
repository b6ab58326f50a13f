//! Pipeline Structure API Handler

use axum::{Json, extract::State};
use serde::Serialize;
use stepwise::pipeline::StepDescription;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct PipelineStructure {
    pub name: String,
    pub steps: Vec<StepDescription>,
}

/// GET /api/pipeline-structure
/// The step tree with every node's canonical path
pub async fn get_pipeline_structure(State(state): State<AppState>) -> Json<PipelineStructure> {
    let tree = state.engine.tree();
    Json(PipelineStructure {
        name: tree.name().to_string(),
        steps: tree.describe(),
    })
}
