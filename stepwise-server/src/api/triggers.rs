//! Manual Trigger API Handler

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde::Serialize;
use stepwise::core::{BuildId, Parameters, StepPath, TriggerId};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct FiredTrigger {
    #[serde(rename = "trigger-id")]
    pub trigger_id: TriggerId,
    #[serde(rename = "build-id")]
    pub build_id: BuildId,
    #[serde(rename = "step-id")]
    pub step_id: StepPath,
}

/// Reads a fire body. An empty body or `null` supplies no parameters.
pub fn parse_parameters(body: &[u8]) -> ApiResult<Parameters> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Parameters::new());
    }

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(serde_json::Value::Null) => Ok(Parameters::new()),
        Ok(_) => Err(ApiError::BadRequest(
            "Trigger parameters must be a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::BadRequest(format!("Malformed JSON body: {e}"))),
    }
}

/// POST /api/dynamic/{trigger_id}
/// Fire a waiting manual step
pub async fn fire_trigger(
    State(state): State<AppState>,
    Path(trigger_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<FiredTrigger>> {
    let trigger_id = TriggerId::new(trigger_id);
    let parameters = parse_parameters(&body)?;

    let registration = state.engine.fire_trigger(&trigger_id, parameters)?;
    tracing::info!(
        trigger_id = %trigger_id,
        build_id = %registration.build_id,
        step_id = %registration.path,
        "Trigger fired"
    );

    Ok(Json(FiredTrigger {
        trigger_id: registration.trigger_id,
        build_id: registration.build_id,
        step_id: registration.path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parameters() {
        assert!(parse_parameters(b"").unwrap().is_empty());
        assert!(parse_parameters(b"  \n").unwrap().is_empty());
        assert!(parse_parameters(b"null").unwrap().is_empty());

        let params = parse_parameters(br#"{"env": "prod", "count": 2}"#).unwrap();
        assert_eq!(params["env"], serde_json::json!("prod"));
        assert_eq!(params["count"], serde_json::json!(2));

        assert!(matches!(parse_parameters(b"[1]"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_parameters(b"{oops"), Err(ApiError::BadRequest(_))));
    }
}
