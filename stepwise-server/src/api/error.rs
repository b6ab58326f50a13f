//! API Error Handling
//!
//! Maps engine errors onto HTTP responses with an `{"error": message}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stepwise::errors::{RetriggerError, StepwiseError, StoreError, TriggerError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    /// The response status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::NotFound(msg) | Self::BadRequest(msg) | Self::Conflict(msg) => msg,
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownBuild(_) | StoreError::UnknownStep { .. } => {
                Self::NotFound(err.to_string())
            }
            StoreError::DuplicateBuild(_) | StoreError::Conflict { .. } => {
                Self::Conflict(err.to_string())
            }
            StoreError::Unavailable(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::UnknownTrigger(_) => Self::NotFound(err.to_string()),
            TriggerError::ParameterMismatch { .. } => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<RetriggerError> for ApiError {
    fn from(err: RetriggerError) -> Self {
        match err {
            RetriggerError::UnsupportedNesting(_) | RetriggerError::InvalidPath(_) => {
                Self::BadRequest(err.to_string())
            }
            RetriggerError::BuildNotFinished(_) => Self::Conflict(err.to_string()),
            RetriggerError::UnknownBuild(_) => Self::NotFound(err.to_string()),
            RetriggerError::Store(store) => store.into(),
        }
    }
}

impl From<StepwiseError> for ApiError {
    fn from(err: StepwiseError) -> Self {
        match err {
            StepwiseError::Trigger(trigger) => trigger.into(),
            StepwiseError::Retrigger(retrigger) => retrigger.into(),
            StepwiseError::Store(store) => store.into(),
            StepwiseError::InvalidPath(_) => Self::BadRequest(err.to_string()),
            StepwiseError::UnknownBuild(_) => Self::NotFound(err.to_string()),
            StepwiseError::BuildAbandoned(_) => Self::Conflict(err.to_string()),
            StepwiseError::Validation(_) | StepwiseError::Internal(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise::core::{BuildId, StepPath, TriggerId};

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                TriggerError::unknown(&TriggerId::new("t")).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                TriggerError::ParameterMismatch {
                    trigger_id: TriggerId::new("t"),
                    missing: vec!["env".into()],
                }
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                RetriggerError::UnsupportedNesting(StepPath::new(vec![2, 1]).unwrap()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                RetriggerError::BuildNotFinished(BuildId::from("1")).into(),
                StatusCode::CONFLICT,
            ),
            (
                StepwiseError::UnknownBuild(BuildId::from("9")).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                StepwiseError::Store(StoreError::Unavailable("down".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"error": "nope"}));
    }
}
