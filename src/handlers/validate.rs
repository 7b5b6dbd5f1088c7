//! # Pipeline Validation Handler
//!
//! Token-gated classification of CI/CD payloads. The entitlement check runs
//! first; a classifier failure afterwards is reported as a request failure
//! and never touches the token.

use axum::{extract::State, extract::rejection::JsonRejection, response::Json};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use utoipa::ToSchema;

use crate::classifier::{ClassifierStatus, Payload, analyze_with_timeout};
use crate::error::ApiError;
use crate::repositories::ValidationLogRepository;
use crate::server::AppState;

/// Request body for `/validate`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationRequest {
    /// Access token issued after payment
    #[schema(example = "pgt_6q1v0...")]
    pub token: String,
    /// Pipeline payload, one entry per artefact
    #[schema(value_type = Object)]
    pub payload: Payload,
}

/// Classification verdict
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    pub status: ClassifierStatus,
    #[schema(example = "Validation completed successfully")]
    pub message: String,
    /// `summary` and `full_analysis` of the engine output
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
}

/// Validate a pipeline payload
#[utoipa::path(
    post,
    path = "/validate",
    request_body = ValidationRequest,
    responses(
        (status = 200, description = "Payload classified", body = ValidationResponse),
        (status = 400, description = "Malformed request body", body = ApiError),
        (status = 401, description = "Token invalid, inactive, unpaid or expired", body = ApiError),
        (status = 502, description = "Classification engine failed", body = ApiError),
        (status = 504, description = "Classification engine timed out", body = ApiError)
    ),
    tag = "validation"
)]
pub async fn validate_pipeline(
    State(state): State<AppState>,
    body: Result<Json<ValidationRequest>, JsonRejection>,
) -> Result<Json<ValidationResponse>, ApiError> {
    let Json(request) = body?;

    let token = state.entitlements.validate(&request.token).await?;

    let classification = analyze_with_timeout(
        state.classifier.as_ref(),
        &request.payload,
        state.config.classifier.timeout(),
    )
    .await
    .inspect_err(|err| {
        counter!("classification_failures_total", "classifier" => state.classifier.name())
            .increment(1);
        tracing::warn!(token_id = %token.id, error = %err, "Classification failed");
    })?;

    counter!("classification_outcomes_total", "status" => classification.status.as_str())
        .increment(1);

    let result = json!({
        "status": classification.status,
        "analysis": classification.analysis,
        "details": classification.details,
    });

    // Audit is best-effort; the caller still receives the verdict.
    if let Err(err) = ValidationLogRepository::new(state.db.as_ref())
        .append(
            token.id,
            JsonValue::Object(request.payload),
            result,
            classification.status.as_str(),
        )
        .await
    {
        tracing::warn!(token_id = %token.id, error = %err, "Failed to record validation log");
    }

    tracing::info!(
        token_id = %token.id,
        status = %classification.status,
        "Pipeline validated"
    );

    Ok(Json(ValidationResponse {
        status: classification.status,
        message: "Validation completed successfully".to_string(),
        details: Some(classification.details),
        timestamp: Utc::now(),
    }))
}
