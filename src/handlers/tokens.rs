//! # Token Administration Handlers
//!
//! Operator-only endpoints for manual grants, payment status overrides and
//! listing a company's active tokens.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::entitlements::{EntitlementError, ProvisionRequest};
use crate::error::{ApiError, not_found, validation_error};
use crate::models::token::Model as TokenModel;
use crate::repositories::CompanyRepository;
use crate::server::AppState;

/// Manual grant request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvisionTokenRequest {
    pub company_id: Uuid,
    /// Secret to store; generated when omitted
    pub token: Option<String>,
    /// Absolute expiry; takes precedence over `days`
    pub expires_at: Option<DateTime<Utc>>,
    /// Validity in days from now; defaults to the configured window
    #[schema(example = 30)]
    pub days: Option<u32>,
    pub repository_id: Option<String>,
}

/// Payment status override
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub token: String,
    #[schema(example = "paid")]
    pub payment_status: String,
}

/// Token metadata without its secret
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenInfo {
    pub id: Uuid,
    pub company_id: Uuid,
    pub repository_id: Option<String>,
    pub is_active: bool,
    #[schema(example = "pending")]
    pub payment_status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<TokenModel> for TokenInfo {
    fn from(token: TokenModel) -> Self {
        Self {
            id: token.id,
            company_id: token.company_id,
            repository_id: token.repository_id,
            is_active: token.is_active,
            payment_status: token.payment_status,
            expires_at: token.expires_at,
            created_at: token.created_at,
        }
    }
}

/// Newly provisioned token, including its secret
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvisionedToken {
    pub token: String,
    #[serde(flatten)]
    pub info: TokenInfo,
}

/// Provision a token for a company
#[utoipa::path(
    post,
    path = "/api/v1/tokens",
    security(("bearer_auth" = [])),
    request_body = ProvisionTokenRequest,
    responses(
        (status = 201, description = "Token provisioned; prior active tokens were deactivated", body = ProvisionedToken),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Company not found", body = ApiError),
        (status = 409, description = "Token value already in use", body = ApiError)
    ),
    tag = "tokens"
)]
pub async fn provision_token(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    body: Result<Json<ProvisionTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProvisionedToken>), ApiError> {
    let Json(request) = body?;

    if request.days == Some(0) {
        return Err(validation_error(
            "Validity must be at least one day",
            serde_json::json!({ "days": "Must be greater than zero" }),
        ));
    }

    let expires_at = match (request.expires_at, request.days) {
        (Some(expires_at), _) => expires_at,
        (None, Some(days)) => Utc::now() + Duration::days(i64::from(days)),
        (None, None) => Utc::now() + state.entitlements.validity(),
    };

    let token = state
        .entitlements
        .provision(ProvisionRequest {
            token_value: request.token,
            company_id: request.company_id,
            expires_at,
            repository_id: request.repository_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProvisionedToken {
            token: token.token.clone(),
            info: token.into(),
        }),
    ))
}

/// Override the payment status of a token
#[utoipa::path(
    put,
    path = "/api/v1/tokens/payment-status",
    security(("bearer_auth" = [])),
    request_body = UpdatePaymentStatusRequest,
    responses(
        (status = 200, description = "Payment status updated", body = TokenInfo),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Token not found", body = ApiError)
    ),
    tag = "tokens"
)]
pub async fn update_payment_status(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    body: Result<Json<UpdatePaymentStatusRequest>, JsonRejection>,
) -> Result<Json<TokenInfo>, ApiError> {
    let Json(request) = body?;

    let status = request.payment_status.trim();
    if status.is_empty() {
        return Err(validation_error(
            "Payment status is required",
            serde_json::json!({ "payment_status": "Cannot be empty" }),
        ));
    }

    let token = state
        .entitlements
        .set_payment_status(&request.token, status)
        .await
        .map_err(admin_error)?;

    Ok(Json(token.into()))
}

/// List the active tokens of a company
#[utoipa::path(
    get,
    path = "/api/v1/companies/{company_id}/tokens",
    security(("bearer_auth" = [])),
    params(("company_id" = Uuid, Path, description = "Company identifier")),
    responses(
        (status = 200, description = "Active tokens", body = Vec<TokenInfo>),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Company not found", body = ApiError)
    ),
    tag = "tokens"
)]
pub async fn list_company_tokens(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Vec<TokenInfo>>, ApiError> {
    CompanyRepository::new(state.db.as_ref())
        .find_by_id(company_id)
        .await?
        .ok_or(EntitlementError::CompanyNotFound { company_id })?;

    let tokens = state.entitlements.active_tokens(company_id).await?;
    Ok(Json(tokens.into_iter().map(TokenInfo::from).collect()))
}

/// On administrative paths an unknown token is a missing resource, not an auth failure.
fn admin_error(error: EntitlementError) -> ApiError {
    match error {
        EntitlementError::TokenNotFound => not_found("Token not found"),
        other => other.into(),
    }
}
