//! # PayPal IPN Handler

use axum::{body::Bytes, extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::ipn::parse_notification;
use crate::server::AppState;

/// Token issued for a completed payment
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PayPalIpnResponse {
    /// Bearer token for `/validate`
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[schema(example = "Ada Lovelace")]
    pub company_name: String,
}

/// Receive a PayPal Instant Payment Notification
#[utoipa::path(
    post,
    path = "/paypal/ipn",
    request_body(
        content = String,
        content_type = "application/x-www-form-urlencoded",
        description = "Raw IPN form body (txn_id, payer_email, first_name, last_name, mc_gross, mc_currency, payment_status)"
    ),
    responses(
        (status = 200, description = "Payment completed and token issued", body = PayPalIpnResponse),
        (status = 400, description = "Duplicate payment, non-completed status or unverifiable notification", body = ApiError),
        (status = 502, description = "PayPal verification endpoint failed", body = ApiError)
    ),
    tag = "payments"
)]
pub async fn paypal_ipn(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PayPalIpnResponse>, ApiError> {
    state.ipn_verifier.verify(&body).await?;

    let notification = parse_notification(&body);
    let issued = state.entitlements.ingest_payment(&notification).await?;

    Ok(Json(PayPalIpnResponse {
        token: issued.token.token,
        expires_at: issued.token.expires_at,
        company_name: issued.company.name,
    }))
}
