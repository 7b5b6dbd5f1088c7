//! # Entitlement Manager
//!
//! Owns the company / token / payment lifecycle:
//!
//! - idempotent payment ingestion keyed on the provider transaction id
//! - at most one active token per company, enforced by [`set_active_token`]
//! - token validity evaluation (active, paid, not expired) gating paid calls
//!
//! Every write path runs inside one database transaction. Dropping an
//! uncommitted [`DatabaseTransaction`] rolls it back, so a cancelled request
//! never leaves partial state behind.

use axum::http::StatusCode;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use rand::RngCore;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::is_unique_violation;
use crate::models::company::Model as CompanyModel;
use crate::models::token::{Model as TokenModel, PAYMENT_STATUS_PAID, PAYMENT_STATUS_PENDING};
use crate::repositories::{
    CompanyRepository, NewPayment, NewToken, PaymentRepository, TokenRepository,
};

/// Provider status that triggers token issuance
pub const COMPLETED_STATUS: &str = "Completed";

/// Default validity window for tokens issued by a completed payment
pub const DEFAULT_TOKEN_VALIDITY_DAYS: u32 = 30;

/// Prefix of generated token secrets
pub const TOKEN_PREFIX: &str = "pgt_";

/// Entitlement failures. Everything except [`EntitlementError::Store`] is a
/// terminal, user-facing outcome.
#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("duplicate payment: transaction {transaction_id} was already processed")]
    DuplicatePayment { transaction_id: String },

    #[error("invalid payment status: {status}")]
    InvalidPaymentStatus { status: String },

    #[error("invalid token")]
    TokenNotFound,

    #[error("token inactive")]
    TokenInactive,

    #[error("payment pending or invalid")]
    PaymentNotConfirmed,

    #[error("token expired")]
    TokenExpired,

    #[error("company {company_id} not found")]
    CompanyNotFound { company_id: Uuid },

    #[error("invalid payment notification: {0}")]
    InvalidNotification(String),

    #[error("store error: {0}")]
    Store(#[from] DbErr),
}

impl EntitlementError {
    /// Stable machine-readable reason
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::DuplicatePayment { .. } => "DUPLICATE_PAYMENT",
            Self::InvalidPaymentStatus { .. } => "INVALID_PAYMENT_STATUS",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::TokenInactive => "TOKEN_INACTIVE",
            Self::PaymentNotConfirmed => "PAYMENT_NOT_CONFIRMED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::CompanyNotFound { .. } => "COMPANY_NOT_FOUND",
            Self::InvalidNotification(_) => "INVALID_NOTIFICATION",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// HTTP status for the gate and payment paths. Administrative handlers
    /// remap `TokenNotFound` to 404 themselves.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TokenNotFound
            | Self::TokenInactive
            | Self::PaymentNotConfirmed
            | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::DuplicatePayment { .. }
            | Self::InvalidPaymentStatus { .. }
            | Self::InvalidNotification(_) => StatusCode::BAD_REQUEST,
            Self::CompanyNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the four token validity outcomes
    pub fn is_validity_failure(&self) -> bool {
        matches!(
            self,
            Self::TokenNotFound | Self::TokenInactive | Self::PaymentNotConfirmed | Self::TokenExpired
        )
    }
}

/// A normalised payment-provider notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub transaction_id: String,
    pub payer_email: String,
    pub first_name: String,
    pub last_name: String,
    pub gross_amount: Option<String>,
    pub currency: Option<String>,
    pub payment_status: String,
}

impl PaymentNotification {
    /// Display name used when the payer's company is first seen
    pub fn company_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_completed(&self) -> bool {
        self.payment_status == COMPLETED_STATUS
    }

    fn ensure_identifiable(&self) -> Result<(), EntitlementError> {
        if self.transaction_id.trim().is_empty() {
            return Err(EntitlementError::InvalidNotification(
                "missing txn_id".to_string(),
            ));
        }
        if self.payer_email.trim().is_empty() {
            return Err(EntitlementError::InvalidNotification(
                "missing payer_email".to_string(),
            ));
        }
        Ok(())
    }
}

/// Token issued by a completed payment, with its owning company
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: TokenModel,
    pub company: CompanyModel,
}

/// Administrative grant request
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Secret to store; generated when absent
    pub token_value: Option<String>,
    pub company_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub repository_id: Option<String>,
}

/// Validity rule, checked in order: inactive, unpaid, expired.
///
/// A token expiring exactly at `now` is still valid.
pub fn evaluate(token: &TokenModel, now: DateTime<Utc>) -> Result<(), EntitlementError> {
    if !token.is_active {
        return Err(EntitlementError::TokenInactive);
    }
    if !token.is_paid() {
        return Err(EntitlementError::PaymentNotConfirmed);
    }
    if token.expires_at < now {
        return Err(EntitlementError::TokenExpired);
    }
    Ok(())
}

/// Generate a new opaque token secret
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Make `new_token` the only active token of its company.
///
/// Locks the company row, deactivates every active token it owns and
/// inserts the new one, all on the caller's transaction. Both the payment
/// path and administrative provisioning go through here.
pub async fn set_active_token(
    txn: &DatabaseTransaction,
    new_token: NewToken,
    now: DateTime<Utc>,
) -> Result<TokenModel, EntitlementError> {
    let company_id = new_token.company_id;

    CompanyRepository::new(txn)
        .find_by_id_for_update(company_id)
        .await?
        .ok_or(EntitlementError::CompanyNotFound { company_id })?;

    let tokens = TokenRepository::new(txn);
    let deactivated = tokens.deactivate_all_for_company(company_id, now).await?;
    let token = tokens.insert(new_token, now).await?;

    debug!(
        company_id = %company_id,
        token_id = %token.id,
        deactivated,
        "Activated token"
    );
    counter!("entitlement_tokens_issued_total", "payment_status" => token.payment_status.clone())
        .increment(1);

    Ok(token)
}

/// Entry point for every entitlement operation
#[derive(Clone)]
pub struct EntitlementManager {
    db: Arc<DatabaseConnection>,
    validity: Duration,
}

impl EntitlementManager {
    pub fn new(db: Arc<DatabaseConnection>, validity_days: u32) -> Self {
        Self {
            db,
            validity: Duration::days(i64::from(validity_days)),
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Record a provider notification and, when completed, issue a token.
    pub async fn ingest_payment(
        &self,
        notification: &PaymentNotification,
    ) -> Result<IssuedToken, EntitlementError> {
        self.ingest_payment_at(notification, Utc::now()).await
    }

    #[instrument(skip_all, fields(transaction_id = %notification.transaction_id, payment_status = %notification.payment_status))]
    pub async fn ingest_payment_at(
        &self,
        notification: &PaymentNotification,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, EntitlementError> {
        notification.ensure_identifiable()?;

        let txn = self.db.begin().await?;
        let payments = PaymentRepository::new(&txn);

        if payments
            .find_by_transaction_id(&notification.transaction_id)
            .await?
            .is_some()
        {
            return Err(duplicate(notification));
        }

        let companies = CompanyRepository::new(&txn);
        let company = companies
            .find_or_create_by_email(&notification.payer_email, &notification.company_name(), now)
            .await?;

        // Lock before the payment insert so concurrent payments of one
        // company queue here instead of deadlocking in `set_active_token`.
        companies
            .find_by_id_for_update(company.id)
            .await?
            .ok_or(EntitlementError::CompanyNotFound { company_id: company.id })?;

        let record = NewPayment {
            company_id: company.id,
            transaction_id: notification.transaction_id.clone(),
            amount: notification.gross_amount.clone(),
            currency: notification.currency.clone(),
            status: notification.payment_status.clone(),
            payment_date: now,
        };

        // A concurrent delivery of the same transaction can pass the check
        // above; the unique index on transaction_id decides the winner.
        match payments.insert(record, now).await {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Err(duplicate(notification)),
            Err(err) => return Err(err.into()),
        }

        counter!("entitlement_payments_ingested_total", "status" => notification.payment_status.clone())
            .increment(1);

        if !notification.is_completed() {
            txn.commit().await?;
            info!(company_id = %company.id, "Recorded payment without issuing a token");
            return Err(EntitlementError::InvalidPaymentStatus {
                status: notification.payment_status.clone(),
            });
        }

        let new_token = NewToken {
            value: generate_token_value(),
            company_id: company.id,
            repository_id: None,
            payment_status: PAYMENT_STATUS_PAID.to_string(),
            expires_at: now + self.validity,
        };
        let token = set_active_token(&txn, new_token, now).await?;

        txn.commit().await?;

        info!(
            company_id = %company.id,
            token_id = %token.id,
            expires_at = %token.expires_at,
            "Issued token for completed payment"
        );

        Ok(IssuedToken { token, company })
    }

    /// Check a presented token against the validity rule
    pub async fn validate(&self, token_value: &str) -> Result<TokenModel, EntitlementError> {
        self.validate_at(token_value, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        token_value: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenModel, EntitlementError> {
        let outcome = match TokenRepository::new(self.db.as_ref())
            .find_by_value(token_value)
            .await?
        {
            Some(token) => evaluate(&token, now).map(|()| token),
            None => Err(EntitlementError::TokenNotFound),
        };

        if let Err(err) = &outcome
            && err.is_validity_failure()
        {
            debug!(reason = err.reason_code(), "Rejected token");
            counter!("entitlement_rejections_total", "reason" => err.reason_code()).increment(1);
        }

        outcome
    }

    /// Administrative grant. The token starts `pending` and stays unusable
    /// until its payment status is set to `paid`.
    #[instrument(skip_all, fields(company_id = %request.company_id))]
    pub async fn provision(&self, request: ProvisionRequest) -> Result<TokenModel, EntitlementError> {
        let now = Utc::now();
        let value = request
            .token_value
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(generate_token_value);

        let txn = self.db.begin().await?;
        let token = set_active_token(
            &txn,
            NewToken {
                value,
                company_id: request.company_id,
                repository_id: request.repository_id,
                payment_status: PAYMENT_STATUS_PENDING.to_string(),
                expires_at: request.expires_at,
            },
            now,
        )
        .await?;
        txn.commit().await?;

        info!(token_id = %token.id, expires_at = %token.expires_at, "Provisioned token");
        Ok(token)
    }

    /// Overwrite the payment status of a token. Does not touch `is_active`.
    #[instrument(skip_all, fields(status = %status))]
    pub async fn set_payment_status(
        &self,
        token_value: &str,
        status: &str,
    ) -> Result<TokenModel, EntitlementError> {
        let tokens = TokenRepository::new(self.db.as_ref());
        let token = tokens
            .find_by_value(token_value)
            .await?
            .ok_or(EntitlementError::TokenNotFound)?;

        let updated = tokens.update_payment_status(token, status, Utc::now()).await?;
        info!(token_id = %updated.id, "Updated token payment status");
        Ok(updated)
    }

    /// Active tokens of a company
    pub async fn active_tokens(&self, company_id: Uuid) -> Result<Vec<TokenModel>, EntitlementError> {
        Ok(TokenRepository::new(self.db.as_ref())
            .list_active_for_company(company_id)
            .await?)
    }
}

fn duplicate(notification: &PaymentNotification) -> EntitlementError {
    warn!(transaction_id = %notification.transaction_id, "Duplicate payment notification");
    counter!("entitlement_duplicate_payments_total").increment(1);
    EntitlementError::DuplicatePayment {
        transaction_id: notification.transaction_id.clone(),
    }
}
