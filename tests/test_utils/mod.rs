//! Test utilities for database testing.
//!
//! In-memory SQLite databases with all migrations applied, plus fixture
//! helpers for companies, tokens and payment notifications.

#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use pipeline_gate::entitlements::{COMPLETED_STATUS, PaymentNotification};
use pipeline_gate::models::{company, token};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::sync::Arc;
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// SeaORM limits in-memory SQLite pools to one connection, so concurrent
/// transactions in a test run one after another.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Same as [`setup_test_db`], wrapped in an `Arc`.
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

/// Inserts a company row.
pub async fn insert_company(db: &DatabaseConnection, email: &str) -> Result<company::Model> {
    let now = Utc::now();
    let model = company::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Test Company".to_string()),
        email: Set(email.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(model)
}

/// Inserts a token row directly, bypassing the entitlement manager.
pub async fn insert_token(
    db: &DatabaseConnection,
    company_id: Uuid,
    value: &str,
    is_active: bool,
    payment_status: &str,
    expires_at: DateTime<Utc>,
) -> Result<token::Model> {
    let now = Utc::now();
    let model = token::ActiveModel {
        id: Set(Uuid::new_v4()),
        token: Set(value.to_string()),
        company_id: Set(company_id),
        repository_id: Set(None),
        is_active: Set(is_active),
        payment_status: Set(payment_status.to_string()),
        expires_at: Set(expires_at),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(model)
}

/// A notification with the given transaction id, payer and status.
pub fn notification(transaction_id: &str, payer_email: &str, status: &str) -> PaymentNotification {
    PaymentNotification {
        transaction_id: transaction_id.to_string(),
        payer_email: payer_email.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        gross_amount: Some("10.00".to_string()),
        currency: Some("USD".to_string()),
        payment_status: status.to_string(),
    }
}

/// A completed notification.
pub fn completed(transaction_id: &str, payer_email: &str) -> PaymentNotification {
    notification(transaction_id, payer_email, COMPLETED_STATUS)
}

/// Form-encoded IPN body for a notification.
pub fn ipn_form(transaction_id: &str, payer_email: &str, status: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("txn_id", transaction_id)
        .append_pair("payer_email", payer_email)
        .append_pair("first_name", "Ada")
        .append_pair("last_name", "Lovelace")
        .append_pair("mc_gross", "10.00")
        .append_pair("mc_currency", "USD")
        .append_pair("payment_status", status)
        .finish()
}
