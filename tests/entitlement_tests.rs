//! Integration tests for payment ingestion, token validity and provisioning
//! against an in-memory SQLite database.

mod test_utils;

use chrono::{Duration, Utc};
use pipeline_gate::entitlements::{
    EntitlementError, EntitlementManager, ProvisionRequest, set_active_token,
};
use pipeline_gate::error::is_unique_violation;
use pipeline_gate::models::token::{PAYMENT_STATUS_PAID, PAYMENT_STATUS_PENDING};
use pipeline_gate::repositories::{
    CompanyRepository, NewToken, PaymentRepository, TokenRepository,
};
use sea_orm::TransactionTrait;
use uuid::Uuid;

use test_utils::{completed, insert_company, insert_token, notification, setup_test_db_arc};

async fn manager() -> (EntitlementManager, std::sync::Arc<sea_orm::DatabaseConnection>) {
    let db = setup_test_db_arc().await.expect("test database");
    (EntitlementManager::new(db.clone(), 30), db)
}

#[tokio::test]
async fn completed_payment_creates_company_payment_and_paid_token() {
    let (manager, db) = manager().await;
    let before = Utc::now();

    let issued = manager
        .ingest_payment(&completed("T1", "a@x.com"))
        .await
        .expect("completed payment issues a token");

    assert_eq!(issued.company.email, "a@x.com");
    assert_eq!(issued.company.name, "Ada Lovelace");
    assert_eq!(issued.token.payment_status, PAYMENT_STATUS_PAID);
    assert!(issued.token.is_active);
    assert!(issued.token.token.starts_with("pgt_"));

    let expected = before + Duration::days(30);
    let drift = (issued.token.expires_at - expected).num_seconds().abs();
    assert!(drift < 60, "expiry should be about 30 days out, drift {drift}s");

    let payments = PaymentRepository::new(db.as_ref());
    assert_eq!(payments.count_by_transaction_id("T1").await.unwrap(), 1);
    let payment = payments.find_by_transaction_id("T1").await.unwrap().unwrap();
    assert_eq!(payment.amount.as_deref(), Some("10.00"));
    assert_eq!(payment.currency.as_deref(), Some("USD"));
    assert_eq!(payment.company_id, issued.company.id);

    let validated = manager.validate(&issued.token.token).await.unwrap();
    assert_eq!(validated.id, issued.token.id);
}

#[tokio::test]
async fn replayed_transaction_is_rejected_without_side_effects() {
    let (manager, db) = manager().await;

    let first = manager.ingest_payment(&completed("T1", "a@x.com")).await.unwrap();
    let replay = manager.ingest_payment(&completed("T1", "a@x.com")).await;

    assert!(matches!(
        replay,
        Err(EntitlementError::DuplicatePayment { ref transaction_id }) if transaction_id == "T1"
    ));

    let payments = PaymentRepository::new(db.as_ref());
    assert_eq!(payments.count_by_transaction_id("T1").await.unwrap(), 1);

    let tokens = TokenRepository::new(db.as_ref())
        .list_for_company(first.company.id)
        .await
        .unwrap();
    assert_eq!(tokens.len(), 1);
    assert!(manager.validate(&first.token.token).await.is_ok());
}

#[tokio::test]
async fn concurrent_deliveries_of_one_transaction_store_one_payment() {
    let (manager, db) = manager().await;
    let delivery = completed("T-race", "race@x.com");

    let (left, right) = tokio::join!(
        manager.ingest_payment(&delivery),
        manager.ingest_payment(&delivery)
    );

    let outcomes = [left, right];
    let issued = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let duplicates = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(EntitlementError::DuplicatePayment { .. })))
        .count();
    assert_eq!((issued, duplicates), (1, 1));

    let payments = PaymentRepository::new(db.as_ref());
    assert_eq!(payments.count_by_transaction_id("T-race").await.unwrap(), 1);
}

#[tokio::test]
async fn non_completed_payment_is_recorded_without_token() {
    let (manager, db) = manager().await;

    let result = manager
        .ingest_payment(&notification("T2", "b@x.com", "Pending"))
        .await;
    assert!(matches!(
        result,
        Err(EntitlementError::InvalidPaymentStatus { ref status }) if status == "Pending"
    ));

    let payment = PaymentRepository::new(db.as_ref())
        .find_by_transaction_id("T2")
        .await
        .unwrap()
        .expect("payment persists even when not completed");
    assert_eq!(payment.status, "Pending");

    let company = CompanyRepository::new(db.as_ref())
        .find_by_email("b@x.com")
        .await
        .unwrap()
        .expect("company persists");
    assert!(manager.active_tokens(company.id).await.unwrap().is_empty());

    // The same transaction id cannot be replayed as completed.
    let replay = manager.ingest_payment(&completed("T2", "b@x.com")).await;
    assert!(matches!(replay, Err(EntitlementError::DuplicatePayment { .. })));
}

#[tokio::test]
async fn completed_marker_is_exact() {
    let (manager, _db) = manager().await;

    let result = manager
        .ingest_payment(&notification("T3", "c@x.com", "completed"))
        .await;
    assert!(matches!(result, Err(EntitlementError::InvalidPaymentStatus { .. })));
}

#[tokio::test]
async fn second_payment_rotates_the_active_token() {
    let (manager, _db) = manager().await;

    let first = manager.ingest_payment(&completed("T1", "a@x.com")).await.unwrap();
    let second = manager.ingest_payment(&completed("T4", "a@x.com")).await.unwrap();

    assert_eq!(first.company.id, second.company.id);
    assert_ne!(first.token.token, second.token.token);

    assert!(matches!(
        manager.validate(&first.token.token).await,
        Err(EntitlementError::TokenInactive)
    ));
    assert!(manager.validate(&second.token.token).await.is_ok());

    let active = manager.active_tokens(first.company.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.token.id);
}

#[tokio::test]
async fn many_payments_leave_exactly_one_active_token() {
    let (manager, _db) = manager().await;
    let mut company_id = None;

    for n in 0..5 {
        let issued = manager
            .ingest_payment(&completed(&format!("T-{n}"), "many@x.com"))
            .await
            .unwrap();
        company_id = Some(issued.company.id);
    }

    let active = manager.active_tokens(company_id.unwrap()).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn payments_for_different_companies_are_independent() {
    let (manager, _db) = manager().await;

    let a = manager.ingest_payment(&completed("TA", "a@x.com")).await.unwrap();
    let b = manager.ingest_payment(&completed("TB", "b@x.com")).await.unwrap();

    assert_ne!(a.company.id, b.company.id);
    assert!(manager.validate(&a.token.token).await.is_ok());
    assert!(manager.validate(&b.token.token).await.is_ok());
}

#[tokio::test]
async fn notification_without_payer_is_rejected_before_storage() {
    let (manager, db) = manager().await;

    let result = manager.ingest_payment(&completed("T5", "")).await;
    assert!(matches!(result, Err(EntitlementError::InvalidNotification(_))));
    assert_eq!(
        PaymentRepository::new(db.as_ref())
            .count_by_transaction_id("T5")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn validity_outcomes_follow_evaluation_order() {
    let (manager, db) = manager().await;
    let company = insert_company(db.as_ref(), "v@x.com").await.unwrap();
    let now = Utc::now();

    insert_token(db.as_ref(), company.id, "expired", true, PAYMENT_STATUS_PAID, now - Duration::days(1))
        .await
        .unwrap();
    insert_token(db.as_ref(), company.id, "inactive", false, PAYMENT_STATUS_PAID, now + Duration::days(1))
        .await
        .unwrap();
    insert_token(db.as_ref(), company.id, "stale", false, PAYMENT_STATUS_PENDING, now - Duration::days(1))
        .await
        .unwrap();

    assert!(matches!(
        manager.validate("expired").await,
        Err(EntitlementError::TokenExpired)
    ));
    assert!(matches!(
        manager.validate("inactive").await,
        Err(EntitlementError::TokenInactive)
    ));
    assert!(matches!(
        manager.validate("stale").await,
        Err(EntitlementError::TokenInactive)
    ));
    assert!(matches!(
        manager.validate("never-issued").await,
        Err(EntitlementError::TokenNotFound)
    ));
}

#[tokio::test]
async fn issued_token_expires_after_validity_window() {
    let (manager, _db) = manager().await;
    let issued = manager.ingest_payment(&completed("T6", "e@x.com")).await.unwrap();

    let almost = issued.token.expires_at;
    assert!(manager.validate_at(&issued.token.token, almost).await.is_ok());

    let later = issued.token.expires_at + Duration::seconds(1);
    assert!(matches!(
        manager.validate_at(&issued.token.token, later).await,
        Err(EntitlementError::TokenExpired)
    ));
}

#[tokio::test]
async fn provisioned_token_requires_payment_confirmation() {
    let (manager, db) = manager().await;
    let company = insert_company(db.as_ref(), "p@x.com").await.unwrap();

    let token = manager
        .provision(ProvisionRequest {
            token_value: Some("manual-grant".to_string()),
            company_id: company.id,
            expires_at: Utc::now() + Duration::days(10),
            repository_id: Some("org/repo".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(token.payment_status, PAYMENT_STATUS_PENDING);
    assert_eq!(token.repository_id.as_deref(), Some("org/repo"));
    assert!(matches!(
        manager.validate("manual-grant").await,
        Err(EntitlementError::PaymentNotConfirmed)
    ));

    let updated = manager
        .set_payment_status("manual-grant", PAYMENT_STATUS_PAID)
        .await
        .unwrap();
    assert_eq!(updated.payment_status, PAYMENT_STATUS_PAID);
    assert!(updated.is_active);
    assert!(manager.validate("manual-grant").await.is_ok());
}

#[tokio::test]
async fn provisioning_deactivates_the_previous_token() {
    let (manager, _db) = manager().await;
    let issued = manager.ingest_payment(&completed("T7", "rot@x.com")).await.unwrap();

    let granted = manager
        .provision(ProvisionRequest {
            token_value: None,
            company_id: issued.company.id,
            expires_at: Utc::now() + Duration::days(5),
            repository_id: None,
        })
        .await
        .unwrap();

    assert!(granted.token.starts_with("pgt_"));
    assert!(matches!(
        manager.validate(&issued.token.token).await,
        Err(EntitlementError::TokenInactive)
    ));

    let active = manager.active_tokens(issued.company.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, granted.id);
}

#[tokio::test]
async fn provisioning_for_unknown_company_fails() {
    let (manager, _db) = manager().await;
    let company_id = Uuid::new_v4();

    let result = manager
        .provision(ProvisionRequest {
            token_value: None,
            company_id,
            expires_at: Utc::now() + Duration::days(5),
            repository_id: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(EntitlementError::CompanyNotFound { company_id: missing }) if missing == company_id
    ));
}

#[tokio::test]
async fn payment_status_update_leaves_activity_untouched() {
    let (manager, db) = manager().await;
    let company = insert_company(db.as_ref(), "s@x.com").await.unwrap();
    insert_token(db.as_ref(), company.id, "dormant", false, PAYMENT_STATUS_PENDING, Utc::now() + Duration::days(3))
        .await
        .unwrap();

    let updated = manager
        .set_payment_status("dormant", PAYMENT_STATUS_PAID)
        .await
        .unwrap();
    assert!(!updated.is_active);
    assert!(matches!(
        manager.validate("dormant").await,
        Err(EntitlementError::TokenInactive)
    ));

    assert!(matches!(
        manager.set_payment_status("missing", PAYMENT_STATUS_PAID).await,
        Err(EntitlementError::TokenNotFound)
    ));
}

#[tokio::test]
async fn store_rejects_a_second_active_token() {
    let (_manager, db) = manager().await;
    let company = insert_company(db.as_ref(), "idx@x.com").await.unwrap();
    let expires_at = Utc::now() + Duration::days(1);

    insert_token(db.as_ref(), company.id, "first", true, PAYMENT_STATUS_PAID, expires_at)
        .await
        .unwrap();

    let err = TokenRepository::new(db.as_ref())
        .insert(
            NewToken {
                value: "second".to_string(),
                company_id: company.id,
                repository_id: None,
                payment_status: PAYMENT_STATUS_PAID.to_string(),
                expires_at,
            },
            Utc::now(),
        )
        .await
        .expect_err("partial unique index rejects a second active token");
    assert!(is_unique_violation(&err));
}

#[tokio::test]
async fn rolled_back_activation_keeps_the_old_token() {
    let (manager, db) = manager().await;
    let issued = manager.ingest_payment(&completed("T8", "rb@x.com")).await.unwrap();

    let txn = db.begin().await.unwrap();
    set_active_token(
        &txn,
        NewToken {
            value: "never-committed".to_string(),
            company_id: issued.company.id,
            repository_id: None,
            payment_status: PAYMENT_STATUS_PAID.to_string(),
            expires_at: Utc::now() + Duration::days(1),
        },
        Utc::now(),
    )
    .await
    .unwrap();
    drop(txn);

    assert!(manager.validate(&issued.token.token).await.is_ok());
    assert!(matches!(
        manager.validate("never-committed").await,
        Err(EntitlementError::TokenNotFound)
    ));
}
