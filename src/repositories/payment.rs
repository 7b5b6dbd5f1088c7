//! # Payment Repository
//!
//! Append-only storage of provider transactions.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::models::payment::{self, ActiveModel, Entity as Payment, Model as PaymentModel};

/// Values recorded for one provider transaction
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub company_id: Uuid,
    pub transaction_id: String,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub status: String,
    pub payment_date: DateTime<Utc>,
}

/// Repository for Payment database operations
pub struct PaymentRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> PaymentRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentModel>, DbErr> {
        Payment::find()
            .filter(payment::Column::TransactionId.eq(transaction_id))
            .one(self.conn)
            .await
    }

    pub async fn count_by_transaction_id(&self, transaction_id: &str) -> Result<u64, DbErr> {
        Payment::find()
            .filter(payment::Column::TransactionId.eq(transaction_id))
            .count(self.conn)
            .await
    }

    /// Record a payment. A repeated transaction id surfaces as a unique violation.
    pub async fn insert(&self, new_payment: NewPayment, now: DateTime<Utc>) -> Result<PaymentModel, DbErr> {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(new_payment.company_id),
            transaction_id: Set(new_payment.transaction_id),
            amount: Set(new_payment.amount),
            currency: Set(new_payment.currency),
            status: Set(new_payment.status),
            payment_date: Set(new_payment.payment_date),
            created_at: Set(now),
        }
        .insert(self.conn)
        .await
    }

    pub async fn list_for_company(&self, company_id: Uuid) -> Result<Vec<PaymentModel>, DbErr> {
        Payment::find()
            .filter(payment::Column::CompanyId.eq(company_id))
            .order_by_asc(payment::Column::CreatedAt)
            .all(self.conn)
            .await
    }
}
