//! # Company Repository
//!
//! Lookups and the email-keyed upsert used by payment ingestion.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect, Set};
use uuid::Uuid;

use crate::models::company::{self, ActiveModel, Entity as Company, Model as CompanyModel};

/// Repository for Company database operations
pub struct CompanyRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> CompanyRepository<'a, C> {
    /// Create a repository over a pool or an open transaction
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Get company by ID
    pub async fn find_by_id(&self, company_id: Uuid) -> Result<Option<CompanyModel>, DbErr> {
        Company::find_by_id(company_id).one(self.conn).await
    }

    /// Get company by ID, taking a row lock for the rest of the transaction.
    ///
    /// The lock is `FOR NO KEY UPDATE`: it serialises token activation per
    /// company but does not conflict with the key-share locks that foreign
    /// key checks on `payments` and `tokens` take. Backends without row
    /// locks (SQLite) ignore the clause; their writers are already serialised.
    pub async fn find_by_id_for_update(
        &self,
        company_id: Uuid,
    ) -> Result<Option<CompanyModel>, DbErr> {
        Company::find_by_id(company_id)
            .lock(LockType::NoKeyUpdate)
            .one(self.conn)
            .await
    }

    /// Get company by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<CompanyModel>, DbErr> {
        Company::find()
            .filter(company::Column::Email.eq(email))
            .one(self.conn)
            .await
    }

    /// Return the company owning `email`, creating it when absent.
    ///
    /// The insert is `ON CONFLICT (email) DO NOTHING`, so two concurrent
    /// first payments from the same payer resolve to one row instead of
    /// aborting the losing transaction.
    pub async fn find_or_create_by_email(
        &self,
        email: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<CompanyModel, DbErr> {
        if let Some(existing) = self.find_by_email(email).await? {
            return Ok(existing);
        }

        let candidate = ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = Company::insert(candidate)
            .on_conflict(
                OnConflict::column(company::Column::Email)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await?;

        if inserted > 0 {
            tracing::info!(email = %email, "Created company for new payer");
        }

        self.find_by_email(email)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("company with email {email}")))
    }
}
