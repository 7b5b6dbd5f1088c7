//! # Token Repository
//!
//! Data access for access tokens. The single-active-token transition itself
//! lives in the entitlements module; this layer only offers the primitives.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::models::token::{self, ActiveModel, Entity as Token, Model as TokenModel};

/// Values for a token about to be inserted
#[derive(Debug, Clone)]
pub struct NewToken {
    pub value: String,
    pub company_id: Uuid,
    pub repository_id: Option<String>,
    pub payment_status: String,
    pub expires_at: DateTime<Utc>,
}

/// Repository for Token database operations
pub struct TokenRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> TokenRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Find a token by its opaque secret value
    pub async fn find_by_value(&self, value: &str) -> Result<Option<TokenModel>, DbErr> {
        Token::find()
            .filter(token::Column::Token.eq(value))
            .one(self.conn)
            .await
    }

    /// Active tokens owned by a company, newest first
    pub async fn list_active_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<TokenModel>, DbErr> {
        Token::find()
            .filter(token::Column::CompanyId.eq(company_id))
            .filter(token::Column::IsActive.eq(true))
            .order_by_desc(token::Column::CreatedAt)
            .all(self.conn)
            .await
    }

    /// Every token owned by a company, oldest first
    pub async fn list_for_company(&self, company_id: Uuid) -> Result<Vec<TokenModel>, DbErr> {
        Token::find()
            .filter(token::Column::CompanyId.eq(company_id))
            .order_by_asc(token::Column::CreatedAt)
            .all(self.conn)
            .await
    }

    /// Clear `is_active` on every active token of the company. Returns rows affected.
    pub async fn deactivate_all_for_company(
        &self,
        company_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let result = Token::update_many()
            .col_expr(token::Column::IsActive, Expr::value(false))
            .col_expr(token::Column::UpdatedAt, Expr::value(now))
            .filter(token::Column::CompanyId.eq(company_id))
            .filter(token::Column::IsActive.eq(true))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Insert an active token
    pub async fn insert(&self, new_token: NewToken, now: DateTime<Utc>) -> Result<TokenModel, DbErr> {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            token: Set(new_token.value),
            company_id: Set(new_token.company_id),
            repository_id: Set(new_token.repository_id),
            is_active: Set(true),
            payment_status: Set(new_token.payment_status),
            expires_at: Set(new_token.expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.conn)
        .await
    }

    /// Overwrite the payment status of a token
    pub async fn update_payment_status(
        &self,
        token: TokenModel,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenModel, DbErr> {
        let mut active = token.into_active_model();
        active.payment_status = Set(status.to_string());
        active.updated_at = Set(now);
        active.update(self.conn).await
    }
}
