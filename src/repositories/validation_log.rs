//! # Validation Log Repository
//!
//! Append-only audit sink for gated classification requests.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::validation_log::{
    self, ActiveModel, Entity as ValidationLog, Model as ValidationLogModel,
};

pub struct ValidationLogRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ValidationLogRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Append one audit record
    pub async fn append(
        &self,
        token_id: Uuid,
        payload: JsonValue,
        result: JsonValue,
        status: &str,
    ) -> Result<ValidationLogModel, DbErr> {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            token_id: Set(token_id),
            payload: Set(payload),
            result: Set(result),
            status: Set(status.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn)
        .await
    }

    pub async fn list_for_token(&self, token_id: Uuid) -> Result<Vec<ValidationLogModel>, DbErr> {
        ValidationLog::find()
            .filter(validation_log::Column::TokenId.eq(token_id))
            .order_by_asc(validation_log::Column::CreatedAt)
            .all(self.conn)
            .await
    }
}
