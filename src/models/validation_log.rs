//! Validation log entity model
//!
//! Audit record of one gated classification request.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "validation_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Token used for the request
    pub token_id: Uuid,

    /// Raw pipeline payload as submitted
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: JsonValue,

    /// Classification result as returned by the engine
    #[sea_orm(column_type = "JsonBinary")]
    pub result: JsonValue,

    /// Derived status (OK, RISK or FAIL)
    pub status: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::token::Entity",
        from = "Column::TokenId",
        to = "super::token::Column::Id"
    )]
    Token,
}

impl Related<super::token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Token.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
