//! Payment entity model
//!
//! Append-only record of one payment-provider transaction. The provider
//! transaction id is unique and is never rewritten.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    /// Provider transaction id (PayPal `txn_id`)
    #[sea_orm(unique)]
    pub transaction_id: String,

    /// Gross amount exactly as reported by the provider
    pub amount: Option<String>,

    pub currency: Option<String>,

    /// Provider status string (e.g. `Completed`, `Pending`)
    pub status: String,

    pub payment_date: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
