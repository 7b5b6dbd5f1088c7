//! Token entity model
//!
//! A token is the bearer credential that grants access to the validation
//! endpoint. Validity is derived at check time from `is_active`,
//! `payment_status` and `expires_at`; nothing sweeps expired rows.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment status recorded when a token is provisioned administratively.
pub const PAYMENT_STATUS_PENDING: &str = "pending";

/// Payment status required for a token to be usable.
pub const PAYMENT_STATUS_PAID: &str = "paid";

/// Token entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Opaque secret value presented by callers
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token: String,

    /// Owning company
    pub company_id: Uuid,

    /// Optional repository restriction
    pub repository_id: Option<String>,

    pub is_active: bool,

    /// `pending` or `paid`
    pub payment_status: String,

    pub expires_at: DateTimeUtc,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Whether the stored payment status is the paid marker
    pub fn is_paid(&self) -> bool {
        self.payment_status == PAYMENT_STATUS_PAID
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
    #[sea_orm(has_many = "super::validation_log::Entity")]
    ValidationLogs,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::validation_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ValidationLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
