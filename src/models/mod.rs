//! # Data Models
//!
//! SeaORM entities owned by the service plus the service info payload.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod company;
pub mod payment;
pub mod token;
pub mod validation_log;

pub use company::Entity as Company;
pub use payment::Entity as Payment;
pub use token::Entity as Token;
pub use validation_log::Entity as ValidationLog;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
    /// Short description of the service
    pub message: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "pipeline-gate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            message: "Pipeline Validation API".to_string(),
        }
    }
}
