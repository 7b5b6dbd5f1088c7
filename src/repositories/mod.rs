//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations. Every
//! repository borrows a `ConnectionTrait` implementor so the same calls run
//! against the pool or inside an open transaction.

pub mod company;
pub mod payment;
pub mod token;
pub mod validation_log;

pub use company::CompanyRepository;
pub use payment::{NewPayment, PaymentRepository};
pub use token::{NewToken, TokenRepository};
pub use validation_log::ValidationLogRepository;
