//! # Pipeline Gate Library
//!
//! Token-gated CI/CD pipeline validation: payment-driven token lifecycle,
//! classification of pipeline payloads and the HTTP surface around them.

pub mod auth;
pub mod classifier;
pub mod config;
pub mod db;
pub mod entitlements;
pub mod error;
pub mod handlers;
pub mod ipn;
pub mod models;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub use migration;
