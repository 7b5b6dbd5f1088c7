//! Administrative grant of an access token.
//!
//! Usage:
//! ```bash
//! cargo run --bin provision_token -- --company-id <uuid> [--days 30] [--token <value>] \
//!     [--repository-id <repo>] [--paid]
//! ```
//!
//! The token is created through the same path as the operator API, so any
//! previously active token of the company is deactivated. Without `--paid`
//! it stays unusable until its payment status is set to `paid`.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use clap::Parser;
use uuid::Uuid;

use pipeline_gate::{
    config::ConfigLoader,
    db::{init_pool, run_migrations},
    entitlements::{EntitlementManager, ProvisionRequest},
    models::token::PAYMENT_STATUS_PAID,
    telemetry::init_tracing,
};

#[derive(Parser, Debug)]
#[command(name = "provision_token", about = "Grant an access token to a company")]
struct Args {
    /// Company receiving the token
    #[arg(long)]
    company_id: Uuid,

    /// Validity in days
    #[arg(long, default_value_t = 30)]
    days: u32,

    /// Token secret; generated when omitted
    #[arg(long)]
    token: Option<String>,

    /// Restrict the token to one repository
    #[arg(long)]
    repository_id: Option<String>,

    /// Mark the token as paid right away
    #[arg(long)]
    paid: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.days == 0 {
        bail!("--days must be greater than zero");
    }

    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;
    init_tracing(&config).context("Failed to initialize tracing")?;

    let db = init_pool(&config).await?;
    run_migrations(&db).await?;

    let manager = EntitlementManager::new(Arc::new(db), config.token_validity_days);

    let mut token = manager
        .provision(ProvisionRequest {
            token_value: args.token,
            company_id: args.company_id,
            expires_at: Utc::now() + Duration::days(i64::from(args.days)),
            repository_id: args.repository_id,
        })
        .await
        .context("Failed to provision token")?;

    if args.paid {
        token = manager
            .set_payment_status(&token.token, PAYMENT_STATUS_PAID)
            .await
            .context("Failed to mark token as paid")?;
    }

    println!("token:          {}", token.token);
    println!("company_id:     {}", token.company_id);
    println!("payment_status: {}", token.payment_status);
    println!("expires_at:     {}", token.expires_at.to_rfc3339());

    Ok(())
}
