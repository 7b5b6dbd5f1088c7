//! # Server Configuration
//!
//! Router assembly, shared state and the OpenAPI document for the
//! Pipeline Gate API.

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::operator_auth_middleware;
use crate::classifier::Classifier;
use crate::config::AppConfig;
use crate::entitlements::EntitlementManager;
use crate::handlers;
use crate::ipn::IpnVerifier;
use crate::telemetry::trace_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub entitlements: EntitlementManager,
    pub classifier: Arc<dyn Classifier>,
    pub ipn_verifier: IpnVerifier,
}

impl AppState {
    /// Wire the entitlement manager and IPN verifier from configuration
    pub fn new(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            entitlements: EntitlementManager::new(Arc::clone(&db), config.token_validity_days),
            ipn_verifier: IpnVerifier::new(&config.paypal),
            config,
            db,
            classifier,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    let operator_routes = Router::new()
        .route("/api/v1/tokens", post(handlers::tokens::provision_token))
        .route(
            "/api/v1/tokens/payment-status",
            put(handlers::tokens::update_payment_status),
        )
        .route(
            "/api/v1/companies/{company_id}/tokens",
            get(handlers::tokens::list_company_tokens),
        )
        .route_layer(from_fn_with_state(
            Arc::clone(&state.config),
            operator_auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/validate", post(handlers::validate::validate_pipeline))
        .route("/paypal/ipn", post(handlers::paypal::paypal_ipn))
        .merge(operator_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Any origin when none are configured, otherwise the configured list.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!(origin = %origin, error = %err, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: Arc<AppConfig>,
    db: Arc<DatabaseConnection>,
    classifier: Arc<dyn Classifier>,
) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    let profile = config.profile.clone();
    let app = create_app(AppState::new(config, db, classifier));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::validate::validate_pipeline,
        crate::handlers::paypal::paypal_ipn,
        crate::handlers::tokens::provision_token,
        crate::handlers::tokens::update_payment_status,
        crate::handlers::tokens::list_company_tokens,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::handlers::validate::ValidationRequest,
            crate::handlers::validate::ValidationResponse,
            crate::handlers::paypal::PayPalIpnResponse,
            crate::handlers::tokens::ProvisionTokenRequest,
            crate::handlers::tokens::UpdatePaymentStatusRequest,
            crate::handlers::tokens::TokenInfo,
            crate::handlers::tokens::ProvisionedToken,
            crate::classifier::ClassifierStatus,
            crate::error::ApiError,
            crate::error::ProviderError,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Pipeline Gate API",
        description = "Token-gated security validation of CI/CD pipelines",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
