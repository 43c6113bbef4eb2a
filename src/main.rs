//! Interview Coach - mock interview session server
//!
//! Each WebSocket connection runs one interview: questions come from a
//! generator, answers are graded by a scorer, and a summary closes the
//! session.

mod api;
mod collaborator;
mod config;
mod protocol;
mod runtime;
mod state_machine;
mod summary;

use api::{create_router, AppState};
use collaborator::Collaborators;
use config::AppConfig;
use runtime::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_coach=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env()?;
    let collaborators = Collaborators::from_config(&config)?;
    let rules = config.session_rules(collaborators.bank_types.clone());

    tracing::info!(
        interview_types = ?rules.interview_types,
        levels = ?rules.levels,
        termination = ?rules.termination,
        generator = collaborators.generator.name(),
        scorer = collaborators.scorer.name(),
        "Session rules loaded"
    );

    let sessions = SessionManager::new(
        Arc::new(rules),
        collaborators.generator,
        collaborators.scorer,
        config.collaborator_timeout,
    );
    let state = AppState::new(sessions);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Interview coach listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
