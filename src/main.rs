//! leadchat - lead-capture chat widget backend
//!
//! Hosts scripted widget conversations that qualify parents and schools,
//! and stores the leads they produce for the marketing dashboard.

mod api;
mod config;
mod flow;
mod runtime;
mod state_machine;
mod store;

use api::{create_router, AppState};
use axum::http::HeaderValue;
use config::ServerConfig;
use flow::FlowScript;
use state_machine::ChatContext;
use std::net::SocketAddr;
use std::sync::Arc;
use store::LeadStore;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leadchat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // A broken script is a deploy error; refuse to serve it
    let script = FlowScript::lead_capture()?;
    let problems = script.validate();
    if let Some(first) = problems.first() {
        for problem in &problems {
            tracing::error!(error = %problem, "Flow script problem");
        }
        return Err(first.to_string().into());
    }
    tracing::info!(steps = script.len(), entry = %script.entry(), "Flow script loaded");

    tracing::info!(path = %config.data_path.display(), "Opening lead store");
    let store = LeadStore::open(&config.data_path)?;

    let context = ChatContext::new(Arc::new(script), config.pacing);
    let state = AppState::new(store, context);
    state.sessions.spawn_reaper(config.session_idle);

    let cors = match &config.frontend_url {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let mut app = create_router(state);
    if let Some(dir) = &config.static_dir {
        tracing::info!(dir = %dir.display(), "Serving widget frontend");
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("leadchat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
