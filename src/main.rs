//! # Meta Webhook Gateway
//!
//! Main entry point for the Meta (Instagram, Facebook Page, WhatsApp) webhook
//! gateway. Loads configuration, wires the handler registry to the dispatch
//! worker and serves the webhook routes.

pub mod config;
pub mod consts;
pub mod front;
pub mod metric;
pub mod webhook;

use anyhow::Context;
use logfire::config::{MetricsOptions, SendToLogfire};
use ntex::web;
use std::sync::Arc;

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    // Initialize configuration
    let app_config = Arc::new(config::AppConfig::load().context("failed to load app config")?);

    // Initialize logging and metrics
    let mut logfire_config = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()))
        .send_to_logfire(SendToLogfire::IfTokenPresent);
    if let Some(token) = &app_config.logfire_token {
        logfire_config = logfire_config.with_token(token);
    }
    let shutdown_handler = logfire_config.finish()?;

    // Handlers run on a single background worker, requests only enqueue them
    let registry = webhook::handlers::default_registry(&app_config.field_aliases()?);
    logfire::info!(
        "Registered webhook handlers: {keys}",
        keys = registry
            .registered_keys()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    let (dispatcher, worker) = webhook::dispatcher::Dispatcher::new(
        app_config.dispatch_queue_capacity,
        app_config.handler_timeout(),
    );
    ntex::rt::spawn(worker.run());

    let app_state = front::AppState::new(
        app_config.clone(),
        webhook::router::EventRouter::new(Arc::new(registry), dispatcher),
    );

    configure_and_run_server(&app_config, app_state).await?;

    shutdown_handler.shutdown()?;

    Ok(())
}

/// Configures and starts the web server
async fn configure_and_run_server(
    app_config: &config::AppConfig,
    app_state: front::AppState,
) -> anyhow::Result<()> {
    let server_addr = (app_config.web_server_host.clone(), app_config.port);

    logfire::info!(
        "Meta webhook server listening on {host}:{port} ({env})",
        host = server_addr.0.clone(),
        port = i64::from(server_addr.1),
        env = app_config.env.clone()
    );

    web::server(move || {
        web::App::new()
            .state(app_state.clone())
            .configure(webhook::routes::webhook)
            .service(front::server::index)
            .default_service(web::route().to(front::server::serve_not_found))
    })
    .bind(server_addr)?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
