pub mod server;

use crate::{config::AppConfig, webhook::router::EventRouter};
use std::sync::Arc;

/// Read-only state shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub router: EventRouter,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, router: EventRouter) -> Self {
        Self { config, router }
    }
}
