pub mod auth;
pub mod clock;
pub mod config;
pub mod dirs;
pub mod error;
pub mod handlers;
pub mod models;
pub mod rate_limit;
pub mod response;
pub mod seed;
pub mod server;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: store::Store,
    pub tokens: Arc<auth::TokenService>,
    pub clock: clock::SharedClock,
    pub environment: config::Environment,
}

impl AppState {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

pub use config::{Environment, ServerConfig};
pub use server::{app, router, run};
