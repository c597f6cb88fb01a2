pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod startup;
pub mod views;
pub mod visitors;

use std::sync::Arc;
use visitors::Visitors;

/// Shared application state: the per-visitor site clients.
#[derive(Clone)]
pub struct AppState {
    pub visitors: Arc<Visitors>,
    pub contact_relay_url: Option<String>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(visitors: Arc<Visitors>, contact_relay_url: Option<String>) -> Self {
        Self {
            visitors,
            contact_relay_url,
            secure_cookies: false,
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}
