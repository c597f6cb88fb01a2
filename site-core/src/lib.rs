//! site-core: session gate, content sync and editor state for the Noor al-Hidaya site.
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod models;
pub mod observability;

pub use async_trait;
pub use chrono;
pub use secrecy;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
