//! The site client: auth gate, content sync and admin editor wired to one backend.

pub mod admin_editor;
pub mod auth_gate;
pub mod content_sync;
pub mod view;

pub use admin_editor::{AdminEditor, Confirm, DeleteOutcome, EditingDraft, PostForm};
pub use auth_gate::{AuthGate, GateOptions};
pub use content_sync::{ContentSync, SyncState};
pub use view::{GateState, ViewMode, view_mode};

use crate::backend::Stores;
use crate::config::CoreConfig;
use crate::error::ConfigError;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SiteClient {
    pub gate: Arc<AuthGate>,
    pub sync: Arc<ContentSync>,
    pub editor: Mutex<AdminEditor>,
}

impl SiteClient {
    /// Subscribes to both stores. Must be called inside a tokio runtime.
    pub fn start(stores: Stores, config: &CoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let path = config.collection_path();

        let gate = AuthGate::start(
            stores.sessions.clone(),
            config.admin_email()?,
            GateOptions::from_settings(&config.site),
        );

        let sync = ContentSync::new(stores.content.clone(), path.clone());
        sync.follow(gate.watch());

        let editor = AdminEditor::new(gate.clone(), stores.content, path);

        tracing::debug!(
            path = %sync.path(),
            auto_anonymous = config.site.auto_anonymous,
            "Site client started"
        );

        Ok(Self {
            gate,
            sync,
            editor: Mutex::new(editor),
        })
    }

    pub fn mode(&self) -> ViewMode {
        self.gate.mode()
    }

    /// Releases both subscriptions.
    pub async fn shutdown(&self) {
        self.sync.shutdown().await;
        self.gate.shutdown().await;
        tracing::debug!("Site client stopped");
    }
}
