use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use site_core::backend::Backend;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Settings;
use crate::handlers::{
    app::{health_check, index},
    auth::{login_handler, login_page, logout_handler},
    posts::{
        cancel_edit, confirm_delete_page, create_post, delete_post, edit_post, update_post,
    },
};
use crate::middleware::{admin::require_admin, request_id::request_id_middleware};
use crate::visitors::Visitors;
use crate::AppState;

/// Connects the configured backend and starts the idle-visitor sweeper.
/// Must run inside the tokio runtime that will serve requests.
pub fn build_state(settings: &Settings) -> anyhow::Result<AppState> {
    let idle = settings.server.session_idle();
    if idle.is_zero() {
        anyhow::bail!("server.session_idle_minutes must be greater than zero");
    }

    let core = settings.core();
    let backend = Backend::from_settings(&core.backend)?;
    let visitors = Arc::new(Visitors::new(backend, core, idle)?);
    visitors.spawn_sweeper(idle / 4);

    Ok(
        AppState::new(visitors, settings.site.contact_relay_url.clone())
            .with_secure_cookies(settings.server.secure_cookies),
    )
}

fn session_expiry(idle: Duration) -> Expiry {
    let seconds = i64::try_from(idle.as_secs()).unwrap_or(i64::MAX).min(i64::from(u32::MAX));
    Expiry::OnInactivity(time::Duration::seconds(seconds))
}

pub fn build_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.secure_cookies)
        .with_expiry(session_expiry(state.visitors.idle()));

    let admin = Router::new()
        .route("/admin/posts", post(create_post))
        .route("/admin/posts/edit", post(update_post))
        .route("/admin/posts/edit/cancel", post(cancel_edit))
        .route("/admin/posts/:id/edit", get(edit_post))
        .route(
            "/admin/posts/:id/delete",
            get(confirm_delete_page).post(delete_post),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", post(logout_handler))
        .merge(admin)
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
