use crate::visitors::Visitor;
use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use site_core::client::ViewMode;

/// Lets a request through only while the requesting visitor sees the admin panel.
pub async fn require_admin(visitor: Visitor, request: Request<Body>, next: Next) -> Response {
    let mode = visitor.mode();
    if mode != ViewMode::AdminPanel {
        tracing::debug!(?mode, path = %request.uri().path(), "Admin route outside the admin panel");
        return Redirect::to("/").into_response();
    }

    next.run(request).await
}
