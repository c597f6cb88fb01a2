use crate::views::LoginTemplate;
use crate::visitors::Visitor;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use secrecy::Secret;
use serde::Deserialize;
use site_core::client::{SiteClient, ViewMode};
use site_core::messages;
use std::time::Duration;
use tower_sessions::Session;
use validator::Validate;

/// How long a handler waits for the session feed to report its own sign-in
/// or sign-out before redirecting.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

fn login_form(client: &SiteClient, error: Option<&'static str>, email: String) -> LoginTemplate {
    LoginTemplate {
        error,
        email,
        admin_email: client.gate.admin_email().as_str().to_string(),
    }
}

/// The login form, reachable even while an anonymous session is active.
pub async fn login_page(visitor: Visitor) -> Response {
    if visitor.mode() == ViewMode::AdminPanel {
        return Redirect::to("/").into_response();
    }
    login_form(&visitor, None, String::new()).into_response()
}

pub async fn login_handler(
    session: Session,
    visitor: Visitor,
    Form(payload): Form<LoginRequest>,
) -> Response {
    if let Err(e) = payload.validate() {
        tracing::debug!(error = %e, "Login form rejected");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            login_form(&visitor, Some(messages::LOGIN_FAILED), payload.email),
        )
            .into_response();
    }

    let password = Secret::new(payload.password);
    match visitor.gate.sign_in(&payload.email, &password).await {
        Ok(signed_in) => {
            // New cookie id for the now privileged visitor.
            if let Err(e) = session.cycle_id().await {
                tracing::warn!(error = %e, "Failed to rotate the session id after sign-in");
            }
            if !visitor
                .gate
                .observed(Some(signed_in.uid()), SETTLE_TIMEOUT)
                .await
            {
                tracing::warn!(uid = %signed_in.uid(), "Session feed did not confirm the sign-in in time");
            }
            Redirect::to("/").into_response()
        }
        Err(e) => (
            StatusCode::UNAUTHORIZED,
            login_form(&visitor, Some(e.localized_message()), payload.email),
        )
            .into_response(),
    }
}

pub async fn logout_handler(visitor: Visitor) -> Redirect {
    // Failures are logged by the gate; the session stays as it was.
    if visitor.gate.sign_out().await.is_ok() && !visitor.gate.observed(None, SETTLE_TIMEOUT).await
    {
        tracing::warn!("Session feed did not confirm the sign-out in time");
    }
    Redirect::to("/")
}
