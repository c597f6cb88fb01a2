mod common;

use common::*;
use site_core::backend::{MemorySessionStore, SessionStore};
use site_core::client::{AuthGate, GateOptions, ViewMode};
use site_core::error::AuthError;
use site_core::messages;
use site_core::models::AdminEmail;
use std::sync::Arc;

#[tokio::test]
async fn gate_is_loading_until_the_first_notification() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), no_bootstrap());

    // The listener has not run yet on the current-thread test runtime.
    assert_eq!(gate.mode(), ViewMode::Loading);
    assert!(!gate.is_admin());

    wait_ready(&gate).await;
    assert_eq!(gate.mode(), ViewMode::LoginForm);
    gate.shutdown().await;
}

#[tokio::test]
async fn fresh_visitor_is_signed_in_anonymously_once() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), anonymous_bootstrap());

    let state = wait_signed_in(&gate).await;
    let session = state.session().expect("session");
    assert!(session.is_anonymous());
    assert_eq!(gate.mode(), ViewMode::PublicSite);
    assert_eq!(store.anonymous_sign_ins(), 1);

    // A later sign-out does not trigger another automatic sign-in.
    gate.sign_out().await.unwrap();
    wait_signed_out(&gate).await;
    assert_eq!(gate.mode(), ViewMode::LoginForm);
    assert_eq!(store.anonymous_sign_ins(), 1);
    gate.shutdown().await;
}

#[tokio::test]
async fn restored_admin_session_skips_anonymous_sign_in() {
    let store = Arc::new(MemorySessionStore::with_restored_session(
        ADMIN_EMAIL,
        secret(ADMIN_PASSWORD),
    ));
    let gate = AuthGate::start(store.clone(), admin(), anonymous_bootstrap());

    wait_signed_in(&gate).await;
    assert_eq!(gate.mode(), ViewMode::AdminPanel);
    assert!(gate.is_admin());

    // Give the listener a chance to act on anything it still holds.
    tokio::task::yield_now().await;
    assert_eq!(store.anonymous_sign_ins(), 0);
    gate.shutdown().await;
}

#[tokio::test]
async fn failed_anonymous_sign_in_leaves_the_login_form() {
    let store = session_store();
    store.fail_anonymous_sign_in(true);
    let gate = AuthGate::start(store.clone(), admin(), anonymous_bootstrap());

    wait_ready(&gate).await;
    eventually(|| store.anonymous_sign_ins() == 1).await;
    assert_eq!(gate.mode(), ViewMode::LoginForm);
    gate.shutdown().await;
}

#[tokio::test]
async fn admin_credentials_open_the_admin_panel() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), anonymous_bootstrap());
    wait_signed_in(&gate).await;
    assert_eq!(gate.mode(), ViewMode::PublicSite);

    let session = gate
        .sign_in(ADMIN_EMAIL, &secret(ADMIN_PASSWORD))
        .await
        .expect("admin sign-in");
    assert_eq!(session.email(), Some(ADMIN_EMAIL));

    wait_for(&mut gate.watch(), |state| {
        state.session().is_some_and(|s| !s.is_anonymous())
    })
    .await;
    assert_eq!(gate.mode(), ViewMode::AdminPanel);
    gate.shutdown().await;
}

#[tokio::test]
async fn other_credentialed_users_see_the_public_site() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), no_bootstrap());
    wait_ready(&gate).await;

    gate.sign_in(READER_EMAIL, &secret(READER_PASSWORD))
        .await
        .expect("reader sign-in");
    wait_signed_in(&gate).await;

    assert_eq!(gate.mode(), ViewMode::PublicSite);
    assert!(!gate.is_admin());
    gate.shutdown().await;
}

#[tokio::test]
async fn rejected_credentials_leave_the_state_unchanged() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), no_bootstrap());
    wait_ready(&gate).await;
    let before = gate.state();

    let err = gate
        .sign_in(ADMIN_EMAIL, &secret("wrong"))
        .await
        .expect_err("wrong password");
    assert_eq!(err, AuthError::InvalidCredential);
    assert_eq!(err.localized_message(), messages::LOGIN_FAILED);

    tokio::task::yield_now().await;
    assert_eq!(gate.state(), before);
    assert_eq!(gate.mode(), ViewMode::LoginForm);
    gate.shutdown().await;
}

#[tokio::test]
async fn unreachable_provider_reports_a_network_error() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), no_bootstrap());
    wait_ready(&gate).await;
    store.set_offline(true);

    let err = gate
        .sign_in(ADMIN_EMAIL, &secret(ADMIN_PASSWORD))
        .await
        .expect_err("offline");
    assert!(matches!(err, AuthError::Network(_)));
    assert_eq!(err.localized_message(), messages::LOGIN_UNAVAILABLE);

    // Sign-out failures are reported and the session is kept.
    store.set_offline(false);
    gate.sign_in(ADMIN_EMAIL, &secret(ADMIN_PASSWORD)).await.unwrap();
    wait_signed_in(&gate).await;
    store.set_offline(true);
    assert!(gate.sign_out().await.is_err());
    assert_eq!(gate.mode(), ViewMode::AdminPanel);
    gate.shutdown().await;
}

#[tokio::test]
async fn externally_ended_session_returns_to_login() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), no_bootstrap());
    wait_ready(&gate).await;
    gate.sign_in(ADMIN_EMAIL, &secret(ADMIN_PASSWORD)).await.unwrap();
    wait_signed_in(&gate).await;

    // Expiry or a sign-out elsewhere reaches the gate only through the feed.
    store.sign_out().await.unwrap();
    wait_signed_out(&gate).await;
    assert_eq!(gate.mode(), ViewMode::LoginForm);
    assert!(!gate.is_admin());
    gate.shutdown().await;
}

#[tokio::test]
async fn admin_email_comparison_ignores_case_and_whitespace() {
    let store = session_store();
    let admin = AdminEmail::parse("  ADMIN@X.com ").unwrap();
    let gate = AuthGate::start(store.clone(), admin, no_bootstrap());
    wait_ready(&gate).await;

    gate.sign_in(ADMIN_EMAIL, &secret(ADMIN_PASSWORD)).await.unwrap();
    wait_signed_in(&gate).await;
    assert_eq!(gate.mode(), ViewMode::AdminPanel);
    gate.shutdown().await;
}

#[tokio::test]
async fn initial_token_is_redeemed_before_anonymous_sign_in() {
    let store = session_store();
    store.issue_custom_token("startup-token", ADMIN_EMAIL);
    let options = GateOptions {
        auto_anonymous: true,
        initial_token: Some(secret("startup-token")),
    };
    let gate = AuthGate::start(store.clone(), admin(), options);

    wait_signed_in(&gate).await;
    assert_eq!(gate.mode(), ViewMode::AdminPanel);
    assert_eq!(store.anonymous_sign_ins(), 0);
    gate.shutdown().await;
}

#[tokio::test]
async fn rejected_initial_token_falls_back_to_anonymous() {
    let store = session_store();
    let options = GateOptions {
        auto_anonymous: true,
        initial_token: Some(secret("unknown-token")),
    };
    let gate = AuthGate::start(store.clone(), admin(), options);

    let state = wait_signed_in(&gate).await;
    assert!(state.session().unwrap().is_anonymous());
    assert_eq!(store.anonymous_sign_ins(), 1);
    gate.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_the_session_subscription() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), no_bootstrap());
    wait_ready(&gate).await;
    assert_eq!(store.subscriber_count(), 1);

    gate.shutdown().await;
    assert_eq!(store.subscriber_count(), 0);

    // Transitions after shutdown are not observed.
    store
        .sign_in_with_credential(ADMIN_EMAIL, &secret(ADMIN_PASSWORD))
        .await
        .unwrap();
    tokio::task::yield_now().await;
    assert_eq!(gate.mode(), ViewMode::LoginForm);
}

#[tokio::test]
async fn gate_settles_once_the_anonymous_session_is_delivered() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), anonymous_bootstrap());

    assert!(gate.settled(std::time::Duration::from_secs(2)).await);
    assert_eq!(gate.mode(), ViewMode::PublicSite);
    assert_eq!(store.anonymous_sign_ins(), 1);
    gate.shutdown().await;
}

#[tokio::test]
async fn gate_settles_on_the_login_form_when_anonymous_sign_in_fails() {
    let store = session_store();
    store.fail_anonymous_sign_in(true);
    let gate = AuthGate::start(store.clone(), admin(), anonymous_bootstrap());

    assert!(gate.settled(std::time::Duration::from_secs(2)).await);
    assert_eq!(gate.mode(), ViewMode::LoginForm);
    gate.shutdown().await;
}

#[tokio::test]
async fn settled_gives_up_after_the_limit() {
    let store = session_store();
    let gate = AuthGate::start(store.clone(), admin(), no_bootstrap());

    // Still Loading: the listener has not run on the current-thread runtime.
    assert!(!gate.settled(std::time::Duration::ZERO).await);
    gate.shutdown().await;
}
