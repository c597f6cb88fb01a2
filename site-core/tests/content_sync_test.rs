mod common;

use common::*;
use site_core::backend::MemoryContentStore;
use site_core::client::{AuthGate, ContentSync};
use site_core::error::StoreError;
use std::sync::Arc;

fn ids(posts: &[site_core::models::Post]) -> Vec<&str> {
    posts.iter().map(|post| post.id.as_str()).collect()
}

#[tokio::test]
async fn snapshot_is_ordered_newest_first() {
    let content = Arc::new(MemoryContentStore::new());
    let path = posts_path();
    content.put_document(&path, post("a", "First", 1_000));
    content.put_document(&path, post("c", "Third", 3_000));
    content.put_document(&path, post("b", "Second", 2_000));

    let sync = ContentSync::new(content.clone(), path);
    sync.activate();
    let state = wait_posts(&mut sync.watch(), |posts| posts.len() == 3).await;

    assert_eq!(ids(&state.posts), vec!["c", "b", "a"]);
    assert!(state.error.is_none());
    sync.shutdown().await;
}

#[tokio::test]
async fn posts_without_a_timestamp_sort_last() {
    let content = Arc::new(MemoryContentStore::new());
    let path = posts_path();
    let mut pending = post("pending", "Pending", 0);
    pending.created_at = None;
    content.put_document(&path, pending);
    content.put_document(&path, post("dated", "Dated", 5_000));

    let sync = ContentSync::new(content.clone(), path);
    sync.activate();
    let state = wait_posts(&mut sync.watch(), |posts| posts.len() == 2).await;

    assert_eq!(ids(&state.posts), vec!["dated", "pending"]);
    sync.shutdown().await;
}

#[tokio::test]
async fn changes_from_other_clients_replace_the_cache() {
    let content = Arc::new(MemoryContentStore::new());
    let path = posts_path();
    content.put_document(&path, post("a", "First", 1_000));

    let sync = ContentSync::new(content.clone(), path.clone());
    sync.activate();
    let mut rx = sync.watch();
    wait_posts(&mut rx, |posts| posts.len() == 1).await;

    content.put_document(&path, post("b", "Second", 2_000));
    let state = wait_posts(&mut rx, |posts| posts.len() == 2).await;
    assert_eq!(ids(&state.posts), vec!["b", "a"]);

    content.remove_document(&path, "a");
    let state = wait_posts(&mut rx, |posts| posts.len() == 1).await;
    assert_eq!(ids(&state.posts), vec!["b"]);
    assert_eq!(sync.find("b").map(|p| p.title), Some("Second".to_string()));
    assert!(sync.find("a").is_none());
    sync.shutdown().await;
}

#[tokio::test]
async fn activate_is_idempotent() {
    let content = Arc::new(MemoryContentStore::new());
    let path = posts_path();
    let sync = ContentSync::new(content.clone(), path.clone());

    sync.activate();
    sync.activate();
    wait_posts(&mut sync.watch(), |_| true).await;

    assert_eq!(content.listener_count(&path), 1);
    sync.shutdown().await;
    assert_eq!(content.listener_count(&path), 0);
}

#[tokio::test]
async fn deactivation_keeps_the_last_contents_and_ignores_later_pushes() {
    let content = Arc::new(MemoryContentStore::new());
    let path = posts_path();
    content.put_document(&path, post("a", "First", 1_000));

    let sync = ContentSync::new(content.clone(), path.clone());
    sync.activate();
    wait_posts(&mut sync.watch(), |posts| posts.len() == 1).await;

    sync.deactivate().await;
    assert!(!sync.is_active());
    content.put_document(&path, post("b", "Second", 2_000));
    tokio::task::yield_now().await;

    let state = sync.state();
    assert!(!state.active);
    assert_eq!(ids(&state.posts), vec!["a"]);
    assert_eq!(content.listener_count(&path), 0);
}

#[tokio::test]
async fn broken_query_reports_the_error_and_keeps_the_cache() {
    let content = Arc::new(MemoryContentStore::new());
    let path = posts_path();
    content.put_document(&path, post("a", "First", 1_000));

    let sync = ContentSync::new(content.clone(), path.clone());
    sync.activate();
    let mut rx = sync.watch();
    wait_posts(&mut rx, |posts| posts.len() == 1).await;

    content.break_listeners(&path, StoreError::Network("connection reset".to_string()));
    let state = wait_for(&mut rx, |state| state.error.is_some()).await;

    assert!(!state.loading);
    assert_eq!(ids(&state.posts), vec!["a"]);
    assert!(matches!(state.error, Some(StoreError::Network(_))));
    sync.shutdown().await;
}

#[tokio::test]
async fn denied_reads_surface_a_permission_error() {
    let content = Arc::new(MemoryContentStore::new());
    content.deny_reads(true);

    let sync = ContentSync::new(content.clone(), posts_path());
    sync.activate();
    let state = wait_for(&mut sync.watch(), |state| state.error.is_some()).await;

    assert!(matches!(state.error, Some(StoreError::PermissionDenied(_))));
    assert!(state.posts.is_empty());
    sync.shutdown().await;
}

#[tokio::test]
async fn query_follows_the_session() {
    let sessions = session_store();
    let content = Arc::new(MemoryContentStore::new());
    let path = posts_path();
    content.put_document(&path, post("a", "First", 1_000));

    let gate = AuthGate::start(sessions.clone(), admin(), no_bootstrap());
    let sync = ContentSync::new(content.clone(), path.clone());
    sync.follow(gate.watch());

    // No session yet: nothing is read.
    wait_ready(&gate).await;
    tokio::task::yield_now().await;
    assert!(!sync.is_active());
    assert_eq!(content.listener_count(&path), 0);

    gate.sign_in(READER_EMAIL, &secret(READER_PASSWORD)).await.unwrap();
    wait_posts(&mut sync.watch(), |posts| posts.len() == 1).await;
    assert_eq!(content.listener_count(&path), 1);

    gate.sign_out().await.unwrap();
    wait_for(&mut sync.watch(), |state| !state.active).await;
    assert_eq!(content.listener_count(&path), 0);
    assert_eq!(sync.posts().len(), 1);

    sync.shutdown().await;
    gate.shutdown().await;
}

#[tokio::test]
async fn a_different_user_reopens_a_failed_query() {
    let sessions = session_store();
    let content = Arc::new(MemoryContentStore::new());
    let path = posts_path();

    let gate = AuthGate::start(sessions.clone(), admin(), anonymous_bootstrap());
    let sync = ContentSync::new(content.clone(), path.clone());
    sync.follow(gate.watch());

    let mut rx = sync.watch();
    wait_for(&mut rx, |state| state.active && !state.loading).await;
    content.break_listeners(&path, StoreError::PermissionDenied("rules changed".to_string()));
    wait_for(&mut rx, |state| state.error.is_some()).await;

    gate.sign_in(ADMIN_EMAIL, &secret(ADMIN_PASSWORD)).await.unwrap();
    content.put_document(&path, post("a", "First", 1_000));
    let state = wait_posts(&mut rx, |posts| posts.len() == 1).await;

    assert!(state.error.is_none());
    assert_eq!(content.listener_count(&path), 1);
    sync.shutdown().await;
    gate.shutdown().await;
}
