//! Tests for `TaskStore` state-machine enforcement.
//!
//! These exercise the store directly: transition rules, terminal-state
//! rejection, monotonic progress, and newest-first listing.

use assert_matches::assert_matches;

use mealscan_core::estimation::EstimationResult;
use mealscan_core::task::TaskStatus;
use mealscan_core::upload::ImageUpload;
use mealscan_store::{StoreError, TaskStore};

fn upload(name: &str) -> ImageUpload {
    ImageUpload {
        filename: Some(name.to_string()),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF],
    }
}

fn result() -> EstimationResult {
    EstimationResult::from_raw(serde_json::json!({
        "foods": [{
            "food_name": "bibimbap",
            "estimated_mass_g": 420.0,
            "confidence": 0.88,
            "verification_method": "reference_object"
        }]
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Test: create() stores a pending record that get() can read back
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_stores_pending_record() {
    let store = TaskStore::new();

    let task = store.create(upload("lunch.jpg")).await;

    let fetched = store.get(task.id).await.unwrap();
    assert_eq!(fetched.status, TaskStatus::Pending);
    assert_eq!(fetched.progress, 0.0);
    assert_eq!(fetched.original_filename.as_deref(), Some("lunch.jpg"));
}

// ---------------------------------------------------------------------------
// Test: get() on an unknown id is NotFound, never a placeholder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let store = TaskStore::new();

    let missing = uuid::Uuid::new_v4();
    assert_matches!(store.get(missing).await, Err(StoreError::NotFound(id)) if id == missing);
    assert_eq!(store.count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: the happy path walks pending -> processing -> completed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_reaches_completed() {
    let store = TaskStore::new();
    let task = store.create(upload("meal.png")).await;

    let snap = store
        .mark_processing(task.id, 0.1, "Uploading image")
        .await
        .unwrap()
        .expect("transition should apply");
    assert_eq!(snap.status, TaskStatus::Processing);
    assert_eq!(snap.progress, 0.1);

    let snap = store
        .update_progress(task.id, 0.5, "Analyzing")
        .await
        .unwrap()
        .expect("progress should apply");
    assert_eq!(snap.progress, 0.5);

    let snap = store
        .mark_completed(task.id, result())
        .await
        .unwrap()
        .expect("completion should apply");
    assert_eq!(snap.status, TaskStatus::Completed);
    assert_eq!(snap.progress, 1.0);
    assert!(snap.result.is_some());
    assert!(snap.completed_at.is_some());
    assert!(snap.error.is_none());
}

// ---------------------------------------------------------------------------
// Test: terminal states reject every further transition unchanged
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_state_rejects_further_transitions() {
    let store = TaskStore::new();
    let task = store.create(upload("meal.png")).await;

    store.mark_processing(task.id, 0.1, "start").await.unwrap();
    store.mark_completed(task.id, result()).await.unwrap();

    // Every subsequent transition is a rejected no-op.
    assert!(store
        .mark_processing(task.id, 0.2, "again")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .update_progress(task.id, 0.9, "late")
        .await
        .unwrap()
        .is_none());
    assert!(store.mark_failed(task.id, "too late").await.unwrap().is_none());

    // Observable state is unchanged.
    let snap = store.get(task.id).await.unwrap();
    assert_eq!(snap.status, TaskStatus::Completed);
    assert_eq!(snap.progress, 1.0);
    assert!(snap.error.is_none());
}

// ---------------------------------------------------------------------------
// Test: progress never decreases while processing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_is_non_decreasing() {
    let store = TaskStore::new();
    let task = store.create(upload("meal.png")).await;
    store.mark_processing(task.id, 0.3, "start").await.unwrap();

    // A stale lower fraction keeps the previous value but still updates
    // the message.
    let snap = store
        .update_progress(task.id, 0.1, "stale checkpoint")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snap.progress, 0.3);
    assert_eq!(snap.message, "stale checkpoint");

    let snap = store
        .update_progress(task.id, 0.8, "ahead")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snap.progress, 0.8);
}

// ---------------------------------------------------------------------------
// Test: update_progress is rejected before mark_processing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_rejected_while_pending() {
    let store = TaskStore::new();
    let task = store.create(upload("meal.png")).await;

    assert!(store
        .update_progress(task.id, 0.5, "early")
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.get(task.id).await.unwrap().progress, 0.0);
}

// ---------------------------------------------------------------------------
// Test: a failed task retains its last-known progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_task_retains_progress() {
    let store = TaskStore::new();
    let task = store.create(upload("meal.png")).await;
    store.mark_processing(task.id, 0.1, "start").await.unwrap();
    store.update_progress(task.id, 0.6, "mid").await.unwrap();

    let snap = store
        .mark_failed(task.id, "estimation service timed out")
        .await
        .unwrap()
        .expect("failure should apply");
    assert_eq!(snap.status, TaskStatus::Failed);
    assert_eq!(snap.progress, 0.6);
    assert_eq!(snap.error.as_deref(), Some("estimation service timed out"));
    assert!(snap.result.is_none());
}

// ---------------------------------------------------------------------------
// Test: a pending task can fail directly (worker died before processing)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pending_task_can_fail_directly() {
    let store = TaskStore::new();
    let task = store.create(upload("meal.png")).await;

    let snap = store
        .mark_failed(task.id, "submission failed")
        .await
        .unwrap()
        .expect("pending -> failed should apply");
    assert_eq!(snap.status, TaskStatus::Failed);
}

// ---------------------------------------------------------------------------
// Test: take_image hands the upload over exactly once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn take_image_is_exclusive() {
    let store = TaskStore::new();
    let task = store.create(upload("meal.jpg")).await;

    let first = store.take_image(task.id).await.unwrap();
    assert!(first.is_some());

    let second = store.take_image(task.id).await.unwrap();
    assert!(second.is_none());
}

// ---------------------------------------------------------------------------
// Test: list_recent returns newest first, bounded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_recent_is_newest_first_and_bounded() {
    let store = TaskStore::new();

    let t1 = store.create(upload("a.jpg")).await;
    let t2 = store.create(upload("b.jpg")).await;
    let t3 = store.create(upload("c.jpg")).await;

    let recent = store.list_recent(2).await;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, t3.id);
    assert_eq!(recent[1].id, t2.id);

    let all = store.list_recent(10).await;
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].id, t1.id);
}
