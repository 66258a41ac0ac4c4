//! Live list behavior against the in-memory gateway.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use club_client::{
    ClientError, LiveList, LiveSnapshot, LiveStatus, MemoryGateway, MAX_MESSAGE_CHARS,
};
use club_engine::{
    ChangeEvent, ChatMessage, ClubEvent, LiveRecord, ProfileSummary, ReactionPolicy,
    Registration, RegistrationStatus, ScopeKey, Table,
};
use tokio::time::timeout;

// 2026-10-01T00:00:00Z
const OCT_2026: i64 = 1_790_812_800_000;

fn msg(id: &str, room: &str, created_at: i64) -> ChatMessage {
    ChatMessage::new(id, room, "ada", format!("text of {id}"), created_at)
}

fn waitlisted(id: &str, profile: &str, created_at: i64) -> Registration {
    let mut registration = Registration::new(id, "e1", profile, created_at);
    registration.status = RegistrationStatus::Waitlisted;
    registration
}

async fn wait_for<R: LiveRecord>(
    list: &mut LiveList<R>,
    predicate: impl FnMut(&LiveSnapshot<R>) -> bool,
) -> LiveSnapshot<R> {
    timeout(Duration::from_secs(5), list.wait_until(predicate))
        .await
        .expect("timed out waiting for live list")
        .expect("live list closed")
}

async fn live<R: LiveRecord>(list: &mut LiveList<R>) -> LiveSnapshot<R> {
    wait_for(list, |s| s.status == LiveStatus::Live).await
}

fn room(gateway: &Arc<MemoryGateway>, room_id: &str) -> LiveList<ChatMessage> {
    LiveList::mount(gateway.clone(), ScopeKey::room(room_id))
}

// ============================================================================
// Reconciliation through the subscription
// ============================================================================

#[tokio::test]
async fn insert_duplicate_then_new() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    assert!(live(&mut list).await.collection.is_empty());

    let event = gateway.insert(msg("m1", "general", 1)).await.unwrap();
    wait_for(&mut list, |s| s.collection.ids() == vec!["m1"]).await;

    // Redelivery of the same insert
    gateway.emit(event).await;
    gateway.insert(msg("m2", "general", 2)).await;

    let snapshot = wait_for(&mut list, |s| s.collection.contains("m2")).await;
    assert_eq!(snapshot.collection.ids(), vec!["m1", "m2"]);
}

#[tokio::test]
async fn snapshot_is_chronological_and_inserts_append() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(msg("m3", "general", 30)).await;
    gateway.seed(msg("m1", "general", 10)).await;
    gateway.seed(msg("m2", "general", 20)).await;

    let mut list = room(&gateway, "general");
    let snapshot = live(&mut list).await;
    assert_eq!(snapshot.collection.ids(), vec!["m1", "m2", "m3"]);

    // Older timestamp, newer arrival: appended, not re-sorted
    gateway.insert(msg("m0", "general", 0)).await;
    let snapshot = wait_for(&mut list, |s| s.collection.contains("m0")).await;
    assert_eq!(snapshot.collection.ids(), vec!["m1", "m2", "m3", "m0"]);
}

#[tokio::test]
async fn enrichment_resolution_order_decides_append_order() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(msg("m1", "general", 1)).await;

    let mut list = room(&gateway, "general");
    live(&mut list).await;

    let mut m2_gate = gateway.hold("m2").await;
    let mut m3_gate = gateway.hold("m3").await;
    gateway.insert(msg("m2", "general", 2)).await;
    gateway.insert(msg("m3", "general", 3)).await;
    m2_gate.entered().await;
    m3_gate.entered().await;

    m3_gate.release();
    wait_for(&mut list, |s| s.collection.contains("m3")).await;
    m2_gate.release();
    let snapshot = wait_for(&mut list, |s| s.collection.contains("m2")).await;

    assert_eq!(snapshot.collection.ids(), vec!["m1", "m3", "m2"]);
}

#[tokio::test]
async fn unmount_during_enrichment_discards_result() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    let mut gate = gateway.hold("m2").await;
    gateway.insert(msg("m2", "general", 2)).await;
    gate.entered().await;

    list.close().await;
    assert_eq!(list.status(), LiveStatus::Closed);
    assert_eq!(gateway.open_channels().await, 0);

    gate.release();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(gateway.enrich_calls.load(Ordering::Relaxed), 1);
    assert!(list.collection().is_empty());
    assert_eq!(list.status(), LiveStatus::Closed);
}

#[tokio::test]
async fn enrichment_failure_drops_the_event() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    gateway.fail_enrichment("m1").await;
    gateway.insert(msg("m1", "general", 1)).await;
    gateway.insert(msg("m2", "general", 2)).await;

    let snapshot = wait_for(&mut list, |s| s.collection.contains("m2")).await;
    assert_eq!(snapshot.collection.ids(), vec!["m2"]);
    assert_eq!(snapshot.status, LiveStatus::Live);
}

// ============================================================================
// Channel lifecycle
// ============================================================================

#[tokio::test]
async fn close_twice_is_harmless() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    list.close().await;
    list.close().await;

    assert_eq!(gateway.unsubscribe_calls.load(Ordering::Relaxed), 1);
    assert!(list.is_closed());
    wait_for(&mut list, |s| s.status == LiveStatus::Closed).await;
    assert!(matches!(list.changed().await, Err(ClientError::Closed)));
    assert!(matches!(list.reload(), Err(ClientError::Closed)));
}

#[tokio::test]
async fn dropping_the_list_unmounts() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    live(&mut list).await;
    assert_eq!(gateway.open_channels().await, 1);

    drop(list);

    timeout(Duration::from_secs(5), async {
        while gateway.open_channels().await > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("channel was not closed");
}

#[tokio::test]
async fn events_before_acknowledgement_are_dropped() {
    let gateway = Arc::new(MemoryGateway::new().without_auto_ack());
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    gateway.insert(msg("m1", "general", 1)).await;
    gateway.acknowledge_all().await;
    gateway.insert(msg("m2", "general", 2)).await;

    let snapshot = wait_for(&mut list, |s| s.collection.contains("m2")).await;
    assert_eq!(snapshot.collection.ids(), vec!["m2"]);
    assert_eq!(gateway.enrich_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn transport_error_keeps_collection() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(msg("m1", "general", 1)).await;
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    gateway.break_channels("socket reset").await;

    let snapshot = wait_for(&mut list, |s| {
        matches!(s.status, LiveStatus::ConnectivityWarning(_))
    })
    .await;
    assert_eq!(
        snapshot.status,
        LiveStatus::ConnectivityWarning("socket reset".into())
    );
    assert_eq!(snapshot.collection.ids(), vec!["m1"]);
}

#[tokio::test]
async fn reload_after_transport_error_resubscribes() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    gateway.break_channels("socket reset").await;
    wait_for(&mut list, |s| {
        matches!(s.status, LiveStatus::ConnectivityWarning(_))
    })
    .await;

    list.reload().unwrap();
    live(&mut list).await;
    assert_eq!(gateway.subscribe_calls.load(Ordering::Relaxed), 2);
    assert_eq!(gateway.unsubscribe_calls.load(Ordering::Relaxed), 1);
    assert_eq!(gateway.open_channels().await, 1);

    gateway.insert(msg("m2", "general", 2)).await;
    let snapshot = wait_for(&mut list, |s| s.collection.contains("m2")).await;
    assert_eq!(snapshot.collection.ids(), vec!["m2"]);
}

#[tokio::test]
async fn lost_connection_warns_until_reload() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(msg("m1", "general", 1)).await;
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    gateway.drop_channels().await;
    let snapshot = wait_for(&mut list, |s| {
        matches!(s.status, LiveStatus::ConnectivityWarning(_))
    })
    .await;
    assert_eq!(
        snapshot.status,
        LiveStatus::ConnectivityWarning("realtime connection lost".into())
    );
    assert_eq!(snapshot.collection.ids(), vec!["m1"]);

    // Nothing is delivered while the channel is gone
    gateway.insert(msg("m2", "general", 2)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!list.collection().contains("m2"));

    list.reload().unwrap();
    let snapshot = live(&mut list).await;
    assert_eq!(snapshot.collection.ids(), vec!["m1", "m2"]);
    assert_eq!(gateway.subscribe_calls.load(Ordering::Relaxed), 2);

    gateway.insert(msg("m3", "general", 3)).await;
    let snapshot = wait_for(&mut list, |s| s.collection.contains("m3")).await;
    assert_eq!(snapshot.collection.ids(), vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn server_closed_channel_warns() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(msg("m1", "general", 1)).await;
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    gateway.close_channels().await;
    let snapshot = wait_for(&mut list, |s| {
        matches!(s.status, LiveStatus::ConnectivityWarning(_))
    })
    .await;
    assert_eq!(
        snapshot.status,
        LiveStatus::ConnectivityWarning("channel closed by server".into())
    );
    assert_eq!(snapshot.collection.ids(), vec!["m1"]);

    // The server already dropped the channel; reload only opens a new one
    list.reload().unwrap();
    live(&mut list).await;
    assert_eq!(gateway.subscribe_calls.load(Ordering::Relaxed), 2);
    assert_eq!(gateway.unsubscribe_calls.load(Ordering::Relaxed), 0);
    assert_eq!(gateway.open_channels().await, 1);
}

#[tokio::test]
async fn scopes_are_isolated() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut general = room(&gateway, "general");
    let mut random = room(&gateway, "random");
    live(&mut general).await;
    live(&mut random).await;

    gateway.insert(msg("m1", "general", 1)).await;
    gateway.insert(msg("x1", "random", 2)).await;

    let general_now = wait_for(&mut general, |s| s.collection.contains("m1")).await;
    let random_now = wait_for(&mut random, |s| s.collection.contains("x1")).await;

    assert_eq!(general_now.collection.ids(), vec!["m1"]);
    assert_eq!(random_now.collection.ids(), vec!["x1"]);
}

#[tokio::test]
async fn misrouted_event_is_not_merged() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    // Stored under another room but announced to this one
    gateway.seed(msg("x1", "random", 1)).await;
    gateway
        .emit(ChangeEvent::insert(
            Table::ChatMessages,
            "x1",
            ScopeKey::room("general"),
        ))
        .await;
    gateway.insert(msg("m1", "general", 2)).await;

    let snapshot = wait_for(&mut list, |s| s.collection.contains("m1")).await;
    assert_eq!(snapshot.collection.ids(), vec!["m1"]);
}

#[tokio::test]
async fn set_scope_remounts() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(msg("m1", "general", 1)).await;
    gateway.seed(msg("x1", "random", 1)).await;

    let mut list = room(&gateway, "general");
    live(&mut list).await;

    list.set_scope(ScopeKey::room("random")).unwrap();
    let snapshot = wait_for(&mut list, |s| {
        s.scope == ScopeKey::room("random") && s.status == LiveStatus::Live
    })
    .await;
    assert_eq!(snapshot.collection.ids(), vec!["x1"]);
    assert_eq!(gateway.unsubscribe_calls.load(Ordering::Relaxed), 1);
    assert_eq!(gateway.open_channels().await, 1);

    gateway.insert(msg("m2", "general", 2)).await;
    gateway.insert(msg("x2", "random", 2)).await;
    let snapshot = wait_for(&mut list, |s| s.collection.contains("x2")).await;
    assert_eq!(snapshot.collection.ids(), vec!["x1", "x2"]);

    // Same scope again is a no-op
    list.set_scope(ScopeKey::room("random")).unwrap();
    assert_eq!(gateway.subscribe_calls.load(Ordering::Relaxed), 2);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn load_failure_leaves_empty_collection() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(msg("m1", "general", 1)).await;
    gateway.fail_next_fetch("database unavailable").await;

    let mut list = room(&gateway, "general");
    let snapshot = wait_for(&mut list, |s| s.status.is_settled()).await;

    assert!(matches!(snapshot.status, LiveStatus::LoadFailed(ref r) if r.contains("database unavailable")));
    assert!(snapshot.collection.is_empty());
    assert_eq!(gateway.subscribe_calls.load(Ordering::Relaxed), 0);

    // User-driven retry
    list.reload().unwrap();
    let snapshot = live(&mut list).await;
    assert_eq!(snapshot.collection.ids(), vec!["m1"]);
    assert_eq!(gateway.subscribe_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn invalid_scope_mounts_empty() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "");

    let snapshot = live(&mut list).await;
    assert!(snapshot.collection.is_empty());
    assert_eq!(gateway.fetch_calls.load(Ordering::Relaxed), 0);
    assert_eq!(gateway.subscribe_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn mutation_failure_leaves_collection_unchanged() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(msg("m1", "general", 1)).await;
    let mut list = room(&gateway, "general");
    let before = live(&mut list).await;

    gateway.fail_next_mutation("write rejected").await;
    let err = list.send_message("hello").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::MutationFailed { action: "send_message", .. }
    ));
    assert!(list.collection().ptr_eq(&before.collection));
    assert_eq!(gateway.row_count(Table::ChatMessages).await, 1);
}

// ============================================================================
// Actions
// ============================================================================

#[tokio::test]
async fn sent_message_arrives_through_subscription() {
    let gateway = Arc::new(MemoryGateway::new().acting_as("ada"));
    gateway
        .add_profile("ada", ProfileSummary::new("Ada Lovelace"))
        .await;
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    let receipt = list.send_message("  Pitch practice at 6?  ").await.unwrap();

    let snapshot = wait_for(&mut list, |s| s.collection.contains(&receipt.record_id)).await;
    let message = snapshot.collection.get(&receipt.record_id).unwrap();
    assert_eq!(message.content, "Pitch practice at 6?");
    assert_eq!(message.sender_id, "ada");
    assert_eq!(
        message.sender.as_ref().map(|s| s.display_name.as_str()),
        Some("Ada Lovelace")
    );
}

#[tokio::test]
async fn message_validation_happens_before_the_gateway() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    live(&mut list).await;

    let err = list.send_message("   ").await.unwrap_err();
    assert!(err.to_string().contains("empty"));

    let too_long = "x".repeat(MAX_MESSAGE_CHARS + 1);
    let err = list.send_message(&too_long).await.unwrap_err();
    assert!(matches!(err, ClientError::MutationFailed { .. }));

    let exactly = "é".repeat(MAX_MESSAGE_CHARS);
    list.send_message(&exactly).await.unwrap();

    assert_eq!(gateway.row_count(Table::ChatMessages).await, 1);
}

#[tokio::test]
async fn registration_list_follows_register_and_cancel() {
    let gateway = Arc::new(MemoryGateway::new().acting_as("ada"));
    gateway.seed(ClubEvent::new("e1", "Demo night", OCT_2026, 0)).await;
    gateway.seed(Registration::new("r0", "e1", "bob", 1)).await;

    let mut list: LiveList<Registration> = LiveList::mount_with_policy(
        gateway.clone(),
        ScopeKey::event("e1"),
        ReactionPolicy::AllChanges,
    );
    live(&mut list).await;

    let receipt = list.register().await.unwrap();
    let snapshot = wait_for(&mut list, |s| s.collection.contains(&receipt.record_id)).await;
    assert_eq!(snapshot.collection.len(), 2);

    list.cancel().await.unwrap();
    let snapshot = wait_for(&mut list, |s| !s.collection.contains(&receipt.record_id)).await;
    assert_eq!(snapshot.collection.ids(), vec!["r0"]);
}

#[tokio::test]
async fn inserts_only_ignores_cancellations() {
    let gateway = Arc::new(MemoryGateway::new().acting_as("ada"));
    gateway.seed(ClubEvent::new("e1", "Demo night", OCT_2026, 0)).await;
    gateway.seed(Registration::new("r1", "e1", "ada", 1)).await;

    let mut list: LiveList<Registration> = LiveList::mount(gateway.clone(), ScopeKey::event("e1"));
    live(&mut list).await;

    list.cancel().await.unwrap();
    // A later insert proves the delete was processed first
    gateway.insert(Registration::new("r2", "e1", "bob", 2)).await;

    let snapshot = wait_for(&mut list, |s| s.collection.contains("r2")).await;
    assert_eq!(snapshot.collection.ids(), vec!["r1", "r2"]);
}

#[tokio::test]
async fn full_event_waitlists() {
    let gateway = Arc::new(MemoryGateway::new().acting_as("ada"));
    let mut event = ClubEvent::new("e1", "Founder fireside", OCT_2026, 0);
    event.capacity = Some(1);
    gateway.seed(event).await;
    gateway.seed(Registration::new("r0", "e1", "bob", 1)).await;

    let mut list: LiveList<Registration> = LiveList::mount(gateway.clone(), ScopeKey::event("e1"));
    live(&mut list).await;

    let receipt = list.register().await.unwrap();
    let snapshot = wait_for(&mut list, |s| s.collection.contains(&receipt.record_id)).await;
    let mine = snapshot.collection.get(&receipt.record_id).unwrap();
    assert_eq!(mine.status, RegistrationStatus::Waitlisted);

    let err = list.register().await.unwrap_err();
    assert!(matches!(err, ClientError::MutationFailed { action: "register", .. }));
}

#[tokio::test]
async fn promotion_updates_in_place() {
    let gateway = Arc::new(MemoryGateway::new().acting_as("ada"));
    let mut event = ClubEvent::new("e1", "Investor panel", OCT_2026, 0);
    event.capacity = Some(2);
    gateway.seed(event).await;
    gateway.seed(Registration::new("r1", "e1", "bob", 1)).await;
    gateway.seed(Registration::new("r2", "e1", "ada", 2)).await;
    gateway.seed(waitlisted("r3", "cy", 3)).await;
    gateway.seed(waitlisted("r4", "dan", 4)).await;

    let mut list: LiveList<Registration> = LiveList::mount_with_policy(
        gateway.clone(),
        ScopeKey::event("e1"),
        ReactionPolicy::AllChanges,
    );
    let before = live(&mut list).await;
    assert_eq!(before.collection.ids(), vec!["r1", "r2", "r3", "r4"]);

    list.cancel().await.unwrap();
    let snapshot = wait_for(&mut list, |s| {
        s.collection
            .get("r3")
            .is_some_and(|r| r.status == RegistrationStatus::Registered)
    })
    .await;

    assert_eq!(snapshot.collection.ids(), vec!["r1", "r3", "r4"]);
    assert_eq!(
        snapshot.collection.get("r4").map(|r| r.status),
        Some(RegistrationStatus::Waitlisted)
    );
}

#[tokio::test]
async fn inserts_only_ignores_promotions() {
    let gateway = Arc::new(MemoryGateway::new().acting_as("ada"));
    let mut event = ClubEvent::new("e1", "Investor panel", OCT_2026, 0);
    event.capacity = Some(1);
    gateway.seed(event).await;
    gateway.seed(Registration::new("r1", "e1", "ada", 1)).await;
    gateway.seed(waitlisted("r2", "bob", 2)).await;

    let mut list: LiveList<Registration> = LiveList::mount(gateway.clone(), ScopeKey::event("e1"));
    live(&mut list).await;

    list.cancel().await.unwrap();
    gateway.insert(Registration::new("r3", "e1", "cy", 3)).await;

    let snapshot = wait_for(&mut list, |s| s.collection.contains("r3")).await;
    assert_eq!(snapshot.collection.ids(), vec!["r1", "r2", "r3"]);
    assert_eq!(
        snapshot.collection.get("r2").map(|r| r.status),
        Some(RegistrationStatus::Waitlisted)
    );
    // Only the insert was fetched
    assert_eq!(gateway.enrich_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn calendar_rsvp_does_not_touch_the_calendar() {
    let gateway = Arc::new(MemoryGateway::new().acting_as("ada"));
    gateway.seed(ClubEvent::new("e1", "Demo night", OCT_2026, 0)).await;

    let mut calendar: LiveList<ClubEvent> =
        LiveList::mount(gateway.clone(), ScopeKey::month(2026, 10));
    let before = live(&mut calendar).await;
    assert_eq!(before.collection.ids(), vec!["e1"]);

    calendar.register("e1").await.unwrap();
    assert_eq!(gateway.row_count(Table::Registrations).await, 1);
    assert!(calendar.collection().ptr_eq(&before.collection));

    let err = calendar.cancel("e2").await.unwrap_err();
    assert!(matches!(err, ClientError::MutationFailed { action: "cancel", .. }));
}

#[tokio::test]
async fn actions_fail_after_close() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut list = room(&gateway, "general");
    live(&mut list).await;
    list.close().await;

    let err = list.send_message("hello").await.unwrap_err();
    assert!(matches!(err, ClientError::Closed));
}
