// Simulated delivery: sent -> delivered after 1s, read after 2s.
// These run on tokio's paused clock, so sleeps advance virtual time only.

mod common;
use common::{demo_chat, drain_events, me};

use tokio::time::{sleep, Duration};

use verichat::chat::{ChatStore, ConversationStore, DeliveryTimings};
use verichat::models::DeliveryStatus;
use verichat::StoreEvent;

async fn status_of(chat: &ChatStore, conversation_id: &str, message_id: &str) -> Option<DeliveryStatus> {
    chat.conversation(conversation_id)
        .await
        .and_then(|c| c.message(message_id).map(|m| m.status))
}

fn status_changes(events: Vec<StoreEvent>, id: &str) -> Vec<DeliveryStatus> {
    events
        .into_iter()
        .filter_map(|event| match event {
            StoreEvent::StatusChanged { message_id, status, .. } if message_id == id => Some(status),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_message_is_delivered_then_read() {
    let (chat, mut events) = demo_chat();
    let id = chat.send_message(&me(), "chat-bob", "hello", None).await.unwrap();
    assert_eq!(status_of(&chat, "chat-bob", &id).await, Some(DeliveryStatus::Sent));

    sleep(Duration::from_millis(990)).await;
    assert_eq!(status_of(&chat, "chat-bob", &id).await, Some(DeliveryStatus::Sent));

    sleep(Duration::from_millis(20)).await;
    assert_eq!(status_of(&chat, "chat-bob", &id).await, Some(DeliveryStatus::Delivered));

    sleep(Duration::from_millis(980)).await;
    assert_eq!(status_of(&chat, "chat-bob", &id).await, Some(DeliveryStatus::Delivered));

    sleep(Duration::from_millis(20)).await;
    assert_eq!(status_of(&chat, "chat-bob", &id).await, Some(DeliveryStatus::Read));

    // Every step was observed, in order, with no skip
    assert_eq!(
        status_changes(drain_events(&mut events), &id),
        vec![DeliveryStatus::Delivered, DeliveryStatus::Read]
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_never_moves_after_read() {
    let (chat, mut events) = demo_chat();
    let id = chat.send_message(&me(), "chat-bob", "hello", None).await.unwrap();

    sleep(Duration::from_secs(10)).await;

    assert_eq!(status_of(&chat, "chat-bob", &id).await, Some(DeliveryStatus::Read));
    assert_eq!(status_changes(drain_events(&mut events), &id).len(), 2);
}

/// Each message follows its own schedule; a later send does not drag an
/// earlier one along, and vice versa
#[tokio::test(start_paused = true)]
async fn test_rapid_sends_advance_independently() {
    let (chat, _events) = demo_chat();
    let first = chat.send_message(&me(), "chat-alice", "one", None).await.unwrap();
    sleep(Duration::from_millis(600)).await;
    let second = chat.send_message(&me(), "chat-alice", "two", None).await.unwrap();

    // t = 1100: only the first is delivered
    sleep(Duration::from_millis(500)).await;
    assert_eq!(status_of(&chat, "chat-alice", &first).await, Some(DeliveryStatus::Delivered));
    assert_eq!(status_of(&chat, "chat-alice", &second).await, Some(DeliveryStatus::Sent));

    // t = 1700: second delivered, first not yet read
    sleep(Duration::from_millis(600)).await;
    assert_eq!(status_of(&chat, "chat-alice", &first).await, Some(DeliveryStatus::Delivered));
    assert_eq!(status_of(&chat, "chat-alice", &second).await, Some(DeliveryStatus::Delivered));

    // t = 2100: first read, second still delivered
    sleep(Duration::from_millis(400)).await;
    assert_eq!(status_of(&chat, "chat-alice", &first).await, Some(DeliveryStatus::Read));
    assert_eq!(status_of(&chat, "chat-alice", &second).await, Some(DeliveryStatus::Delivered));

    // t = 2700: both read
    sleep(Duration::from_millis(600)).await;
    assert_eq!(status_of(&chat, "chat-alice", &second).await, Some(DeliveryStatus::Read));
}

/// Older messages that are already delivered are left alone
#[tokio::test(start_paused = true)]
async fn test_seeded_messages_are_not_touched() {
    let (chat, _events) = demo_chat();
    assert_eq!(status_of(&chat, "chat-alice", "9").await, Some(DeliveryStatus::Delivered));

    chat.send_message(&me(), "chat-alice", "any news?", None).await.unwrap();
    sleep(Duration::from_secs(3)).await;

    assert_eq!(status_of(&chat, "chat-alice", "9").await, Some(DeliveryStatus::Delivered));
}

#[tokio::test(start_paused = true)]
async fn test_transition_after_delete_is_ignored() {
    let (chat, mut events) = demo_chat();
    let id = chat.send_message(&me(), "chat-david", "files attached", None).await.unwrap();
    let remaining = chat.conversations().await.len() - 1;

    chat.delete("chat-david").await.unwrap();
    sleep(Duration::from_secs(3)).await;

    assert!(chat.conversation("chat-david").await.is_none());
    assert_eq!(chat.conversations().await.len(), remaining);
    assert!(status_changes(drain_events(&mut events), &id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_between_delivered_and_read() {
    let (chat, mut events) = demo_chat();
    let id = chat.send_message(&me(), "chat-david", "files attached", None).await.unwrap();

    sleep(Duration::from_millis(1500)).await;
    chat.delete("chat-david").await.unwrap();
    sleep(Duration::from_secs(2)).await;

    assert!(chat.conversation("chat-david").await.is_none());
    assert_eq!(
        status_changes(drain_events(&mut events), &id),
        vec![DeliveryStatus::Delivered]
    );
}

#[tokio::test(start_paused = true)]
async fn test_custom_timings() {
    let timings = DeliveryTimings::from_millis(50, 80).unwrap();
    let store = ConversationStore::new(verichat::chat::seed::contacts(), Vec::new());
    let (chat, _events) = ChatStore::new(store, timings);
    let conversation = chat.start_direct(&me(), "bob").await.unwrap();
    let id = chat.send_message(&me(), &conversation, "quick", None).await.unwrap();

    sleep(Duration::from_millis(60)).await;
    assert_eq!(status_of(&chat, &conversation, &id).await, Some(DeliveryStatus::Delivered));
    sleep(Duration::from_millis(30)).await;
    assert_eq!(status_of(&chat, &conversation, &id).await, Some(DeliveryStatus::Read));
}
