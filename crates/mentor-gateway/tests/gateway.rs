/// Gateway dispatch tests: drive `handle_frame` directly with probe
/// connections registered in a real registry and an in-memory fake store.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;

use mentor_gateway::dispatch::handle_frame;
use mentor_gateway::registry::Registry;
use mentor_store::models::{MessageRow, NewMessage};
use mentor_store::{RecordStore, StoreError};
use mentor_types::models::ReactionEntry;

#[derive(Default)]
struct FakeStore {
    messages: Mutex<HashMap<String, MessageRow>>,
    fail_inserts: bool,
    fail_updates: bool,
}

impl FakeStore {
    fn with_message(id: &str) -> Self {
        let store = Self::default();
        store.messages.lock().unwrap().insert(
            id.to_owned(),
            MessageRow {
                id: id.to_owned(),
                chat_id: "c1".into(),
                author_id: "u1".into(),
                content: "hello".into(),
                status: "sent".into(),
                reactions: Vec::new(),
                created_at: "2026-01-01 00:00:00".into(),
            },
        );
        store
    }

    fn reactions(&self, id: &str) -> Vec<ReactionEntry> {
        self.messages.lock().unwrap()[id].reactions.clone()
    }

    fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl RecordStore for FakeStore {
    fn insert_message(&self, message: NewMessage) -> Result<(), StoreError> {
        if self.fail_inserts {
            return Err(StoreError::Backend(anyhow!("insert refused")));
        }
        let row = MessageRow {
            id: message.id.clone(),
            chat_id: message.chat_id.unwrap_or_default(),
            author_id: message.author_id.unwrap_or_default(),
            content: message.content.unwrap_or_default(),
            status: message.status.as_str().to_owned(),
            reactions: Vec::new(),
            created_at: "2026-01-01 00:00:00".into(),
        };
        self.messages.lock().unwrap().insert(message.id, row);
        Ok(())
    }

    fn message_by_id(&self, id: &str) -> Result<MessageRow, StoreError> {
        self.messages
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn set_message_reactions(
        &self,
        id: &str,
        reactions: &[ReactionEntry],
    ) -> Result<(), StoreError> {
        if self.fail_updates {
            return Err(StoreError::Backend(anyhow!("update refused")));
        }
        let mut messages = self.messages.lock().unwrap();
        let row = messages.get_mut(id).ok_or(StoreError::NotFound)?;
        row.reactions = reactions.to_vec();
        Ok(())
    }
}

fn recv_json(rx: &mut UnboundedReceiver<String>) -> Value {
    let text = rx.try_recv().expect("expected a queued frame");
    serde_json::from_str(&text).expect("gateway emitted invalid JSON")
}

fn assert_silent(rx: &mut UnboundedReceiver<String>) {
    assert!(rx.try_recv().is_err(), "expected no frame");
}

#[tokio::test]
async fn repeated_reaction_merges_into_one_entry() {
    let registry = Registry::new();
    let fake = Arc::new(FakeStore::with_message("m1"));
    let store: Arc<dyn RecordStore> = fake.clone();
    let (a, mut rx_a) = registry.register().await;

    let frame = r#"{"type":"reaction","messageId":"m1","reaction":"👍","senderId":"u1"}"#;
    handle_frame(&registry, &store, a, frame).await;
    handle_frame(&registry, &store, a, frame).await;

    let first = recv_json(&mut rx_a);
    assert_eq!(first["reactions"][0]["count"], 1);

    let second = recv_json(&mut rx_a);
    assert_eq!(second["reactions"].as_array().unwrap().len(), 1);
    assert_eq!(second["reactions"][0]["count"], 2);

    assert_eq!(
        fake.reactions("m1"),
        vec![ReactionEntry {
            emoji: "👍".into(),
            user_id: "u1".into(),
            count: 2,
        }]
    );
}

#[tokio::test]
async fn distinct_emoji_or_user_appends_without_touching_existing_counts() {
    let registry = Registry::new();
    let fake = Arc::new(FakeStore::with_message("m1"));
    let store: Arc<dyn RecordStore> = fake.clone();
    let (a, mut rx_a) = registry.register().await;

    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"reaction","messageId":"m1","reaction":"👍","senderId":"u1"}"#,
    )
    .await;
    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"reaction","messageId":"m1","reaction":"🎉","senderId":"u1"}"#,
    )
    .await;
    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"reaction","messageId":"m1","reaction":"👍","senderId":"u2"}"#,
    )
    .await;

    let entry = |emoji: &str, user_id: &str, count: u32| ReactionEntry {
        emoji: emoji.into(),
        user_id: user_id.into(),
        count,
    };
    assert_eq!(
        fake.reactions("m1"),
        vec![entry("👍", "u1", 1), entry("🎉", "u1", 1), entry("👍", "u2", 1)]
    );

    // Three reactionUpdate broadcasts landed on the sender's own queue.
    for _ in 0..3 {
        assert_eq!(recv_json(&mut rx_a)["type"], "reactionUpdate");
    }
    assert_silent(&mut rx_a);
}

#[tokio::test]
async fn typing_relays_to_everyone_but_the_sender() {
    let registry = Registry::new();
    let store: Arc<dyn RecordStore> = Arc::new(FakeStore::default());
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;
    let (_c, mut rx_c) = registry.register().await;

    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"typing_started","senderId":"u1","chat_id":"c1"}"#,
    )
    .await;

    assert_silent(&mut rx_a);
    let relayed = recv_json(&mut rx_b);
    assert_eq!(
        relayed,
        json!({ "type": "typing_started", "senderId": "u1", "chat_id": "c1" })
    );
    assert_eq!(recv_json(&mut rx_c)["type"], "typing_started");
}

#[tokio::test]
async fn typing_without_sender_or_chat_is_rejected() {
    let registry = Registry::new();
    let store: Arc<dyn RecordStore> = Arc::new(FakeStore::default());
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;

    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"typing_stopped","senderId":"u1"}"#,
    )
    .await;

    assert!(recv_json(&mut rx_a)["error"].is_string());
    assert_silent(&mut rx_b);
}

#[tokio::test]
async fn chat_messages_echo_to_all_including_the_sender() {
    let registry = Registry::new();
    let fake = Arc::new(FakeStore::default());
    let store: Arc<dyn RecordStore> = fake.clone();
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;

    // The extra field must survive: the echo is the raw frame, not a
    // re-serialization of the stored row.
    let frame = r#"{"chat_id":"c1","author_id":"u1","content":"hi","clientTag":"xyz"}"#;
    handle_frame(&registry, &store, a, frame).await;

    assert_eq!(rx_a.try_recv().unwrap(), frame);
    assert_eq!(rx_b.try_recv().unwrap(), frame);
    assert_eq!(fake.message_count(), 1);
}

#[tokio::test]
async fn malformed_frames_error_the_sender_only() {
    let registry = Registry::new();
    let store: Arc<dyn RecordStore> = Arc::new(FakeStore::default());
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;

    handle_frame(&registry, &store, a, "this is not json").await;

    assert_eq!(recv_json(&mut rx_a), json!({ "error": "Invalid message format" }));
    assert_silent(&mut rx_a);
    assert_silent(&mut rx_b);
}

#[tokio::test]
async fn failed_persistence_suppresses_the_broadcast() {
    let registry = Registry::new();
    let fake = Arc::new(FakeStore {
        fail_inserts: true,
        ..FakeStore::default()
    });
    let store: Arc<dyn RecordStore> = fake.clone();
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;

    handle_frame(
        &registry,
        &store,
        a,
        r#"{"chat_id":"c1","author_id":"u1","content":"hi"}"#,
    )
    .await;

    assert!(recv_json(&mut rx_a)["error"].is_string());
    assert_silent(&mut rx_a);
    assert_silent(&mut rx_b);
    assert_eq!(fake.message_count(), 0);
}

#[tokio::test]
async fn failed_reaction_update_suppresses_the_broadcast() {
    let registry = Registry::new();
    let fake = Arc::new(FakeStore {
        fail_updates: true,
        ..FakeStore::with_message("m1")
    });
    let store: Arc<dyn RecordStore> = fake.clone();
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;

    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"reaction","messageId":"m1","reaction":"👍","senderId":"u1"}"#,
    )
    .await;

    assert!(recv_json(&mut rx_a)["error"].is_string());
    assert_silent(&mut rx_b);
    assert!(fake.reactions("m1").is_empty());
}

#[tokio::test]
async fn reaction_without_message_id_is_rejected() {
    let registry = Registry::new();
    let store: Arc<dyn RecordStore> = Arc::new(FakeStore::default());
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;

    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"reaction","reaction":"👍","senderId":"u1"}"#,
    )
    .await;

    assert!(recv_json(&mut rx_a)["error"].is_string());
    assert_silent(&mut rx_b);
}

#[tokio::test]
async fn reaction_to_an_unknown_message_is_rejected() {
    let registry = Registry::new();
    let store: Arc<dyn RecordStore> = Arc::new(FakeStore::default());
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;

    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"reaction","messageId":"ghost","reaction":"👍","senderId":"u1"}"#,
    )
    .await;

    assert_eq!(recv_json(&mut rx_a), json!({ "error": "Message not found" }));
    assert_silent(&mut rx_b);
}

#[tokio::test]
async fn first_reaction_reaches_both_ends_with_count_one() {
    let registry = Registry::new();
    let store: Arc<dyn RecordStore> = Arc::new(FakeStore::with_message("m1"));
    let (a, mut rx_a) = registry.register().await;
    let (_b, mut rx_b) = registry.register().await;

    handle_frame(
        &registry,
        &store,
        a,
        r#"{"type":"reaction","messageId":"m1","reaction":"👍","senderId":"u1"}"#,
    )
    .await;

    let expected = json!({
        "type": "reactionUpdate",
        "messageId": "m1",
        "reactions": [{ "emoji": "👍", "userId": "u1", "count": 1 }],
    });
    assert_eq!(recv_json(&mut rx_a), expected);
    assert_eq!(recv_json(&mut rx_b), expected);
}

#[tokio::test]
async fn unknown_frame_types_take_the_chat_path() {
    let registry = Registry::new();
    let fake = Arc::new(FakeStore::default());
    let store: Arc<dyn RecordStore> = fake.clone();
    let (a, mut rx_a) = registry.register().await;

    let frame = r#"{"type":"__future__","chat_id":"c1","author_id":"u1","content":"hi"}"#;
    handle_frame(&registry, &store, a, frame).await;

    assert_eq!(rx_a.try_recv().unwrap(), frame);
    assert_eq!(fake.message_count(), 1);
}
