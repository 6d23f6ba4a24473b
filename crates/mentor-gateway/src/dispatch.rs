use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{error, warn};
use uuid::Uuid;

use mentor_store::models::NewMessage;
use mentor_store::{RecordStore, StoreError};
use mentor_types::frames::{ClientFrame, ReactionFrame, ServerFrame, TypingFrame, TypingKind};
use mentor_types::models::{MessageStatus, ReactionEntry};

use crate::registry::{ConnectionId, Registry};

/// Handle one inbound text frame from `conn_id`: classify it, apply the
/// side effect for its kind, and deliver to the computed recipient set.
pub async fn handle_frame(
    registry: &Registry,
    store: &Arc<dyn RecordStore>,
    conn_id: ConnectionId,
    text: &str,
) {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(
                "connection {} sent an unparseable frame ({} bytes): {}",
                conn_id,
                text.len(),
                e
            );
            registry
                .send_to(conn_id, &error_frame("Invalid message format"))
                .await;
            return;
        }
    };

    match frame {
        ClientFrame::Reaction(frame) => handle_reaction(registry, store, conn_id, frame).await,
        ClientFrame::Typing(kind, frame) => handle_typing(registry, conn_id, kind, frame).await,
        ClientFrame::Chat(value) => handle_chat(registry, store, conn_id, text, &value).await,
    }
}

/// Merge one reaction into a message's list and push the updated list to
/// every open connection, sender included.
async fn handle_reaction(
    registry: &Registry,
    store: &Arc<dyn RecordStore>,
    conn_id: ConnectionId,
    frame: ReactionFrame,
) {
    let Some(message_id) = frame.message_id else {
        registry
            .send_to(conn_id, &error_frame("reaction requires a messageId"))
            .await;
        return;
    };
    let (Some(emoji), Some(user_id)) = (frame.reaction, frame.sender_id) else {
        registry
            .send_to(conn_id, &error_frame("reaction requires reaction and senderId"))
            .await;
        return;
    };

    // Fetch, merge, write back. Deliberately not atomic: two concurrent
    // reactions to the same message can both read the same list, and the
    // later write wins.
    let fetch_store = store.clone();
    let fetch_id = message_id.clone();
    let fetched = tokio::task::spawn_blocking(move || fetch_store.message_by_id(&fetch_id)).await;

    let message = match fetched {
        Ok(Ok(message)) => message,
        Ok(Err(StoreError::NotFound)) => {
            registry
                .send_to(conn_id, &error_frame("Message not found"))
                .await;
            return;
        }
        Ok(Err(StoreError::Backend(e))) => {
            warn!("reaction fetch for message {} failed: {}", message_id, e);
            registry
                .send_to(conn_id, &error_frame("Failed to update reaction"))
                .await;
            return;
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            registry
                .send_to(conn_id, &error_frame("Failed to update reaction"))
                .await;
            return;
        }
    };

    let reactions = merge_reaction(message.reactions, &emoji, &user_id);

    let update_store = store.clone();
    let update_id = message_id.clone();
    let to_save = reactions.clone();
    let saved = tokio::task::spawn_blocking(move || {
        update_store.set_message_reactions(&update_id, &to_save)
    })
    .await;

    match saved {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!("reaction update for message {} failed: {}", message_id, e);
            registry
                .send_to(conn_id, &error_frame("Failed to update reaction"))
                .await;
            return;
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            registry
                .send_to(conn_id, &error_frame("Failed to update reaction"))
                .await;
            return;
        }
    }

    let update = ServerFrame::ReactionUpdate {
        message_id,
        reactions,
    };
    registry
        .broadcast_all(&serde_json::to_string(&update).unwrap())
        .await;
}

/// Relay a typing signal to every other connection. Nothing is persisted,
/// and there is no chat-room scoping: membership filtering is left to the
/// receiving clients.
async fn handle_typing(
    registry: &Registry,
    conn_id: ConnectionId,
    kind: TypingKind,
    frame: TypingFrame,
) {
    let (Some(sender_id), Some(chat_id)) = (frame.sender_id, frame.chat_id) else {
        registry
            .send_to(
                conn_id,
                &error_frame("typing events require senderId and chat_id"),
            )
            .await;
        return;
    };

    let event = match kind {
        TypingKind::Started => ServerFrame::TypingStarted { sender_id, chat_id },
        TypingKind::Stopped => ServerFrame::TypingStopped { sender_id, chat_id },
    };

    registry
        .broadcast_except(conn_id, &serde_json::to_string(&event).unwrap())
        .await;
}

/// Persist a chat message, then echo the inbound text verbatim to every
/// open connection including the sender. The echo is the raw frame as
/// received, extra fields and all; it is never a re-serialization of the
/// stored row.
async fn handle_chat(
    registry: &Registry,
    store: &Arc<dyn RecordStore>,
    conn_id: ConnectionId,
    raw: &str,
    value: &Value,
) {
    let message = NewMessage {
        id: Uuid::new_v4().to_string(),
        chat_id: string_field(value, "chat_id"),
        author_id: string_field(value, "author_id"),
        content: string_field(value, "content"),
        status: MessageStatus::Sent,
    };

    let insert_store = store.clone();
    let inserted = tokio::task::spawn_blocking(move || insert_store.insert_message(message)).await;

    match inserted {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!("failed to persist chat message from {}: {}", conn_id, e);
            registry
                .send_to(conn_id, &error_frame("Failed to save message"))
                .await;
            return;
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            registry
                .send_to(conn_id, &error_frame("Failed to save message"))
                .await;
            return;
        }
    }

    registry.broadcast_all(raw).await;
}

/// Bump the count on an existing `(emoji, userId)` entry, or append a new
/// one with `count = 1`.
fn merge_reaction(
    mut reactions: Vec<ReactionEntry>,
    emoji: &str,
    user_id: &str,
) -> Vec<ReactionEntry> {
    match reactions
        .iter_mut()
        .find(|r| r.emoji == emoji && r.user_id == user_id)
    {
        Some(entry) => entry.count += 1,
        None => reactions.push(ReactionEntry {
            emoji: emoji.to_owned(),
            user_id: user_id.to_owned(),
            count: 1,
        }),
    }
    reactions
}

fn error_frame(message: &str) -> String {
    json!({ "error": message }).to_string()
}

/// Pull a string-valued field out of a raw inbound frame, yielding `None`
/// when the key is absent or is not a JSON string.
fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}
