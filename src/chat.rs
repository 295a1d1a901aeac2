// =============================================================================
// CHAT MODULE
// =============================================================================
// In-process support chat.
//
// - Messages live in memory only: they vanish on restart and are not shared
//   between instances
// - Every user owns one conversation; each message belongs to the user it
//   was written by or written to
// - Delivery is a tokio broadcast channel per user, best effort with no
//   replay; a subscriber that lags simply misses messages
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;
use validator::Validate;

use crate::metrics;

pub const SUPPORT_NAME: &str = "Support Team";
pub const AUTO_REPLY: &str = "Thank you for your message! Our team will get back to you shortly.";
pub const AUTO_REPLY_DELAY: Duration = Duration::from_secs(2);

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Admin,
}

impl MessageKind {
    fn label(self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    /// Owner of the conversation
    pub user_id: Uuid,
    pub user_name: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// `POST /api/chat/messages` body
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 1000, message = "Message is required (max 1000 characters)"))]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessagesPayload {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct MessagePayload {
    pub message: ChatMessage,
}

#[derive(Default)]
struct HubInner {
    messages: Mutex<Vec<ChatMessage>>,
    channels: Mutex<HashMap<Uuid, broadcast::Sender<ChatMessage>>>,
    next_id: AtomicU64,
}

/// Shared chat state; clones point at the same hub
#[derive(Clone)]
pub struct ChatHub {
    inner: Arc<HubInner>,
    reply_delay: Duration,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new(AUTO_REPLY_DELAY)
    }
}

impl ChatHub {
    pub fn new(reply_delay: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                next_id: AtomicU64::new(1),
                ..Default::default()
            }),
            reply_delay,
        }
    }

    /// The conversation owned by `user_id`, oldest first
    pub async fn conversation(&self, user_id: Uuid) -> Vec<ChatMessage> {
        self.inner
            .messages
            .lock()
            .await
            .iter()
            .filter(|message| message.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Store a message in `user_id`'s conversation and push it to that
    /// user's subscribers
    pub async fn post(
        &self,
        user_id: Uuid,
        user_name: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
    ) -> ChatMessage {
        let message = ChatMessage {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            user_id,
            user_name: user_name.into(),
            message: text.into(),
            kind,
            timestamp: Utc::now(),
            read: false,
        };

        self.inner.messages.lock().await.push(message.clone());
        self.publish(&message).await;
        metrics::record_chat_message(kind.label());
        message
    }

    pub async fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<ChatMessage> {
        let mut channels = self.inner.channels.lock().await;
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    async fn publish(&self, message: &ChatMessage) {
        let mut channels = self.inner.channels.lock().await;
        if let Some(sender) = channels.get(&message.user_id) {
            if sender.send(message.clone()).is_err() {
                // Nobody is listening any more
                channels.remove(&message.user_id);
            }
        }
    }

    /// Post the canned support answer after the reply delay
    pub fn schedule_auto_reply(&self, user_id: Uuid) {
        let hub = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(hub.reply_delay).await;
            hub.post(user_id, SUPPORT_NAME, AUTO_REPLY, MessageKind::Admin)
                .await;
            tracing::debug!(user_id = %user_id, "Chat auto-reply sent");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conversations_are_private() {
        let hub = ChatHub::new(Duration::from_millis(10));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        hub.post(alice, "Alice A", "Where is my order?", MessageKind::User)
            .await;
        hub.post(bob, "Bob B", "Hello", MessageKind::User).await;
        hub.post(alice, SUPPORT_NAME, "On its way", MessageKind::Admin)
            .await;

        let conversation = hub.conversation(alice).await;
        assert_eq!(conversation.len(), 2);
        assert!(conversation.iter().all(|m| m.user_id == alice));
        assert_eq!(hub.conversation(bob).await.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_their_messages_only() {
        let hub = ChatHub::new(Duration::from_millis(10));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut inbox = hub.subscribe(alice).await;

        hub.post(bob, "Bob B", "not for alice", MessageKind::User)
            .await;
        let sent = hub
            .post(alice, "Alice A", "ping", MessageKind::User)
            .await;

        let received = inbox.recv().await.unwrap();
        assert_eq!(received.id, sent.id);
        assert_eq!(received.message, "ping");
    }

    #[tokio::test]
    async fn test_auto_reply_arrives_after_delay() {
        let hub = ChatHub::new(Duration::from_millis(20));
        let alice = Uuid::new_v4();
        let mut inbox = hub.subscribe(alice).await;

        hub.schedule_auto_reply(alice);
        let reply = tokio::time::timeout(Duration::from_secs(2), inbox.recv())
            .await
            .expect("auto-reply not delivered")
            .unwrap();

        assert_eq!(reply.kind, MessageKind::Admin);
        assert_eq!(reply.user_name, SUPPORT_NAME);
        assert_eq!(reply.message, AUTO_REPLY);

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "admin");
        assert_eq!(json["userId"], alice.to_string());
    }
}
