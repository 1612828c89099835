use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::common::{PortalError, PortalResult};
use crate::messages::models::{conversation_id, Message};
use crate::messages::validators::{preview, validate_message_content};
use crate::notifications::{NewNotification, NotificationDispatcher, NotificationKind, SenderInfo};
use crate::session::models::User;
use crate::store::{fields, to_fields, Direction, DocumentStore, Query, WriteBatch};

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn DocumentStore>,
    dispatcher: NotificationDispatcher,
}

impl MessageService {
    pub fn new(store: Arc<dyn DocumentStore>, dispatcher: NotificationDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Send a message and notify the recipient
    pub async fn send_message(
        &self,
        sender: &User,
        recipient_id: &str,
        content: &str,
    ) -> PortalResult<Message> {
        validate_message_content(content)?;
        if recipient_id == sender.id {
            return Err(PortalError::Validation(
                "Cannot send a message to yourself".to_string(),
            ));
        }

        let mut message = Message {
            id: String::new(),
            conversation_id: conversation_id(&sender.id, recipient_id),
            sender_id: sender.id.clone(),
            recipient_id: recipient_id.to_string(),
            body: content.trim().to_string(),
            read: false,
            created_at: Utc::now(),
        };

        message.id = self
            .store
            .add("messages", to_fields(&message)?)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    sender_id = %sender.id,
                    recipient_id = %recipient_id,
                    "Store error creating message"
                );
                e
            })?;

        info!(
            message_id = %message.id,
            sender_id = %sender.id,
            recipient_id = %recipient_id,
            "Message created successfully"
        );

        self.dispatcher
            .notify(
                NewNotification::new(
                    recipient_id,
                    NotificationKind::Message,
                    format!("New message from {}", sender.display_name),
                    preview(&message.body, 100),
                )
                .link(format!("/messages/{}", message.conversation_id))
                .sender(SenderInfo {
                    id: sender.id.clone(),
                    name: Some(sender.display_name.clone()),
                    avatar_url: sender.avatar_url.clone(),
                }),
            )
            .await;

        Ok(message)
    }

    /// Messages between two users, oldest first
    pub async fn conversation(&self, user_id: &str, other_id: &str) -> PortalResult<Vec<Message>> {
        let docs = self
            .store
            .query(
                &Query::new("messages")
                    .where_eq("conversation_id", conversation_id(user_id, other_id))
                    .order_by("created_at", Direction::Asc),
            )
            .await?;

        let mut messages: Vec<Message> = docs
            .iter()
            .filter_map(|doc| match doc.decode::<Message>() {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(message_id = %doc.id, error = %e, "Skipping malformed message");
                    None
                }
            })
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(messages)
    }

    /// Mark everything `other_id` sent to `reader_id` as read, in one batch;
    /// returns how many messages changed
    pub async fn mark_conversation_read(&self, reader_id: &str, other_id: &str) -> PortalResult<usize> {
        let unread = self
            .store
            .query(
                &Query::new("messages")
                    .where_eq("conversation_id", conversation_id(reader_id, other_id))
                    .where_eq("recipient_id", reader_id)
                    .where_eq("read", false),
            )
            .await?;

        if unread.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        for doc in &unread {
            batch.update("messages", &doc.id, fields(json!({"read": true})));
        }
        self.store.commit(batch).await?;

        info!(
            reader_id = %reader_id,
            other_id = %other_id,
            count = unread.len(),
            "Conversation marked as read"
        );
        Ok(unread.len())
    }
}
