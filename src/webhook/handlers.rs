//! # Default Event Handlers
//!
//! Business logic placeholders registered at startup. They only log what they
//! receive; replace them by registering another [`EventHandler`] for the same key.

use super::{
    events::{EventPayload, WebhookEvent},
    registry::{EventHandler, FieldAlias, HandlerRegistry},
    schemas::{MessagingEvent, ObjectType},
};
use crate::consts::fields;
use async_trait::async_trait;
use std::sync::Arc;

/// Logs Instagram mentions, telling caption mentions apart from comment mentions.
pub struct InstagramMentionHandler;

#[async_trait]
impl EventHandler for InstagramMentionHandler {
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()> {
        let EventPayload::InstagramMention(mention) = &event.payload else {
            return log_unrecognized(&event);
        };

        match (&mention.comment_id, &mention.media_id) {
            (Some(comment_id), media_id) => logfire::info!(
                "Mentioned in Instagram comment ID: {comment_id} on media ID: {media_id}",
                comment_id = comment_id.clone(),
                media_id = media_id.clone().unwrap_or_default()
            ),
            (None, Some(media_id)) => logfire::info!(
                "Mentioned in Instagram media caption for media ID: {media_id}",
                media_id = media_id.clone()
            ),
            (None, None) => logfire::warn!("Instagram mention without media or comment id"),
        }

        Ok(())
    }
}

pub struct InstagramCommentHandler;

#[async_trait]
impl EventHandler for InstagramCommentHandler {
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()> {
        let EventPayload::InstagramComment(comment) = &event.payload else {
            return log_unrecognized(&event);
        };

        logfire::info!(
            "Instagram comment {comment_id} by {username} on media {media_id}",
            comment_id = comment.id.clone(),
            username = comment
                .from
                .as_ref()
                .and_then(|author| author.username.clone())
                .unwrap_or_default(),
            media_id = comment
                .media
                .as_ref()
                .map(|media| media.id.clone())
                .unwrap_or_default()
        );

        Ok(())
    }
}

/// Page `feed` and `mention` changes.
pub struct PageFeedHandler;

#[async_trait]
impl EventHandler for PageFeedHandler {
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()> {
        let (EventPayload::PageFeed(item) | EventPayload::PageMention(item)) = &event.payload
        else {
            return log_unrecognized(&event);
        };

        logfire::info!(
            "Facebook Page {field} item ({kind}, verb: {verb}) post {post_id}",
            field = event.key.field().to_string(),
            kind = item.item.clone().unwrap_or_default(),
            verb = item.verb.clone().unwrap_or_default(),
            post_id = item.post_id.clone().unwrap_or_default()
        );

        Ok(())
    }
}

/// WhatsApp `messages` changes, one log line per message and per status.
pub struct WhatsAppMessagesHandler;

#[async_trait]
impl EventHandler for WhatsAppMessagesHandler {
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()> {
        let EventPayload::WhatsAppMessages(value) = &event.payload else {
            return log_unrecognized(&event);
        };

        for message in value.messages.iter().flatten() {
            logfire::info!(
                "Received WhatsApp {msg_type} message {id}",
                msg_type = message.msg_type.clone(),
                id = message.id.clone()
            );
        }

        for status in value.statuses.iter().flatten() {
            logfire::info!(
                "WhatsApp message {id} is {status}",
                id = status.id.clone(),
                status = status.status.clone()
            );
        }

        Ok(())
    }
}

/// Messages, postbacks, reactions and read receipts from Messenger and Instagram.
pub struct MessagingHandler;

fn sender_id(event: &MessagingEvent) -> String {
    event
        .sender
        .as_ref()
        .and_then(|sender| sender.id.clone())
        .unwrap_or_default()
}

#[async_trait]
impl EventHandler for MessagingHandler {
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()> {
        let messaging = match &event.payload {
            EventPayload::Message(messaging)
            | EventPayload::Postback(messaging)
            | EventPayload::Reaction(messaging)
            | EventPayload::Seen(messaging) => messaging,
            _ => return log_unrecognized(&event),
        };

        logfire::info!(
            "Received {key} from {sender}",
            key = event.key.to_string(),
            sender = sender_id(messaging)
        );

        Ok(())
    }
}

fn log_unrecognized(event: &WebhookEvent) -> anyhow::Result<()> {
    logfire::info!(
        "Received {key} event with an unrecognized payload: {payload}",
        key = event.key.to_string(),
        payload = format!("{:?}", event.payload)
    );
    Ok(())
}

/// Registry with the built-in handlers and the given field corrections.
///
/// Both spellings of the Page mention field reach the same handler, Meta's
/// documentation uses `mention` while some deliveries use `mentions`.
pub fn default_registry(aliases: &[FieldAlias]) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    let messaging: Arc<dyn EventHandler> = Arc::new(MessagingHandler);

    registry
        .register(ObjectType::Instagram, fields::MENTIONS, InstagramMentionHandler)
        .register(ObjectType::Instagram, fields::COMMENTS, InstagramCommentHandler)
        .alias(ObjectType::Instagram, fields::MENTION, fields::MENTIONS)
        .register(ObjectType::Page, fields::FEED, PageFeedHandler)
        .register(ObjectType::Page, fields::MENTION, PageFeedHandler)
        .alias(ObjectType::Page, fields::MENTIONS, fields::MENTION)
        .register(
            ObjectType::WhatsappBusinessAccount,
            fields::MESSAGES,
            WhatsAppMessagesHandler,
        );

    for object in [ObjectType::Instagram, ObjectType::Page] {
        for field in [
            fields::MESSAGES,
            fields::MESSAGING_POSTBACKS,
            fields::MESSAGE_REACTIONS,
            fields::MESSAGING_SEEN,
        ] {
            registry.register_shared(object.clone(), field, messaging.clone());
        }
    }

    registry.apply_aliases(aliases);
    registry
}
