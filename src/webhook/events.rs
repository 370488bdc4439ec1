//! Typed events handed to handlers
//!
//! A leaf of the envelope (a change, or a messaging event) becomes a
//! [`WebhookEvent`]: its dispatch key plus an [`EventPayload`] decoded for that
//! key. Keys without a typed shape, and values that fail to decode into the
//! shape their key promises, are carried as [`EventPayload::Unrecognized`].

use super::{
    registry::HandlerKey,
    schemas::{
        CommentValue, FeedValue, MentionValue, MessagingEvent, MessagingKind, ObjectType,
        WhatsAppValue,
    },
};
use crate::consts::fields;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    InstagramMention(MentionValue),
    InstagramComment(CommentValue),
    PageFeed(FeedValue),
    PageMention(FeedValue),
    WhatsAppMessages(WhatsAppValue),
    Message(MessagingEvent),
    Postback(MessagingEvent),
    Reaction(MessagingEvent),
    Seen(MessagingEvent),
    Unrecognized(Value),
}

fn decode_or_raw<T, F>(key: &HandlerKey, value: Value, wrap: F) -> EventPayload
where
    T: for<'de> Deserialize<'de>,
    F: FnOnce(T) -> EventPayload,
{
    match T::deserialize(&value) {
        Ok(typed) => wrap(typed),
        Err(e) => {
            logfire::info!(
                "payload of {key} does not match its documented shape, passing it raw: {error}",
                key = key.to_string(),
                error = e.to_string()
            );
            EventPayload::Unrecognized(value)
        }
    }
}

fn is_messaging_object(object: &ObjectType) -> bool {
    matches!(object, ObjectType::Instagram | ObjectType::Page)
}

impl EventPayload {
    /// Decodes the `value` of a change according to its dispatch key.
    pub fn from_change(key: &HandlerKey, value: Value) -> Self {
        let object = key.object();
        match key.field() {
            fields::MENTIONS if *object == ObjectType::Instagram => {
                decode_or_raw(key, value, EventPayload::InstagramMention)
            }
            fields::COMMENTS if *object == ObjectType::Instagram => {
                decode_or_raw(key, value, EventPayload::InstagramComment)
            }
            fields::FEED if *object == ObjectType::Page => {
                decode_or_raw(key, value, EventPayload::PageFeed)
            }
            fields::MENTION if *object == ObjectType::Page => {
                decode_or_raw(key, value, EventPayload::PageMention)
            }
            fields::MESSAGES if *object == ObjectType::WhatsappBusinessAccount => {
                decode_or_raw(key, value, EventPayload::WhatsAppMessages)
            }
            // Instagram and Messenger may also deliver messaging fields as changes
            fields::MESSAGES if is_messaging_object(object) => {
                decode_or_raw(key, value, EventPayload::Message)
            }
            fields::MESSAGING_POSTBACKS if is_messaging_object(object) => {
                decode_or_raw(key, value, EventPayload::Postback)
            }
            fields::MESSAGE_REACTIONS if is_messaging_object(object) => {
                decode_or_raw(key, value, EventPayload::Reaction)
            }
            fields::MESSAGING_SEEN if is_messaging_object(object) => {
                decode_or_raw(key, value, EventPayload::Seen)
            }
            _ => EventPayload::Unrecognized(value),
        }
    }

    /// Wraps an already classified messaging event.
    pub fn from_messaging(kind: MessagingKind, event: MessagingEvent) -> Self {
        match kind {
            MessagingKind::Message => EventPayload::Message(event),
            MessagingKind::Postback => EventPayload::Postback(event),
            MessagingKind::Reaction => EventPayload::Reaction(event),
            MessagingKind::Seen => EventPayload::Seen(event),
        }
    }
}

/// One dispatchable leaf of a delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub key: HandlerKey,
    /// Correlates every event of a single POST in the logs
    pub delivery_id: Uuid,
    pub entry_id: Option<String>,
    pub payload: EventPayload,
}
