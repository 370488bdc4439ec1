//! # Meta Webhook Schemas
//!
//! Data structures for the JSON payloads Meta posts to the callback URL.
//! The outer envelope is decoded leniently: every entry, change and messaging
//! event is decoded on its own so one malformed leaf never hides its siblings.

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;

/// Top level `object` of a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ObjectType {
    Instagram,
    Page,
    WhatsappBusinessAccount,
    /// Any object type without built-in support, kept verbatim.
    Other(String),
    /// The `object` key was absent or not a string.
    #[default]
    Missing,
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Instagram => "instagram",
            ObjectType::Page => "page",
            ObjectType::WhatsappBusinessAccount => "whatsapp_business_account",
            ObjectType::Other(name) => name,
            ObjectType::Missing => "",
        }
    }
}

impl From<&str> for ObjectType {
    fn from(value: &str) -> Self {
        match value {
            "instagram" => ObjectType::Instagram,
            "page" => ObjectType::Page,
            "whatsapp_business_account" => ObjectType::WhatsappBusinessAccount,
            other => ObjectType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root webhook payload
///
/// Entries are kept as raw values and decoded one by one with [`WebhookEnvelope::entries`].
#[derive(Debug, Clone, Default)]
pub struct WebhookEnvelope {
    /// The object type, e.g. "instagram", "page", "whatsapp_business_account"
    pub object: ObjectType,
    /// Raw entry objects, in the order received
    pub entry: Vec<Value>,
}

impl WebhookEnvelope {
    /// Reads the envelope out of an already parsed body. Never fails: a missing
    /// `object` becomes [`ObjectType::Missing`] and a missing or non-array
    /// `entry` becomes an empty list.
    pub fn from_json(body: &Value) -> Self {
        let object = body
            .get("object")
            .and_then(Value::as_str)
            .map(ObjectType::from)
            .unwrap_or_default();

        let entry = body
            .get("entry")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self { object, entry }
    }

    /// Decodes each entry independently, in order.
    pub fn entries(&self) -> impl Iterator<Item = (&Value, Result<Entry, serde_json::Error>)> {
        self.entry
            .iter()
            .map(|raw| (raw, Entry::deserialize(raw)))
    }
}

/// Entry object containing changes and/or messaging events
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Entry {
    /// Page, Instagram account or Business Account ID
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Delivery time, epoch seconds or milliseconds depending on product
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Value>,
    /// Changes that occurred (feed, mentions, comments, WhatsApp messages ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Value>,
    /// Messenger / Instagram messaging events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging: Option<Value>,
}

impl Entry {
    /// Whether the entry carries a `changes` or a `messaging` container at all.
    pub fn has_leaves(&self) -> bool {
        self.changes.is_some() || self.messaging.is_some()
    }

    /// Items of `changes`. `Err` holds a container that is not an array.
    pub fn changes(&self) -> Result<&[Value], &Value> {
        leaves(self.changes.as_ref())
    }

    /// Items of `messaging`. `Err` holds a container that is not an array.
    pub fn messaging(&self) -> Result<&[Value], &Value> {
        leaves(self.messaging.as_ref())
    }
}

fn leaves(container: Option<&Value>) -> Result<&[Value], &Value> {
    match container {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(other),
    }
}

/// Change object: the field that changed and its field specific value
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Change {
    /// The field that changed (e.g., "mentions", "feed", "messages")
    pub field: String,
    /// The value, whose shape depends on `field`
    #[serde(default)]
    pub value: Value,
}

/// Sender or recipient of a messaging event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Participant {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
}

/// Messenger / Instagram messaging event
///
/// Exactly one of `message`, `postback`, `reaction` or `read` is expected to
/// be populated, see [`MessagingEvent::kind`]. An irregular `sender` or
/// `recipient` decodes as `None` and does not affect classification.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MessagingEvent {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub sender: Option<Participant>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postback: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Value>,
    #[serde(default, alias = "seen", skip_serializing_if = "Option::is_none")]
    pub read: Option<Value>,
}

/// Which of the expected keys a messaging event carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingKind {
    Message,
    Postback,
    Reaction,
    Seen,
}

impl MessagingKind {
    /// Subscription field this kind is dispatched under.
    pub fn field(&self) -> &'static str {
        use crate::consts::fields;

        match self {
            MessagingKind::Message => fields::MESSAGES,
            MessagingKind::Postback => fields::MESSAGING_POSTBACKS,
            MessagingKind::Reaction => fields::MESSAGE_REACTIONS,
            MessagingKind::Seen => fields::MESSAGING_SEEN,
        }
    }
}

impl MessagingEvent {
    /// Classifies the event by its single populated key.
    ///
    /// Returns `None` when no expected key, or more than one, is present.
    pub fn kind(&self) -> Option<MessagingKind> {
        let populated = [
            (self.message.is_some(), MessagingKind::Message),
            (self.postback.is_some(), MessagingKind::Postback),
            (self.reaction.is_some(), MessagingKind::Reaction),
            (self.read.is_some(), MessagingKind::Seen),
        ];

        let mut kinds = populated
            .into_iter()
            .filter_map(|(present, kind)| present.then_some(kind));

        match (kinds.next(), kinds.next()) {
            (Some(kind), None) => Some(kind),
            _ => None,
        }
    }
}

/// `value` of an Instagram `mentions` change
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MentionValue {
    /// Media where the account was mentioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    /// Present when the mention is inside a comment rather than a caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
}

/// Author of an Instagram comment
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CommentAuthor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Media a comment belongs to
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CommentMedia {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_product_type: Option<String>,
}

/// `value` of an Instagram `comments` change
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CommentValue {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<CommentAuthor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<CommentMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Author of a Page feed item
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedAuthor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `value` of a Page `feed` or `mention` change
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedValue {
    /// comment, post, status, photo, video ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    /// add, edit, remove, hide, unhide ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<FeedAuthor>,
}

/// `value` of a WhatsApp `messages` change
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WhatsAppValue {
    /// Messaging product (e.g., "whatsapp")
    #[serde(default)]
    pub messaging_product: Option<String>,
    /// Metadata about the phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WhatsAppMetadata>,
    /// Array of contacts (senders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<WhatsAppContact>>,
    /// Array of messages received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<WhatsAppMessage>>,
    /// Array of statuses (for sent messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<WhatsAppStatus>>,
}

/// Metadata about the WhatsApp Business phone number
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WhatsAppMetadata {
    /// Display name of the business phone number
    pub display_phone_number: String,
    /// Phone number ID
    pub phone_number_id: String,
}

/// Contact information for the message sender
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WhatsAppContact {
    /// WhatsApp ID (phone number)
    pub wa_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<WhatsAppProfile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WhatsAppProfile {
    pub name: String,
}

/// WhatsApp message. Type specific content stays opaque.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WhatsAppMessage {
    /// Sender's WhatsApp ID (phone number)
    pub from: String,
    /// Message ID
    pub id: String,
    /// Timestamp of the message
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Message type (text, image, interactive, ...)
    #[serde(rename = "type")]
    pub msg_type: String,
    /// The object named after `msg_type`, e.g. `text`
    #[serde(flatten)]
    pub content: serde_json::Map<String, Value>,
}

/// Status update for sent messages
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WhatsAppStatus {
    /// Message ID
    pub id: String,
    /// Status (sent, delivered, read, failed)
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// Accepts ids sent either as JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Decodes `T` when the value has its shape, `None` otherwise.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| serde_json::from_value(value).ok()))
}
