pub const WEBHOOK_PATH: &str = "/webhook";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
pub const SIGNATURE_ALGORITHM: &str = "sha256";
pub const HANDSHAKE_SUBSCRIBE_MODE: &str = "subscribe";
pub const LIVENESS_TEXT: &str = "Meta Webhook Server is running!";

/// Change and messaging field names as Meta documents them.
pub mod fields {
    pub const MENTIONS: &str = "mentions";
    pub const MENTION: &str = "mention";
    pub const COMMENTS: &str = "comments";
    pub const FEED: &str = "feed";
    pub const MESSAGES: &str = "messages";
    pub const MESSAGE_REACTIONS: &str = "message_reactions";
    pub const MESSAGING_POSTBACKS: &str = "messaging_postbacks";
    pub const MESSAGING_SEEN: &str = "messaging_seen";
}
