//! Event types consumed from the Feishu event stream and their payloads.
//!
//! Payloads arrive as the `event` body of a v2 event envelope. Only the
//! fields the gateway and message handlers need are modelled; everything is
//! optional or defaulted so a schema addition never breaks parsing.

use {
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::Value,
};

/// A user or bot sent a message the app can see.
pub const MESSAGE_RECEIVE: &str = "im.message.receive_v1";
/// A message sent by the bot was read.
pub const MESSAGE_READ: &str = "im.message.message_read_v1";
/// The bot was added to a chat.
pub const BOT_ADDED: &str = "im.chat.member.bot.added_v1";
/// The bot was removed from a chat.
pub const BOT_DELETED: &str = "im.chat.member.bot.deleted_v1";

/// Extract `message.message_id` from a raw `im.message.receive_v1` payload.
pub fn message_id(payload: &Value) -> Option<&str> {
    payload
        .pointer("/message/message_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// The three ID flavours Feishu attaches to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserId {
    pub open_id: Option<String>,
    pub user_id: Option<String>,
    pub union_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSender {
    pub sender_id: UserId,
    /// `user` for people, `app` for bots.
    pub sender_type: String,
    pub tenant_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mention {
    /// Placeholder used in the message text, e.g. `@_user_1`.
    pub key: String,
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    /// One-to-one chat with the bot.
    P2p,
    Group,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMessage {
    #[serde(deserialize_with = "lenient_string")]
    pub message_id: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub root_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub parent_id: Option<String>,
    /// Millisecond timestamp, normally sent as a string.
    #[serde(deserialize_with = "lenient_opt_string")]
    pub create_time: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub chat_id: String,
    pub chat_type: ChatType,
    /// `text`, `post`, `image`, `file`, ...
    #[serde(deserialize_with = "lenient_string")]
    pub message_type: String,
    /// JSON-encoded content; its shape depends on `message_type`.
    #[serde(deserialize_with = "lenient_string")]
    pub content: String,
    pub mentions: Vec<Mention>,
}

/// Payload of [`MESSAGE_RECEIVE`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageReceiveEvent {
    pub sender: EventSender,
    pub message: EventMessage,
}

impl MessageReceiveEvent {
    /// Typed view of a raw payload. Parts that do not fit the schema are left
    /// at their defaults; the error, if any, is returned alongside.
    pub fn from_payload(payload: &Value) -> (Self, Option<serde_json::Error>) {
        match Self::deserialize(payload) {
            Ok(event) => (event, None),
            Err(e) => {
                let sender = payload
                    .get("sender")
                    .and_then(|v| EventSender::deserialize(v).ok())
                    .unwrap_or_default();
                let message = payload
                    .get("message")
                    .and_then(|v| EventMessage::deserialize(v).ok())
                    .unwrap_or_else(|| EventMessage {
                        message_id: string_at(payload, "/message/message_id"),
                        chat_id: string_at(payload, "/message/chat_id"),
                        message_type: string_at(payload, "/message/message_type"),
                        content: string_at(payload, "/message/content"),
                        ..Default::default()
                    });
                (Self { sender, message }, Some(e))
            },
        }
    }

    /// Plain text of a `text` message, if any.
    pub fn text(&self) -> Option<String> {
        if self.message.message_type != "text" {
            return None;
        }
        let content: Value = serde_json::from_str(&self.message.content).ok()?;
        content
            .get("text")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    pub fn is_group(&self) -> bool {
        self.message.chat_type == ChatType::Group
    }

    /// True when the message was sent by an app, or by this bot itself.
    pub fn is_from_bot(&self, bot_open_id: Option<&str>) -> bool {
        if self.sender.sender_type == "app" {
            return true;
        }
        bot_open_id.is_some_and(|bot| self.sender.sender_id.open_id.as_deref() == Some(bot))
    }

    pub fn mentions_bot(&self, bot_open_id: Option<&str>) -> bool {
        let Some(bot) = bot_open_id else {
            return false;
        };
        self.message
            .mentions
            .iter()
            .any(|m| m.id.open_id.as_deref() == Some(bot))
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn string_at(payload: &Value, pointer: &str) -> String {
    payload
        .pointer(pointer)
        .cloned()
        .and_then(scalar_to_string)
        .unwrap_or_default()
}

/// Accepts numbers and booleans where Feishu documents a string.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

/// Payload of [`BOT_ADDED`] and [`BOT_DELETED`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotMembershipEvent {
    pub chat_id: String,
    pub name: Option<String>,
    pub external: bool,
    pub operator_id: UserId,
}
