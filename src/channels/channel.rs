//! Transport-neutral inbound events, outgoing replies and the `Messenger` seam.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;

use crate::error::ChannelError;
use crate::store::UserId;

/// Chat to reply into. Equal to the user id in private chats.
pub type ChatId = i64;

/// Stream of inbound events produced by a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// One update from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub kind: EventKind,
}

/// Shape of an inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Plain text, including `/commands`.
    Text(String),
    /// Round video message.
    VideoNote { file_id: String },
    /// Regular video attachment.
    Video { file_id: String },
    /// Inline button press.
    Callback { callback_id: String, data: String },
    /// Anything else (stickers, photos, ...).
    Unsupported,
}

impl InboundEvent {
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id: user_id,
            kind: EventKind::Text(text.into()),
        }
    }

    pub fn video_note(user_id: UserId, file_id: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id: user_id,
            kind: EventKind::VideoNote {
                file_id: file_id.into(),
            },
        }
    }

    pub fn callback(user_id: UserId, data: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id: user_id,
            kind: EventKind::Callback {
                callback_id: format!("cb-{user_id}"),
                data: data.into(),
            },
        }
    }
}

/// An inline keyboard button carrying a callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Keyboard attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// One-time reply keyboard of choices.
    Choices(Vec<Vec<String>>),
    /// Buttons under the message.
    Inline(Vec<Vec<InlineButton>>),
    /// Hide a previously shown reply keyboard.
    Remove,
}

/// A message sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl OutgoingReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

impl From<&str> for OutgoingReply {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for OutgoingReply {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a reply into a chat.
    async fn send(&self, chat_id: ChatId, reply: OutgoingReply) -> Result<(), ChannelError>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError>;

    /// Download a file by transport file id to `dest`.
    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), ChannelError>;
}
