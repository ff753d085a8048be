//! Telegram channel: long-polls the Bot API for updates.
//!
//! Native Rust Telegram Bot API implementation: the poller turns raw updates
//! into [`InboundEvent`]s, and [`Messenger`] covers replies, button
//! acknowledgements and video note downloads.

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::{
    ChatId, EventKind, EventStream, InboundEvent, Keyboard, Messenger, OutgoingReply,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause before polling again after a failed getUpdates call.
const ERROR_BACKOFF: std::time::Duration = std::time::Duration::from_secs(5);

/// Telegram channel. Connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "https://api.telegram.org/file/bot{}/{file_path}",
            self.bot_token.expose_secret()
        )
    }

    /// Send a text message, splitting text over Telegram's 4096 char limit.
    /// The keyboard is attached to the last chunk.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last
                && let Some(kb) = keyboard
            {
                body["reply_markup"] = keyboard_markup(kb);
            }

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.to_string(),
                })?;

            if !resp.status().is_success() {
                let status = resp.status();
                let err = resp.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: format!("sendMessage returned {status}: {err}"),
                });
            }
        }

        Ok(())
    }

    /// Start long-polling. Updates are parsed on a background task and
    /// delivered in order through the returned stream.
    pub fn start(&self) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let results = match update_results(&data) {
                    Ok(results) => results,
                    Err(description) => {
                        tracing::warn!("Telegram getUpdates failed: {description}");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                        continue;
                    }
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update) else {
                        tracing::debug!("Telegram: skipping update without a sender");
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Box::pin(stream)
    }

    /// Verify the token with `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    /// Resolve a file id to its download path via `getFile`.
    async fn resolve_file_path(&self, file_id: &str) -> Result<String, ChannelError> {
        let download_err = |reason: String| ChannelError::DownloadFailed {
            file_id: file_id.to_string(),
            reason,
        };

        let resp = self
            .client
            .post(self.api_url("getFile"))
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(download_err(format!("getFile returned {}", resp.status())));
        }

        let data: Value = resp.json().await.map_err(|e| download_err(e.to_string()))?;
        data.get("result")
            .and_then(|r| r.get("file_path"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| download_err("getFile response has no file_path".into()))
    }
}

// ── Messenger implementation ────────────────────────────────────────

#[async_trait]
impl Messenger for TelegramChannel {
    async fn send(&self, chat_id: ChatId, reply: OutgoingReply) -> Result<(), ChannelError> {
        self.send_message(chat_id, &reply.text, reply.keyboard.as_ref())
            .await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url("answerCallbackQuery"))
            .json(&serde_json::json!({ "callback_query_id": callback_id }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("answerCallbackQuery returned {}", resp.status()),
            });
        }
        Ok(())
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), ChannelError> {
        let file_path = self.resolve_file_path(file_id).await?;
        let download_err = |reason: String| ChannelError::DownloadFailed {
            file_id: file_id.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(download_err(format!("file download returned {}", resp.status())));
        }

        let bytes = resp.bytes().await.map_err(|e| download_err(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| download_err(e.to_string()))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| download_err(e.to_string()))?;

        tracing::info!(file_id, dest = %dest.display(), size = bytes.len(), "Telegram file downloaded");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Turn a raw `getUpdates` entry into an event. Returns `None` for updates
/// without a sender or chat.
pub fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(query) = update.get("callback_query") {
        let user_id = query.get("from")?.get("id")?.as_i64()?;
        let chat_id = query
            .get("message")
            .and_then(|m| m.get("chat"))
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .unwrap_or(user_id);
        let callback_id = query.get("id")?.as_str()?.to_string();
        let data = query
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        return Some(InboundEvent {
            user_id,
            chat_id,
            kind: EventKind::Callback { callback_id, data },
        });
    }

    let message = update.get("message")?;
    let user_id = message.get("from")?.get("id")?.as_i64()?;
    let chat_id = message.get("chat")?.get("id")?.as_i64()?;

    let file_id_of = |key: &str| {
        message
            .get(key)
            .and_then(|v| v.get("file_id"))
            .and_then(Value::as_str)
            .map(String::from)
    };

    let kind = if let Some(text) = message.get("text").and_then(Value::as_str) {
        EventKind::Text(text.to_string())
    } else if let Some(file_id) = file_id_of("video_note") {
        EventKind::VideoNote { file_id }
    } else if let Some(file_id) = file_id_of("video") {
        EventKind::Video { file_id }
    } else {
        EventKind::Unsupported
    };

    Some(InboundEvent {
        user_id,
        chat_id,
        kind,
    })
}

/// The update list of a `getUpdates` response, or the API's error
/// description when the call was refused (bad token, competing poller).
fn update_results(data: &Value) -> Result<&[Value], &str> {
    data.get("result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| {
            data.get("description")
                .and_then(Value::as_str)
                .unwrap_or("response has no result")
        })
}

/// Render a keyboard as a Bot API `reply_markup` object.
fn keyboard_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Choices(rows) => serde_json::json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|text| serde_json::json!({ "text": text })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "one_time_keyboard": true,
            "resize_keyboard": true,
        }),
        Keyboard::Inline(rows) => serde_json::json!({ "inline_keyboard": rows }),
        Keyboard::Remove => serde_json::json!({ "remove_keyboard": true }),
    }
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut boundary = max_len;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }

        let chunk = &remaining[..boundary];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(boundary);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { boundary } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
