//! Event dispatcher.
//!
//! Consumes inbound events one at a time and selects exactly one handler per
//! event: button callbacks first, then commands, then trigger words, then the
//! user's current stage. Owns the session table, so handlers never interleave.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::channels::{ChatId, EventKind, EventStream, InboundEvent, Messenger, OutgoingReply};
use crate::error::Result;
use crate::store::{Database, UserId};

use super::command::Command;
use super::media::{MediaStore, VideoPurpose};
use super::prompts;
use super::session::SessionStore;
use super::stage::{Flow, Stage};

/// Input shape handed to a stage handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Text(&'a str),
    VideoNote(&'a str),
    /// A regular video attachment; never accepted where a video note is expected.
    Video,
    Other,
}

impl<'a> Input<'a> {
    pub fn text(&self) -> Option<&'a str> {
        match self {
            Self::Text(text) => Some(*text),
            _ => None,
        }
    }
}

/// Per-event context shared by the handlers.
#[derive(Debug, Clone, Copy)]
pub(super) struct Ctx {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub now: DateTime<Utc>,
}

pub struct Dispatcher {
    pub(super) store: Arc<dyn Database>,
    pub(super) messenger: Arc<dyn Messenger>,
    pub(super) media: MediaStore,
    pub(super) sessions: SessionStore,
    session_idle_timeout: chrono::Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Database>,
        messenger: Arc<dyn Messenger>,
        media: MediaStore,
        session_idle_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            messenger,
            media,
            sessions: SessionStore::new(),
            session_idle_timeout: chrono::Duration::from_std(session_idle_timeout)
                .unwrap_or_else(|_| chrono::Duration::days(36_500)),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Evict sessions idle for longer than the configured timeout.
    pub fn expire_idle_sessions(&mut self, now: DateTime<Utc>) -> usize {
        let evicted = self.sessions.expire_idle(now, self.session_idle_timeout);
        if evicted > 0 {
            tracing::debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    /// Consume `events` until the stream ends or Ctrl+C.
    pub async fn run(mut self, mut events: EventStream) {
        tracing::info!("Dispatcher ready and listening");

        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = events.next() => match event {
                    Some(event) => event,
                    None => {
                        tracing::info!("Event stream ended, shutting down...");
                        break;
                    }
                },
            };

            let user_id = event.user_id;
            if let Err(e) = self.handle(event).await {
                tracing::error!(user_id, "Error handling event: {}", e);
            }
        }
    }

    /// Route one event to its handler.
    pub async fn handle(&mut self, event: InboundEvent) -> Result<()> {
        let ctx = Ctx {
            user_id: event.user_id,
            chat_id: event.chat_id,
            now: Utc::now(),
        };
        self.expire_idle_sessions(ctx.now);

        match event.kind {
            EventKind::Callback { callback_id, data } => {
                if let Err(e) = self.messenger.answer_callback(&callback_id).await {
                    tracing::warn!(user_id = ctx.user_id, "Failed to answer callback: {}", e);
                }
                self.on_callback(ctx, &data).await
            }
            EventKind::Text(text) => {
                let text = text.trim();
                if let Some(command) = Command::parse(text) {
                    return self.on_command(ctx, command).await;
                }
                match text.to_lowercase().as_str() {
                    prompts::TRIGGER_APPLY => return self.begin_identity(ctx).await,
                    prompts::TRIGGER_SALARY => return self.reply(ctx, prompts::SALARY).await,
                    _ => {}
                }
                self.on_stage_input(ctx, Input::Text(text)).await
            }
            EventKind::VideoNote { file_id } => {
                self.on_stage_input(ctx, Input::VideoNote(&file_id)).await
            }
            EventKind::Video { .. } => self.on_stage_input(ctx, Input::Video).await,
            EventKind::Unsupported => self.on_stage_input(ctx, Input::Other).await,
        }
    }

    async fn on_stage_input(&mut self, ctx: Ctx, input: Input<'_>) -> Result<()> {
        let Some(stage) = self.sessions.stage(ctx.user_id) else {
            return self.reply(ctx, prompts::HELP).await;
        };

        tracing::debug!(user_id = ctx.user_id, stage = %stage, "Dispatching stage input");

        match stage {
            Stage::IdentityName => self.on_full_name(ctx, input).await,
            Stage::IdentityCity => self.on_city(ctx, input).await,
            Stage::IdentityBirthDate => self.on_birth_date(ctx, input).await,
            Stage::InterviewQ1
            | Stage::InterviewQ2
            | Stage::InterviewQ3
            | Stage::InterviewQ4
            | Stage::InterviewQ5 => self.on_interview_answer(ctx, stage, input).await,
            Stage::InterviewVideo => self.on_video(ctx, VideoPurpose::Verification, input).await,
            Stage::LessonVideo => self.on_video(ctx, VideoPurpose::Lesson, input).await,
            Stage::AddressCollect => self.on_address(ctx, input).await,
            Stage::AddressConfirm => self.reply(ctx, prompts::USE_ADDRESS_BUTTONS).await,
        }
    }

    async fn on_command(&mut self, ctx: Ctx, command: Command) -> Result<()> {
        tracing::debug!(user_id = ctx.user_id, ?command, "Command received");

        match command {
            Command::Start => {
                self.sessions.discard(ctx.user_id);
                self.reply(ctx, prompts::start_menu()).await
            }
            Command::Step2 => {
                self.sessions.begin(ctx.user_id, Flow::Interview, ctx.now);
                self.reply(ctx, prompts::QUESTIONS[0]).await
            }
            Command::Step3 => {
                self.sessions.begin(ctx.user_id, Flow::Lesson, ctx.now);
                self.reply(ctx, prompts::ASK_LESSON_VIDEO).await
            }
            Command::Lesson(n) => {
                let text = match n {
                    1 => prompts::LESSON1_TEXT,
                    2 => prompts::LESSON2_TEXT,
                    _ => prompts::LESSON3_TEXT,
                };
                self.reply(ctx, text).await
            }
            Command::Unknown(_) => self.reply(ctx, prompts::HELP).await,
        }
    }

    async fn on_callback(&mut self, ctx: Ctx, data: &str) -> Result<()> {
        match data {
            prompts::CB_INTERVIEW_CONFIRM => self.confirm_interview(ctx).await,
            prompts::CB_INTERVIEW_REJECT => self.reject_interview(ctx).await,
            prompts::CB_ADDRESS_CONFIRM => self.confirm_address(ctx).await,
            prompts::CB_ADDRESS_EDIT => self.edit_address(ctx).await,
            other => {
                tracing::warn!(user_id = ctx.user_id, data = other, "Unknown callback payload");
                Ok(())
            }
        }
    }

    pub(super) async fn reply(&self, ctx: Ctx, reply: impl Into<OutgoingReply>) -> Result<()> {
        self.messenger.send(ctx.chat_id, reply.into()).await?;
        Ok(())
    }
}
