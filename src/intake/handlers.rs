//! Stage handlers and button callbacks.
//!
//! Text handlers validate, store, advance and prompt; on a validation failure
//! they re-prompt and leave the stage where it is.

use crate::channels::{Keyboard, OutgoingReply};
use crate::error::{DatabaseError, Result};
use crate::store::NewApplicant;

use super::dispatcher::{Ctx, Dispatcher, Input};
use super::media::VideoPurpose;
use super::prompts;
use super::session::PendingInterview;
use super::stage::{Flow, Stage};
use super::validation;

impl Dispatcher {
    // ── Identity ────────────────────────────────────────────────────

    /// Trigger word: start the identity survey unless a record exists.
    pub(super) async fn begin_identity(&mut self, ctx: Ctx) -> Result<()> {
        match self.store.applicant_exists(ctx.user_id).await {
            Ok(true) => self.reply(ctx, prompts::ALREADY_APPLIED).await,
            Ok(false) => {
                self.sessions.begin(ctx.user_id, Flow::Identity, ctx.now);
                self.reply(
                    ctx,
                    OutgoingReply::text(prompts::ASK_FULL_NAME).with_keyboard(Keyboard::Remove),
                )
                .await
            }
            Err(e) => {
                tracing::error!(user_id = ctx.user_id, "Applicant lookup failed: {}", e);
                self.reply(ctx, prompts::SAVE_FAILED).await
            }
        }
    }

    pub(super) async fn on_full_name(&mut self, ctx: Ctx, input: Input<'_>) -> Result<()> {
        let Some(name) = input
            .text()
            .and_then(|t| validation::validate_full_name(t).ok())
        else {
            return self.reply(ctx, prompts::BAD_FULL_NAME).await;
        };

        self.sessions.buffer_mut(ctx.user_id, ctx.now).full_name = Some(name);
        self.sessions.transition(ctx.user_id, Stage::IdentityCity, ctx.now)?;
        self.reply(ctx, prompts::city_choice()).await
    }

    pub(super) async fn on_city(&mut self, ctx: Ctx, input: Input<'_>) -> Result<()> {
        let Some(city) = input.text().and_then(|t| validation::validate_city(t).ok()) else {
            return self.reply(ctx, prompts::BAD_CITY).await;
        };

        self.sessions.buffer_mut(ctx.user_id, ctx.now).city = Some(city.to_string());
        self.sessions.transition(ctx.user_id, Stage::IdentityBirthDate, ctx.now)?;
        self.reply(
            ctx,
            OutgoingReply::text(prompts::ASK_BIRTH_DATE).with_keyboard(Keyboard::Remove),
        )
        .await
    }

    pub(super) async fn on_birth_date(&mut self, ctx: Ctx, input: Input<'_>) -> Result<()> {
        let Some(birth_date) = input
            .text()
            .and_then(|t| validation::parse_birth_date(t).ok())
        else {
            return self.reply(ctx, prompts::BAD_BIRTH_DATE).await;
        };

        let buffer = self.sessions.buffer_mut(ctx.user_id, ctx.now);
        let (Some(full_name), Some(city)) = (buffer.full_name.clone(), buffer.city.clone()) else {
            // Earlier answers are gone; ask again from the top.
            tracing::warn!(user_id = ctx.user_id, "Identity buffer incomplete, restarting");
            self.sessions.begin(ctx.user_id, Flow::Identity, ctx.now);
            return self.reply(ctx, prompts::ASK_FULL_NAME).await;
        };

        match self.store.applicant_exists(ctx.user_id).await {
            Ok(true) => {
                self.finish_flow(ctx, Flow::Identity);
                return self.reply(ctx, prompts::ALREADY_APPLIED).await;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(user_id = ctx.user_id, "Applicant lookup failed: {}", e);
                return self.reply(ctx, prompts::SAVE_FAILED).await;
            }
        }

        let applicant = NewApplicant {
            id: ctx.user_id,
            full_name,
            city,
            birth_date,
        };

        match self.store.insert_applicant(&applicant, ctx.now).await {
            Ok(()) => {
                tracing::info!(user_id = ctx.user_id, city = %applicant.city, "Applicant registered");
                self.finish_flow(ctx, Flow::Identity);
                self.reply(ctx, prompts::IDENTITY_SAVED).await
            }
            Err(DatabaseError::Constraint(_)) => {
                self.finish_flow(ctx, Flow::Identity);
                self.reply(ctx, prompts::ALREADY_APPLIED).await
            }
            Err(e) => {
                tracing::error!(user_id = ctx.user_id, "Failed to insert applicant: {}", e);
                self.reply(ctx, prompts::SAVE_FAILED).await
            }
        }
    }

    // ── Interview ───────────────────────────────────────────────────

    pub(super) async fn on_interview_answer(
        &mut self,
        ctx: Ctx,
        stage: Stage,
        input: Input<'_>,
    ) -> Result<()> {
        let (Some(index), Some(next)) = (stage.question_index(), stage.next()) else {
            return Ok(());
        };
        let Some(answer) = input
            .text()
            .and_then(|t| validation::validate_answer(t).ok())
        else {
            return self.reply(ctx, prompts::BAD_ANSWER).await;
        };

        self.sessions.buffer_mut(ctx.user_id, ctx.now).answers[index] = Some(answer);
        self.sessions.transition(ctx.user_id, next, ctx.now)?;

        match next.question_index() {
            Some(i) => self.reply(ctx, prompts::QUESTIONS[i]).await,
            None => self.reply(ctx, prompts::ASK_VERIFICATION_VIDEO).await,
        }
    }

    /// Save a video note for either video stage.
    pub(super) async fn on_video(
        &mut self,
        ctx: Ctx,
        purpose: VideoPurpose,
        input: Input<'_>,
    ) -> Result<()> {
        let Input::VideoNote(file_id) = input else {
            return self.reply(ctx, prompts::NEED_VIDEO_NOTE).await;
        };

        let full_name = match self.store.get_applicant(ctx.user_id).await {
            Ok(applicant) => applicant.map(|a| a.full_name),
            Err(e) => {
                tracing::warn!(user_id = ctx.user_id, "Applicant lookup failed: {}", e);
                None
            }
        };
        let path = self
            .media
            .video_path(full_name.as_deref(), ctx.user_id, purpose);

        if let Err(e) = self.messenger.download_file(file_id, &path).await {
            tracing::warn!(user_id = ctx.user_id, ?purpose, "Video download failed: {}", e);
            return self.reply(ctx, prompts::VIDEO_SAVE_FAILED).await;
        }
        tracing::info!(user_id = ctx.user_id, path = %path.display(), "Video note saved");

        match purpose {
            VideoPurpose::Verification => {
                let buffer = self.sessions.buffer_mut(ctx.user_id, ctx.now);
                let Some(answers) = buffer.completed_answers() else {
                    tracing::warn!(user_id = ctx.user_id, "Interview answers missing, restarting");
                    self.sessions.begin(ctx.user_id, Flow::Interview, ctx.now);
                    return self.reply(ctx, prompts::QUESTIONS[0]).await;
                };
                let summary = prompts::interview_summary(&answers);
                buffer.pending_interview = Some(PendingInterview {
                    summary: summary.clone(),
                    video_path: Some(path.display().to_string()),
                });
                self.sessions.clear(ctx.user_id);

                self.reply(ctx, format!("{}{}", prompts::ANSWERS_HEADER, summary))
                    .await?;
                self.reply(ctx, prompts::interview_confirmation()).await
            }
            VideoPurpose::Lesson => {
                self.sessions.transition(ctx.user_id, Stage::AddressCollect, ctx.now)?;
                self.reply(ctx, prompts::ASK_ADDRESS).await
            }
        }
    }

    pub(super) async fn confirm_interview(&mut self, ctx: Ctx) -> Result<()> {
        let pending = self
            .sessions
            .buffer(ctx.user_id)
            .and_then(|b| b.pending_interview.clone());
        let Some(pending) = pending else {
            return self.reply(ctx, prompts::NOTHING_TO_CONFIRM).await;
        };

        let result = self
            .store
            .complete_interview(ctx.user_id, &pending.summary, pending.video_path.as_deref())
            .await;
        match result {
            Ok(true) => {
                tracing::info!(user_id = ctx.user_id, "Interview confirmed");
                self.finish_flow(ctx, Flow::Interview);
                self.reply(ctx, prompts::INTERVIEW_CONFIRMED).await
            }
            Ok(false) => {
                self.finish_flow(ctx, Flow::Interview);
                self.reply(ctx, prompts::NOT_FOUND).await
            }
            Err(e) => {
                tracing::error!(user_id = ctx.user_id, "Failed to save interview: {}", e);
                self.reply(ctx, prompts::SAVE_FAILED).await
            }
        }
    }

    pub(super) async fn reject_interview(&mut self, ctx: Ctx) -> Result<()> {
        let pending = self
            .sessions
            .buffer(ctx.user_id)
            .is_some_and(|b| b.pending_interview.is_some());
        if !pending {
            return self.reply(ctx, prompts::NOTHING_TO_CONFIRM).await;
        }

        tracing::info!(user_id = ctx.user_id, "Interview rejected by applicant");
        self.finish_flow(ctx, Flow::Interview);
        self.reply(ctx, prompts::INTERVIEW_REJECTED).await
    }

    // ── Address ─────────────────────────────────────────────────────

    pub(super) async fn on_address(&mut self, ctx: Ctx, input: Input<'_>) -> Result<()> {
        let Some(address) = input.text().map(str::trim).filter(|a| !a.is_empty()) else {
            return self.reply(ctx, prompts::BAD_ADDRESS).await;
        };

        self.sessions.buffer_mut(ctx.user_id, ctx.now).address = Some(address.to_string());
        self.sessions.transition(ctx.user_id, Stage::AddressConfirm, ctx.now)?;
        self.reply(ctx, prompts::address_confirmation(address)).await
    }

    pub(super) async fn confirm_address(&mut self, ctx: Ctx) -> Result<()> {
        let address = self
            .sessions
            .buffer(ctx.user_id)
            .and_then(|b| b.address.clone());
        let Some(address) = address else {
            return self.reply(ctx, prompts::NOTHING_TO_CONFIRM).await;
        };

        match self.store.set_address(ctx.user_id, &address).await {
            Ok(true) => {
                tracing::info!(user_id = ctx.user_id, "Address confirmed");
                self.finish_flow(ctx, Flow::Lesson);
                self.reply(ctx, prompts::ADDRESS_CONFIRMED).await
            }
            Ok(false) => {
                self.finish_flow(ctx, Flow::Lesson);
                self.reply(ctx, prompts::NOT_FOUND).await
            }
            Err(e) => {
                tracing::error!(user_id = ctx.user_id, "Failed to save address: {}", e);
                self.reply(ctx, prompts::SAVE_FAILED).await
            }
        }
    }

    pub(super) async fn edit_address(&mut self, ctx: Ctx) -> Result<()> {
        let has_address = self
            .sessions
            .buffer(ctx.user_id)
            .is_some_and(|b| b.address.is_some());
        let in_other_flow = self
            .sessions
            .stage(ctx.user_id)
            .is_some_and(|stage| stage.flow() != Flow::Lesson);
        if !has_address || in_other_flow {
            return self.reply(ctx, prompts::NOTHING_TO_CONFIRM).await;
        }

        self.sessions.buffer_mut(ctx.user_id, ctx.now).address = None;
        self.sessions.enter(ctx.user_id, Stage::AddressCollect, ctx.now);
        self.reply(ctx, prompts::ASK_ADDRESS_AGAIN).await
    }

    /// Drop the buffered fields of `flow` and, if the user is still inside
    /// that flow, its stage.
    fn finish_flow(&mut self, ctx: Ctx, flow: Flow) {
        self.sessions.reset(ctx.user_id, flow);
        if self
            .sessions
            .stage(ctx.user_id)
            .is_none_or(|stage| stage.flow() == flow)
        {
            self.sessions.clear(ctx.user_id);
        }
    }
}
