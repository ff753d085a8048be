//! Session store: which stage each user is in, plus their uncommitted answers.
//!
//! Owned by the dispatcher and mutated through `&mut self` only, so every
//! change happens on the single event-handling task. Nothing here survives a
//! restart.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::store::UserId;

use super::stage::{Flow, Stage};

/// Interview summary waiting for the confirm/reject button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInterview {
    pub summary: String,
    pub video_path: Option<String>,
}

/// Transient per-user answers, committed to the record store or discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerBuffer {
    pub full_name: Option<String>,
    pub city: Option<String>,
    pub answers: [Option<String>; 5],
    pub pending_interview: Option<PendingInterview>,
    pub address: Option<String>,
}

impl AnswerBuffer {
    /// All five answers, if every question has been answered.
    pub fn completed_answers(&self) -> Option<[String; 5]> {
        let [a, b, c, d, e] = &self.answers;
        Some([
            a.clone()?,
            b.clone()?,
            c.clone()?,
            d.clone()?,
            e.clone()?,
        ])
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn reset_for(&mut self, flow: Flow) {
        match flow {
            Flow::Identity => {
                self.full_name = None;
                self.city = None;
            }
            Flow::Interview => {
                self.answers = Default::default();
                self.pending_interview = None;
            }
            Flow::Lesson => {
                self.address = None;
            }
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("user {0} has no active stage")]
    Idle(UserId),

    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },
}

#[derive(Debug)]
struct Session {
    stage: Option<Stage>,
    buffer: AnswerBuffer,
    last_activity: DateTime<Utc>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            stage: None,
            buffer: AnswerBuffer::default(),
            last_activity: now,
        }
    }
}

/// In-memory map from user id to stage and answer buffer.
///
/// A user with no stage is idle. A buffer may outlive its stage while a
/// confirmation button is still pending.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<UserId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the first stage of `flow`, replacing any active stage and
    /// resetting the buffer fields that flow collects.
    pub fn begin(&mut self, user_id: UserId, flow: Flow, now: DateTime<Utc>) -> Stage {
        let session = self
            .sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(now));
        let stage = flow.first_stage();
        session.stage = Some(stage);
        session.buffer.reset_for(flow);
        session.last_activity = now;
        tracing::debug!(user_id, stage = %stage, "Session started");
        stage
    }

    /// Current stage, or `None` when idle.
    pub fn stage(&self, user_id: UserId) -> Option<Stage> {
        self.sessions.get(&user_id).and_then(|s| s.stage)
    }

    /// Move to `target`, which must be a valid transition from the current stage.
    pub fn transition(
        &mut self,
        user_id: UserId,
        target: Stage,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&user_id)
            .ok_or(SessionError::Idle(user_id))?;
        let current = session.stage.ok_or(SessionError::Idle(user_id))?;
        if !current.can_transition_to(target) {
            return Err(SessionError::InvalidTransition {
                from: current,
                to: target,
            });
        }
        session.stage = Some(target);
        session.last_activity = now;
        tracing::debug!(user_id, from = %current, to = %target, "Stage advanced");
        Ok(())
    }

    /// Put the user directly into `stage`, skipping the transition check.
    /// Used when a button press reopens a stage whose entry was already cleared.
    pub fn enter(&mut self, user_id: UserId, stage: Stage, now: DateTime<Utc>) {
        let session = self
            .sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(now));
        session.stage = Some(stage);
        session.last_activity = now;
        tracing::debug!(user_id, stage = %stage, "Stage reopened");
    }

    /// Leave the current stage. The buffer is kept if it still holds data.
    pub fn clear(&mut self, user_id: UserId) {
        if let Some(session) = self.sessions.get_mut(&user_id) {
            session.stage = None;
            if session.buffer.is_empty() {
                self.sessions.remove(&user_id);
            }
        }
    }

    /// Drop the buffered fields collected by `flow`. The stage is untouched.
    pub fn reset(&mut self, user_id: UserId, flow: Flow) {
        if let Some(session) = self.sessions.get_mut(&user_id) {
            session.buffer.reset_for(flow);
        }
    }

    /// Drop the stage and everything buffered for this user.
    pub fn discard(&mut self, user_id: UserId) {
        self.sessions.remove(&user_id);
    }

    pub fn buffer(&self, user_id: UserId) -> Option<&AnswerBuffer> {
        self.sessions.get(&user_id).map(|s| &s.buffer)
    }

    /// Buffer for this user, created on demand.
    pub fn buffer_mut(&mut self, user_id: UserId, now: DateTime<Utc>) -> &mut AnswerBuffer {
        let session = self
            .sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(now));
        session.last_activity = now;
        &mut session.buffer
    }

    /// Evict sessions with no activity for longer than `ttl`.
    /// Returns the number of evicted sessions.
    pub fn expire_idle(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|user_id, session| {
            let keep = now - session.last_activity <= ttl;
            if !keep {
                tracing::info!(user_id = *user_id, stage = ?session.stage, "Session expired");
            }
            keep
        });
        before - self.sessions.len()
    }

    /// Number of users currently in a stage.
    pub fn active_count(&self) -> usize {
        self.sessions.values().filter(|s| s.stage.is_some()).count()
    }

    /// Number of users with any session data.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
