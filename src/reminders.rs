//! Periodic reminder for applicants who registered but never finished the interview.
//!
//! The sweep only reads the record store and sends messages. It never
//! touches session state, so it runs on its own task next to the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::channels::{Messenger, OutgoingReply};
use crate::error::DatabaseError;
use crate::intake::prompts;
use crate::store::Database;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub selected: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct ReminderSweep {
    store: Arc<dyn Database>,
    messenger: Arc<dyn Messenger>,
    threshold: chrono::Duration,
}

impl ReminderSweep {
    pub fn new(
        store: Arc<dyn Database>,
        messenger: Arc<dyn Messenger>,
        threshold: Duration,
    ) -> Self {
        Self {
            store,
            messenger,
            threshold: chrono::Duration::from_std(threshold)
                .unwrap_or_else(|_| chrono::Duration::days(36_500)),
        }
    }

    /// Remind every applicant registered at least `threshold` before `now`
    /// whose interview is still missing.
    ///
    /// Nothing is recorded about sent reminders, so an applicant is reminded
    /// on every sweep until the interview is confirmed.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, DatabaseError> {
        let pending = self
            .store
            .list_pending_interviews(now - self.threshold)
            .await?;

        let mut report = SweepReport {
            selected: pending.len(),
            ..Default::default()
        };

        for applicant in pending {
            match self
                .messenger
                .send(applicant.id, OutgoingReply::text(prompts::REMINDER))
                .await
            {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(user_id = applicant.id, "Failed to send reminder: {}", e);
                }
            }
            tokio::task::yield_now().await;
        }

        if report.selected > 0 {
            tracing::info!(
                selected = report.selected,
                sent = report.sent,
                failed = report.failed,
                "Reminder sweep finished"
            );
        }
        Ok(report)
    }
}

/// Run the sweep every `interval`, starting immediately.
pub fn spawn_reminder_ticker(
    sweep: Arc<ReminderSweep>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = sweep.run_once(Utc::now()).await {
                tracing::error!("Reminder sweep failed: {}", e);
            }
        }
    })
}
