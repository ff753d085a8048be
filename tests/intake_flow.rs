//! End-to-end tests for the intake dispatcher.
//!
//! Each test drives a real `Dispatcher` over an in-memory libSQL store and a
//! recording messenger, and checks replies, stages and persisted records.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

use intake_bot::channels::{ChatId, EventKind, InboundEvent, Keyboard, Messenger, OutgoingReply};
use intake_bot::error::{ChannelError, DatabaseError};
use intake_bot::intake::prompts;
use intake_bot::intake::{Dispatcher, MediaStore, Stage};
use intake_bot::store::{Applicant, Database, LibSqlBackend, NewApplicant, UserId};

const USER: UserId = 4242;

const ANSWERS: [&str; 5] = [
    "Два года вёл кружок в школе",
    "Собирал роботов на Arduino",
    "Омск и Новосибирск",
    "Около десяти часов",
    "Терпение и умение объяснять",
];

/// Messenger double that records every reply and writes downloads to disk.
#[derive(Default)]
struct RecordingMessenger {
    replies: Mutex<Vec<(ChatId, OutgoingReply)>>,
    answered: Mutex<Vec<String>>,
    fail_downloads: AtomicBool,
}

impl RecordingMessenger {
    fn take(&self) -> Vec<OutgoingReply> {
        self.replies
            .lock()
            .unwrap()
            .drain(..)
            .map(|(_, reply)| reply)
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, chat_id: ChatId, reply: OutgoingReply) -> Result<(), ChannelError> {
        self.replies.lock().unwrap().push((chat_id, reply));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), ChannelError> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(ChannelError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: "connection reset".into(),
            });
        }
        let parent = dest.parent().unwrap();
        tokio::fs::create_dir_all(parent).await.unwrap();
        tokio::fs::write(dest, file_id.as_bytes()).await.unwrap();
        Ok(())
    }
}

/// Store double over a real backend whose confirmation writes can be made to fail.
struct FlakyStore {
    inner: LibSqlBackend,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn check_writes(&self) -> Result<(), DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Query("database is locked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for FlakyStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.inner.init_schema().await
    }

    async fn insert_applicant(
        &self,
        applicant: &NewApplicant,
        registered_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.inner.insert_applicant(applicant, registered_at).await
    }

    async fn get_applicant(&self, id: UserId) -> Result<Option<Applicant>, DatabaseError> {
        self.inner.get_applicant(id).await
    }

    async fn complete_interview(
        &self,
        id: UserId,
        interview_text: &str,
        video_path: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        self.check_writes()?;
        self.inner
            .complete_interview(id, interview_text, video_path)
            .await
    }

    async fn set_address(&self, id: UserId, address: &str) -> Result<bool, DatabaseError> {
        self.check_writes()?;
        self.inner.set_address(id, address).await
    }

    async fn list_pending_interviews(
        &self,
        registered_before: DateTime<Utc>,
    ) -> Result<Vec<Applicant>, DatabaseError> {
        self.inner.list_pending_interviews(registered_before).await
    }
}

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<FlakyStore>,
    messenger: Arc<RecordingMessenger>,
    _media: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(FlakyStore {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            fail_writes: AtomicBool::new(false),
        });
        let messenger = Arc::new(RecordingMessenger::default());
        let media = TempDir::new().unwrap();
        let dispatcher = Dispatcher::new(
            store.clone(),
            messenger.clone(),
            MediaStore::new(media.path()),
            std::time::Duration::from_secs(3600),
        );
        Self {
            dispatcher,
            store,
            messenger,
            _media: media,
        }
    }

    /// Handle one event and return the replies it produced.
    async fn send(&mut self, event: InboundEvent) -> Vec<OutgoingReply> {
        self.dispatcher.handle(event).await.unwrap();
        self.messenger.take()
    }

    async fn text(&mut self, text: &str) -> Vec<OutgoingReply> {
        self.send(InboundEvent::text(USER, text)).await
    }

    /// Text of the single reply produced by `text`.
    async fn reply_to(&mut self, text: &str) -> String {
        let replies = self.text(text).await;
        assert_eq!(replies.len(), 1, "expected one reply to {text:?}: {replies:?}");
        replies[0].text.clone()
    }

    fn stage(&self) -> Option<Stage> {
        self.dispatcher.sessions().stage(USER)
    }

    async fn register(&mut self) {
        self.text("Трудоустройство").await;
        self.text("Иванов Иван Иванович").await;
        self.text("Омск").await;
        assert_eq!(self.reply_to("01.01.1990").await, prompts::IDENTITY_SAVED);
    }

    /// Run `/step2` through the five answers, leaving the user at the video stage.
    async fn answer_interview(&mut self) {
        assert_eq!(self.reply_to("/step2").await, prompts::QUESTIONS[0]);
        for (i, answer) in ANSWERS.iter().enumerate() {
            let reply = self.reply_to(answer).await;
            if i + 1 < ANSWERS.len() {
                assert_eq!(reply, prompts::QUESTIONS[i + 1]);
            } else {
                assert_eq!(reply, prompts::ASK_VERIFICATION_VIDEO);
            }
        }
        assert_eq!(self.stage(), Some(Stage::InterviewVideo));
    }
}

fn expected_summary() -> String {
    prompts::interview_summary(&ANSWERS.map(String::from))
}

// ── Identity ────────────────────────────────────────────────────────────

#[tokio::test]
async fn identity_survey_creates_record() {
    let mut h = Harness::new().await;

    assert_eq!(h.reply_to("Трудоустройство").await, prompts::ASK_FULL_NAME);
    assert_eq!(h.stage(), Some(Stage::IdentityName));

    let replies = h.text("Иванов Иван Иванович").await;
    assert_eq!(replies[0].text, prompts::ASK_CITY);
    assert!(matches!(replies[0].keyboard, Some(Keyboard::Choices(_))));

    let replies = h.text("Омск").await;
    assert_eq!(replies[0].text, prompts::ASK_BIRTH_DATE);
    assert_eq!(replies[0].keyboard, Some(Keyboard::Remove));

    assert_eq!(h.reply_to("01.01.1990").await, prompts::IDENTITY_SAVED);
    assert_eq!(h.stage(), None);

    let record = h.store.get_applicant(USER).await.unwrap().unwrap();
    assert_eq!(record.full_name, "Иванов Иван Иванович");
    assert_eq!(record.city, "Омск");
    assert_eq!(record.birth_date, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
    assert!(record.interview_text.is_none());
    assert!(record.registration_time <= Utc::now());
}

#[tokio::test]
async fn invalid_identity_input_reprompts_in_place() {
    let mut h = Harness::new().await;
    h.text("трудоустройство").await;

    for bad in ["иванов Иван Иванович", "Иванов Иван", "Ivanov Ivan Ivanovich"] {
        assert_eq!(h.reply_to(bad).await, prompts::BAD_FULL_NAME);
        assert_eq!(h.stage(), Some(Stage::IdentityName));
    }
    h.text("Иванов Иван Иванович").await;

    assert_eq!(h.reply_to("Тула").await, prompts::BAD_CITY);
    assert_eq!(h.stage(), Some(Stage::IdentityCity));
    h.text("Казань").await;

    for bad in ["31.02.2020", "1.1.1990", "завтра"] {
        assert_eq!(h.reply_to(bad).await, prompts::BAD_BIRTH_DATE);
        assert_eq!(h.stage(), Some(Stage::IdentityBirthDate));
    }
    assert!(!h.store.applicant_exists(USER).await.unwrap());
}

#[tokio::test]
async fn second_application_is_refused() {
    let mut h = Harness::new().await;
    h.register().await;

    assert_eq!(h.reply_to("Трудоустройство").await, prompts::ALREADY_APPLIED);
    assert_eq!(h.stage(), None);
}

#[tokio::test]
async fn record_created_mid_survey_is_not_overwritten() {
    let mut h = Harness::new().await;
    h.text("Трудоустройство").await;
    h.text("Петров Пётр Петрович").await;
    h.text("Самара").await;

    let existing = NewApplicant {
        id: USER,
        full_name: "Иванов Иван Иванович".into(),
        city: "Омск".into(),
        birth_date: NaiveDate::from_ymd_opt(1980, 5, 5).unwrap(),
    };
    h.store.insert_applicant(&existing, Utc::now()).await.unwrap();

    assert_eq!(h.reply_to("02.02.1992").await, prompts::ALREADY_APPLIED);
    assert_eq!(h.stage(), None);
    let record = h.store.get_applicant(USER).await.unwrap().unwrap();
    assert_eq!(record.full_name, "Иванов Иван Иванович");
    assert_eq!(record.city, "Омск");
}

// ── Interview ───────────────────────────────────────────────────────────

#[tokio::test]
async fn confirmed_interview_is_persisted() {
    let mut h = Harness::new().await;
    h.register().await;
    h.answer_interview().await;

    let replies = h.send(InboundEvent::video_note(USER, "vid-1")).await;
    assert_eq!(replies.len(), 2);
    assert_eq!(
        replies[0].text,
        format!("{}{}", prompts::ANSWERS_HEADER, expected_summary())
    );
    assert_eq!(replies[1].text, prompts::CONFIRM_INTERVIEW);
    assert!(matches!(replies[1].keyboard, Some(Keyboard::Inline(_))));
    assert_eq!(h.stage(), None);

    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_INTERVIEW_CONFIRM))
        .await;
    assert_eq!(replies[0].text, prompts::INTERVIEW_CONFIRMED);

    let record = h.store.get_applicant(USER).await.unwrap().unwrap();
    assert_eq!(record.interview_text.as_deref(), Some(expected_summary().as_str()));
    assert!(record.interview_completed());
    let video_path = record.video_path.unwrap();
    assert!(video_path.ends_with("иванов_иван_иванович/verification_video.mp4"));
    assert_eq!(std::fs::read(&video_path).unwrap(), b"vid-1");
}

#[tokio::test]
async fn rejected_interview_is_not_persisted() {
    let mut h = Harness::new().await;
    h.register().await;
    h.answer_interview().await;
    h.send(InboundEvent::video_note(USER, "vid-1")).await;

    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_INTERVIEW_REJECT))
        .await;
    assert_eq!(replies[0].text, prompts::INTERVIEW_REJECTED);

    let record = h.store.get_applicant(USER).await.unwrap().unwrap();
    assert!(record.interview_text.is_none());

    // The pending summary is gone, so a late confirm has nothing to save.
    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_INTERVIEW_CONFIRM))
        .await;
    assert_eq!(replies[0].text, prompts::NOTHING_TO_CONFIRM);
}

#[tokio::test]
async fn confirm_without_record_reports_not_found() {
    let mut h = Harness::new().await;
    h.answer_interview().await;
    h.send(InboundEvent::video_note(USER, "vid-2")).await;

    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_INTERVIEW_CONFIRM))
        .await;
    assert_eq!(replies[0].text, prompts::NOT_FOUND);
    assert!(h.dispatcher.sessions().buffer(USER).is_none());
}

#[tokio::test]
async fn failed_interview_save_keeps_pending_summary() {
    let mut h = Harness::new().await;
    h.register().await;
    h.answer_interview().await;
    h.send(InboundEvent::video_note(USER, "vid-4")).await;

    h.store.fail_writes.store(true, Ordering::SeqCst);
    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_INTERVIEW_CONFIRM))
        .await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, prompts::SAVE_FAILED);

    let pending = h
        .dispatcher
        .sessions()
        .buffer(USER)
        .and_then(|b| b.pending_interview.clone())
        .unwrap();
    assert_eq!(pending.summary, expected_summary());
    assert!(
        !h.store
            .get_applicant(USER)
            .await
            .unwrap()
            .unwrap()
            .interview_completed()
    );

    // Pressing the button again once the store recovers saves the same summary.
    h.store.fail_writes.store(false, Ordering::SeqCst);
    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_INTERVIEW_CONFIRM))
        .await;
    assert_eq!(replies[0].text, prompts::INTERVIEW_CONFIRMED);
    let record = h.store.get_applicant(USER).await.unwrap().unwrap();
    assert_eq!(record.interview_text.as_deref(), Some(expected_summary().as_str()));
}

#[tokio::test]
async fn confirm_with_nothing_pending() {
    let mut h = Harness::new().await;
    h.register().await;

    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_INTERVIEW_CONFIRM))
        .await;
    assert_eq!(replies[0].text, prompts::NOTHING_TO_CONFIRM);
    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_INTERVIEW_REJECT))
        .await;
    assert_eq!(replies[0].text, prompts::NOTHING_TO_CONFIRM);
}

#[tokio::test]
async fn video_stage_requires_video_note() {
    let mut h = Harness::new().await;
    h.register().await;
    h.answer_interview().await;

    assert_eq!(h.reply_to("вот моё видео").await, prompts::NEED_VIDEO_NOTE);
    assert_eq!(h.stage(), Some(Stage::InterviewVideo));

    let video = InboundEvent {
        user_id: USER,
        chat_id: USER,
        kind: EventKind::Video {
            file_id: "plain-video".into(),
        },
    };
    let replies = h.send(video).await;
    assert_eq!(replies[0].text, prompts::NEED_VIDEO_NOTE);
    assert_eq!(h.stage(), Some(Stage::InterviewVideo));
}

#[tokio::test]
async fn failed_download_keeps_stage() {
    let mut h = Harness::new().await;
    h.register().await;
    h.answer_interview().await;

    h.messenger.fail_downloads.store(true, Ordering::SeqCst);
    let replies = h.send(InboundEvent::video_note(USER, "vid-3")).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, prompts::VIDEO_SAVE_FAILED);
    assert_eq!(h.stage(), Some(Stage::InterviewVideo));

    h.messenger.fail_downloads.store(false, Ordering::SeqCst);
    let replies = h.send(InboundEvent::video_note(USER, "vid-3")).await;
    assert_eq!(replies.len(), 2);
    assert_eq!(h.stage(), None);
}

#[tokio::test]
async fn empty_answer_is_rejected() {
    let mut h = Harness::new().await;
    h.text("/step2").await;
    assert_eq!(h.reply_to("   ").await, prompts::BAD_ANSWER);
    assert_eq!(h.stage(), Some(Stage::InterviewQ1));
}

// ── Lesson & address ────────────────────────────────────────────────────

#[tokio::test]
async fn address_flow_with_edit() {
    let mut h = Harness::new().await;
    h.register().await;

    assert_eq!(h.reply_to("/step3").await, prompts::ASK_LESSON_VIDEO);
    assert_eq!(h.stage(), Some(Stage::LessonVideo));

    let replies = h.send(InboundEvent::video_note(USER, "lesson")).await;
    assert_eq!(replies[0].text, prompts::ASK_ADDRESS);
    assert_eq!(h.stage(), Some(Stage::AddressCollect));

    let replies = h.text("Омск, ул. Ленина, 1").await;
    assert!(replies[0].text.contains("Омск, ул. Ленина, 1"));
    assert_eq!(h.stage(), Some(Stage::AddressConfirm));

    assert_eq!(h.reply_to("да").await, prompts::USE_ADDRESS_BUTTONS);

    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_ADDRESS_EDIT))
        .await;
    assert_eq!(replies[0].text, prompts::ASK_ADDRESS_AGAIN);
    assert_eq!(h.stage(), Some(Stage::AddressCollect));

    h.text("Омск, ул. Мира, 12, кв. 3").await;
    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_ADDRESS_CONFIRM))
        .await;
    assert_eq!(replies[0].text, prompts::ADDRESS_CONFIRMED);
    assert_eq!(h.stage(), None);

    let record = h.store.get_applicant(USER).await.unwrap().unwrap();
    assert_eq!(record.address.as_deref(), Some("Омск, ул. Мира, 12, кв. 3"));
    assert!(h.dispatcher.sessions().buffer(USER).is_none());
}

#[tokio::test]
async fn failed_address_save_keeps_address() {
    let mut h = Harness::new().await;
    h.register().await;
    h.text("/step3").await;
    h.send(InboundEvent::video_note(USER, "lesson")).await;
    h.text("Казань, ул. Баумана, 7").await;

    h.store.fail_writes.store(true, Ordering::SeqCst);
    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_ADDRESS_CONFIRM))
        .await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, prompts::SAVE_FAILED);
    assert_eq!(h.stage(), Some(Stage::AddressConfirm));
    let buffered = h
        .dispatcher
        .sessions()
        .buffer(USER)
        .and_then(|b| b.address.clone());
    assert_eq!(buffered.as_deref(), Some("Казань, ул. Баумана, 7"));

    h.store.fail_writes.store(false, Ordering::SeqCst);
    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_ADDRESS_CONFIRM))
        .await;
    assert_eq!(replies[0].text, prompts::ADDRESS_CONFIRMED);
    let record = h.store.get_applicant(USER).await.unwrap().unwrap();
    assert_eq!(record.address.as_deref(), Some("Казань, ул. Баумана, 7"));
}

#[tokio::test]
async fn address_edit_does_not_interrupt_interview() {
    let mut h = Harness::new().await;
    h.register().await;
    h.text("/step3").await;
    h.send(InboundEvent::video_note(USER, "lesson")).await;
    h.text("Омск, ул. Ленина, 1").await;

    h.text("/step2").await;
    assert_eq!(h.stage(), Some(Stage::InterviewQ1));

    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_ADDRESS_EDIT))
        .await;
    assert_eq!(replies[0].text, prompts::NOTHING_TO_CONFIRM);
    assert_eq!(h.stage(), Some(Stage::InterviewQ1));
    assert_eq!(h.reply_to(ANSWERS[0]).await, prompts::QUESTIONS[1]);
}

#[tokio::test]
async fn address_confirm_without_record() {
    let mut h = Harness::new().await;
    h.text("/step3").await;
    h.send(InboundEvent::video_note(USER, "lesson")).await;
    h.text("Самара, ул. Победы, 5").await;

    let replies = h
        .send(InboundEvent::callback(USER, prompts::CB_ADDRESS_CONFIRM))
        .await;
    assert_eq!(replies[0].text, prompts::NOT_FOUND);
    assert_eq!(h.stage(), None);
}

// ── Routing ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn idle_user_gets_help() {
    let mut h = Harness::new().await;
    assert_eq!(h.reply_to("привет").await, prompts::HELP);
    assert_eq!(h.reply_to("/unknown").await, prompts::HELP);
    let replies = h.send(InboundEvent::video_note(USER, "stray")).await;
    assert_eq!(replies[0].text, prompts::HELP);
    assert_eq!(h.stage(), None);
}

#[tokio::test]
async fn salary_and_lessons_do_not_change_stage() {
    let mut h = Harness::new().await;
    h.text("/step2").await;

    assert_eq!(h.reply_to("ЗАРПЛАТА").await, prompts::SALARY);
    assert_eq!(h.reply_to("/lesson2").await, prompts::LESSON2_TEXT);
    assert_eq!(h.stage(), Some(Stage::InterviewQ1));
}

#[tokio::test]
async fn idle_session_expires() {
    let mut h = Harness::new().await;
    h.text("/step2").await;
    h.text(ANSWERS[0]).await;
    assert_eq!(h.stage(), Some(Stage::InterviewQ2));

    assert_eq!(h.dispatcher.expire_idle_sessions(Utc::now()), 0);
    assert_eq!(h.stage(), Some(Stage::InterviewQ2));

    let later = Utc::now() + chrono::Duration::hours(2);
    assert_eq!(h.dispatcher.expire_idle_sessions(later), 1);
    assert_eq!(h.stage(), None);
    assert!(h.dispatcher.sessions().is_empty());
    assert_eq!(h.reply_to(ANSWERS[1]).await, prompts::HELP);
}

#[tokio::test]
async fn start_discards_session() {
    let mut h = Harness::new().await;
    h.text("/step2").await;
    h.text(ANSWERS[0]).await;

    let replies = h.text("/start").await;
    assert_eq!(replies[0].text, prompts::START_TEXT);
    assert!(matches!(replies[0].keyboard, Some(Keyboard::Choices(_))));
    assert_eq!(h.stage(), None);
    assert!(h.dispatcher.sessions().is_empty());
}

#[tokio::test]
async fn callbacks_are_always_acknowledged() {
    let mut h = Harness::new().await;

    let replies = h.send(InboundEvent::callback(USER, "bogus:payload")).await;
    assert!(replies.is_empty());
    h.send(InboundEvent::callback(USER, prompts::CB_ADDRESS_EDIT)).await;

    let answered = h.messenger.answered.lock().unwrap().clone();
    assert_eq!(answered, vec![format!("cb-{USER}"), format!("cb-{USER}")]);
}
