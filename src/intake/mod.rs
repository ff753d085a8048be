//! Applicant intake: stages, validation, session state and the dispatcher.

pub mod command;
pub mod dispatcher;
mod handlers;
pub mod media;
pub mod prompts;
pub mod session;
pub mod stage;
pub mod validation;

pub use command::Command;
pub use dispatcher::{Dispatcher, Input};
pub use media::{MediaStore, VideoPurpose};
pub use session::{AnswerBuffer, PendingInterview, SessionError, SessionStore};
pub use stage::{Flow, Stage};
