//! Intake Bot: Telegram intake for robotics instructor applicants.

pub mod channels;
pub mod config;
pub mod error;
pub mod intake;
pub mod reminders;
pub mod routes;
pub mod store;
