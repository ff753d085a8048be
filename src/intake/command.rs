//! Slash commands recognised by the bot.

/// A `/command`, with any `@botname` suffix and arguments ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Welcome menu; drops any session.
    Start,
    /// Begin the interview.
    Step2,
    /// Begin the lesson video and address stage.
    Step3,
    /// Report lesson content, 1..=3.
    Lesson(u8),
    Unknown(String),
}

impl Command {
    /// Parse a message as a command. Returns `None` for non-command text.
    pub fn parse(text: &str) -> Option<Command> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name).to_lowercase();

        Some(match name.as_str() {
            "start" => Command::Start,
            "step2" => Command::Step2,
            "step3" => Command::Step3,
            "lesson1" => Command::Lesson(1),
            "lesson2" => Command::Lesson(2),
            "lesson3" => Command::Lesson(3),
            _ => Command::Unknown(name),
        })
    }
}
