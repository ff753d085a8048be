//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Root directory for downloaded video notes.
    pub media_dir: PathBuf,
    pub reminder: ReminderConfig,
    /// Sessions with no activity for this long are evicted.
    pub session_idle_timeout: Duration,
    /// Port for the admin HTTP API. Disabled when `None`.
    pub admin_port: Option<u16>,
}

/// Reminder sweep configuration.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// How often the sweep runs.
    pub interval: Duration,
    /// Records registered more recently than this are left alone.
    pub threshold: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),  // 1 hour
            threshold: Duration::from_secs(24 * 60), // 24 minutes
        }
    }
}

impl BotConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;

        let db_path = lookup("INTAKE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/intake.db"));
        let media_dir = lookup("INTAKE_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./media"));

        let defaults = ReminderConfig::default();
        let interval = match parse_u64(&lookup, "INTAKE_REMINDER_INTERVAL_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.interval,
        };
        let threshold = parse_minutes(&lookup, "INTAKE_REMINDER_THRESHOLD_MINS")?
            .unwrap_or(defaults.threshold);
        let session_idle_timeout = parse_minutes(&lookup, "INTAKE_SESSION_IDLE_MINS")?
            .unwrap_or(Duration::from_secs(24 * 60 * 60));

        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "INTAKE_REMINDER_INTERVAL_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }
        if interval.as_secs() > MAX_MINUTES * 60 {
            return Err(ConfigError::InvalidValue {
                key: "INTAKE_REMINDER_INTERVAL_SECS".into(),
                message: format!("must be at most {} seconds", MAX_MINUTES * 60),
            });
        }

        let admin_port = match lookup("INTAKE_ADMIN_PORT") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: "INTAKE_ADMIN_PORT".into(),
                    message: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            db_path,
            media_dir,
            reminder: ReminderConfig {
                interval,
                threshold,
            },
            session_idle_timeout,
            admin_port,
        })
    }
}

/// Upper bound for minute-valued settings (100 years). Keeps `now - value`
/// inside chrono's range.
const MAX_MINUTES: u64 = 100 * 365 * 24 * 60;

fn parse_minutes<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(mins) = parse_u64(lookup, key)? else {
        return Ok(None);
    };
    if mins > MAX_MINUTES {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be at most {MAX_MINUTES} minutes"),
        });
    }
    Ok(Some(Duration::from_secs(mins * 60)))
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
