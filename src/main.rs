use std::sync::Arc;

use anyhow::Context;

use intake_bot::channels::{Messenger, TelegramChannel};
use intake_bot::config::BotConfig;
use intake_bot::intake::{Dispatcher, MediaStore};
use intake_bot::reminders::{self, ReminderSweep};
use intake_bot::routes::{AdminState, admin_routes};
use intake_bot::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("failed to load configuration")?;

    eprintln!("🤖 Intake Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Media: {}", config.media_dir.display());
    eprintln!(
        "   Reminders: every {}s, after {} min",
        config.reminder.interval.as_secs(),
        config.reminder.threshold.as_secs() / 60
    );

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    // ── Telegram ─────────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramChannel::new(config.bot_token.clone()));
    if let Err(e) = telegram.health_check().await {
        tracing::warn!("Telegram health check failed: {}", e);
    }
    let messenger: Arc<dyn Messenger> = telegram.clone();

    // ── Reminder ticker ──────────────────────────────────────────────────
    let sweep = Arc::new(ReminderSweep::new(
        Arc::clone(&db),
        Arc::clone(&messenger),
        config.reminder.threshold,
    ));
    let reminder_handle = reminders::spawn_reminder_ticker(sweep, config.reminder.interval);

    // ── Admin API ────────────────────────────────────────────────────────
    if let Some(port) = config.admin_port {
        let app = admin_routes(AdminState {
            store: Arc::clone(&db),
            reminder_threshold: chrono::Duration::from_std(config.reminder.threshold)
                .context("reminder threshold out of range")?,
        });
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind admin port {port}"))?;
        eprintln!("   Admin API: http://0.0.0.0:{}/health", port);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Admin server stopped: {}", e);
            }
        });
    }

    // ── Dispatcher ───────────────────────────────────────────────────────
    let dispatcher = Dispatcher::new(
        db,
        messenger,
        MediaStore::new(config.media_dir.clone()),
        config.session_idle_timeout,
    );
    dispatcher.run(telegram.start()).await;

    reminder_handle.abort();
    Ok(())
}
