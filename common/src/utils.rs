// Common Crate - utils.rs
use chrono::Utc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Setup tracing for consistent logging across services.
/// `APP_LOG_LEVEL` selects the max level (default INFO).
pub fn setup_tracing() {
    let level = std::env::var("APP_LOG_LEVEL")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Current wall-clock time in epoch seconds
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}
