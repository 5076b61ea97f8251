// realtime-server/src/error.rs
use thiserror::Error;

/// Failure to hand an alert to the mail transport
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport not configured")]
    NotConfigured,

    #[error("mail relay unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),

    #[error("mail relay timed out after {0}s")]
    Timeout(u64),
}
