// realtime-server/src/dispatch/mailer.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::MailConfig;
use serde::Serialize;

use crate::error::MailError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail capability
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Submits mail as JSON to an HTTP relay
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Option<String>, from: String, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let body = RelayRequest {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.body,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }

        tracing::debug!("Mail relay accepted message for {}", mail.to);
        Ok(())
    }
}

/// Used when no relay is configured
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        tracing::error!("Mail not configured. Skipping message to {}: {}", mail.to, mail.subject);
        Err(MailError::NotConfigured)
    }
}

/// Pick the mail transport once at startup
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    let Some(endpoint) = config.relay_url.clone() else {
        tracing::warn!("No mail relay configured; emergency mail is disabled");
        return Arc::new(DisabledMailer);
    };

    match HttpMailer::new(
        endpoint,
        config.api_key.clone(),
        config.from.clone(),
        Duration::from_secs(config.timeout_secs),
    ) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            tracing::error!("Failed to build mail relay client: {}", e);
            Arc::new(DisabledMailer)
        }
    }
}
