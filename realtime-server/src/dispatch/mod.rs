// realtime-server/src/dispatch/mod.rs
//! Emergency side effects fired once when an SOS session opens.
pub mod mailer;
pub mod resources;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::geo::Coordinates;
use common::models::{EnvironmentalData, Identity, Resource, SosRecord};
use common::{MailConfig, ServerEvent, SosStarted};

use crate::error::MailError;
use mailer::{mailer_from_config, Mailer, OutgoingMail};
use resources::ResourceDirectory;

/// Immutable view of a freshly opened SOS session
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyAlert {
    pub sos_id: String,
    pub owner: Identity,
    pub position: Option<Coordinates>,
    pub started_at: i64,
}

impl From<&SosRecord> for EmergencyAlert {
    fn from(record: &SosRecord) -> Self {
        Self {
            sos_id: record.sos_id.clone(),
            owner: record.owner.clone(),
            position: record.last_position(),
            started_at: record.start_time,
        }
    }
}

/// What the caller gets back in `sos_started`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub resources: Vec<Resource>,
    pub environmental: EnvironmentalData,
    /// Whether the off-system contact was reached
    pub notified: bool,
}

impl DispatchReport {
    pub fn into_started_event(self, sos_id: String) -> ServerEvent {
        let safe_zones = self
            .resources
            .iter()
            .filter(|r| r.is_safe_zone())
            .cloned()
            .collect();

        ServerEvent::SosStarted(SosStarted {
            sos_id,
            message: "SOS activated. Help is on the way.".to_string(),
            resources: self.resources,
            safe_zones,
            environmental_data: self.environmental,
        })
    }
}

/// Called once per opened SOS session. Must not fail; problems degrade the report.
#[async_trait]
pub trait EmergencyDispatch: Send + Sync {
    async fn dispatch(&self, alert: &EmergencyAlert) -> DispatchReport;
}

/// Mails the emergency contact and looks up nearby help
pub struct EmergencyDispatcher {
    mailer: Arc<dyn Mailer>,
    directory: ResourceDirectory,
    recipient: String,
    mail_timeout: Duration,
}

impl EmergencyDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, directory: ResourceDirectory, recipient: String, mail_timeout: Duration) -> Self {
        Self {
            mailer,
            directory,
            recipient,
            mail_timeout,
        }
    }

    pub fn from_config(config: &MailConfig) -> Self {
        Self::new(
            mailer_from_config(config),
            ResourceDirectory::default(),
            config.recipient.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn notify_contact(&self, alert: &EmergencyAlert) -> Result<(), MailError> {
        let mail = compose_alert_mail(alert, &self.recipient);
        match tokio::time::timeout(self.mail_timeout, self.mailer.send(&mail)).await {
            Ok(result) => result,
            Err(_) => Err(MailError::Timeout(self.mail_timeout.as_secs())),
        }
    }
}

#[async_trait]
impl EmergencyDispatch for EmergencyDispatcher {
    async fn dispatch(&self, alert: &EmergencyAlert) -> DispatchReport {
        let notified = match self.notify_contact(alert).await {
            Ok(()) => {
                tracing::warn!("Emergency mail sent to {} for {}", self.recipient, alert.sos_id);
                true
            },
            Err(e) => {
                tracing::error!("Error sending emergency mail for {}: {}", alert.sos_id, e);
                false
            }
        };

        let resources = alert
            .position
            .map(|pos| self.directory.nearby(pos))
            .unwrap_or_default();
        tracing::info!("{} nearby resources for {}", resources.len(), alert.sos_id);

        DispatchReport {
            resources,
            environmental: EnvironmentalData::default(),
            notified,
        }
    }
}

/// Alert text sent to the emergency contact
pub fn compose_alert_mail(alert: &EmergencyAlert, recipient: &str) -> OutgoingMail {
    let name = &alert.owner.display_name;
    let started = Utc
        .timestamp_opt(alert.started_at, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let (position, link) = match alert.position {
        Some(pos) => (
            format!("Lat: {}, Lng: {}", pos.lat, pos.lng),
            format!("https://www.google.com/maps?q={},{}", pos.lat, pos.lng),
        ),
        None => ("unavailable".to_string(), "unavailable".to_string()),
    };

    let body = format!(
        "Dear Relative,\n\n\
         This is an urgent alert. {name} ({id}) has triggered an SOS emergency.\n\
         Message: I am not safe. Please contact {name} immediately.\n\
         Time: {started}\n\
         Last Known Location: {position}\n\n\
         Live Location Link: {link}\n\n\
         Please take action immediately.\n\
         Raahi Emergency System\n",
        id = alert.owner.id,
    );

    OutgoingMail {
        to: recipient.to_string(),
        subject: format!("URGENT: Emergency Alert from {}!", name),
        body,
    }
}
