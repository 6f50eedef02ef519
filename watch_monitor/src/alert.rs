//! Fire-and-forget email alerts for large price movements.
//!
//! `dispatch` renders the message synchronously and hands the HTTP send to a
//! detached task. Nothing waits for the result: success and failure are only
//! logged, and a failed send is never retried.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use watch_common::{MonitorError, Result};

use crate::http_client::{HttpClient, HttpRequest};

/// Direction of a price movement that crossed a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AlertDirection {
    Up,
    Down,
}

/// Subject and body for one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub subject: String,
    pub text: String,
}

/// Message templates by direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTemplates {
    pub up: Template,
    pub down: Template,
}

impl Default for AlertTemplates {
    fn default() -> Self {
        Self {
            up: Template {
                subject: String::from("[^w^]Target Stock is Soaring!"),
                text: String::from(
                    "Notice Change in your PEBBLE WATCH :)\nYour target stock is soaring!",
                ),
            },
            down: Template {
                subject: String::from("[TAT]Target Stock is Dropping!"),
                text: String::from(
                    "Notice Change in your PEBBLE WATCH :(\nYour target stock is dropping quickly.",
                ),
            },
        }
    }
}

impl AlertTemplates {
    /// Loads templates from a JSON file shaped like
    /// `{"up": {"subject", "text"}, "down": {"subject", "text"}}`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let templates: Self = serde_json::from_str(&raw)?;
        Ok(templates)
    }

    pub fn for_direction(&self, direction: AlertDirection) -> &Template {
        match direction {
            AlertDirection::Up => &self.up,
            AlertDirection::Down => &self.down,
        }
    }
}

/// Provider credential, sender and the single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub endpoint: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub to_name: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    key: &'a str,
    message: OutgoingMessage<'a>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    from_email: &'a str,
    from_name: &'a str,
    to: [Recipient<'a>; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    email: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

/// Sends one alert per call, without waiting for the outcome.
pub trait AlertDispatcher: Send + Sync {
    fn dispatch(&self, direction: AlertDirection);
}

/// Mandrill `messages/send.json` dispatcher.
pub struct MandrillDispatcher {
    http_client: Arc<dyn HttpClient>,
    settings: EmailSettings,
    templates: AlertTemplates,
}

impl MandrillDispatcher {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        settings: EmailSettings,
        templates: AlertTemplates,
    ) -> Self {
        Self {
            http_client,
            settings,
            templates,
        }
    }

    /// Builds the POST request for `direction`.
    pub fn render(&self, direction: AlertDirection) -> Result<HttpRequest> {
        let template = self.templates.for_direction(direction);
        let body = SendRequest {
            key: &self.settings.api_key,
            message: OutgoingMessage {
                from_email: &self.settings.from_email,
                from_name: &self.settings.from_name,
                to: [Recipient {
                    email: &self.settings.to_email,
                    name: &self.settings.to_name,
                    kind: "to",
                }],
                subject: &template.subject,
                text: &template.text,
            },
        };
        let json = serde_json::to_string(&body)?;
        Ok(HttpRequest::post(self.settings.endpoint.as_str()).with_json_body(json))
    }
}

impl AlertDispatcher for MandrillDispatcher {
    fn dispatch(&self, direction: AlertDirection) {
        let request = match self.render(direction) {
            Ok(request) => request,
            Err(e) => {
                error!("Failed to render {} alert: {}", direction, e);
                return;
            }
        };

        let http_client = Arc::clone(&self.http_client);
        tokio::spawn(async move {
            match http_client.execute(request).await {
                Ok(response) => info!(
                    "{} alert submitted: status {} {}",
                    direction, response.status, response.body
                ),
                Err(e) => error!("{} alert could not be sent: {}", direction, e),
            }
        });
    }
}

/// Used when no provider credential is configured.
#[derive(Debug, Default)]
pub struct DisabledDispatcher;

impl AlertDispatcher for DisabledDispatcher {
    fn dispatch(&self, direction: AlertDirection) {
        warn!(
            "{} alert not sent: no email provider key configured",
            direction
        );
    }
}

impl EmailSettings {
    /// Settings are complete only when every identity field is non-empty.
    pub fn validate(self) -> Result<Self> {
        let fields = [
            ("endpoint", &self.endpoint),
            ("api key", &self.api_key),
            ("sender address", &self.from_email),
            ("recipient address", &self.to_email),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(MonitorError::Config(format!("alert {name} is empty")));
            }
        }
        Ok(self)
    }
}
