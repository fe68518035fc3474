use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::Mutex;

use super::{CalendarEntry, CalendarSync, EventWindow};
use crate::config::CalendarConfig;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
// Refresh this long before the provider says the token expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("graph responded {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("graph response carried no event id")]
    MissingEventId,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: Option<String>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

struct Credentials {
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

/// Microsoft Graph calendar, authenticated with the client-credentials flow.
///
/// Without a complete set of credentials the client stays disabled and every
/// call is a logged no-op.
pub struct GraphCalendar {
    client: Client,
    credentials: Option<Credentials>,
    authority_url: String,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl GraphCalendar {
    pub fn new(config: CalendarConfig) -> Result<Self, GraphError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        let credentials = config
            .has_credentials()
            .then(|| {
                config
                    .tenant_id
                    .zip(config.client_id)
                    .zip(config.client_secret)
            })
            .flatten()
            .map(|((tenant_id, client_id), client_secret)| Credentials {
                tenant_id,
                client_id,
                client_secret,
            });
        if credentials.is_none() {
            log::warn!("Graph credentials incomplete; calendar sync is disabled");
        }

        Ok(Self {
            client,
            credentials,
            authority_url: config.authority_url.trim_end_matches('/').to_string(),
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    async fn access_token(&self, credentials: &Credentials) -> Result<String, GraphError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_url, credentials.tenant_id
        );
        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;
        let token: TokenResponse = checked(response).await?.json().await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        log::debug!("Fetched Graph access token valid for {:?}", lifetime);
        Ok(token.access_token)
    }

    async fn post_event(
        &self,
        credentials: &Credentials,
        identity: &str,
        entry: &CalendarEntry,
    ) -> Result<String, GraphError> {
        let token = self.access_token(credentials).await?;
        let url = format!("{}/users/{}/calendar/events", self.base_url, identity);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&event_payload(entry))
            .send()
            .await?;
        let created: CreatedEvent = checked(response).await?.json().await?;
        created.id.ok_or(GraphError::MissingEventId)
    }

    async fn remove_event(
        &self,
        credentials: &Credentials,
        identity: &str,
        event_id: &str,
    ) -> Result<(), GraphError> {
        let token = self.access_token(credentials).await?;
        let url = format!("{}/users/{}/events/{}", self.base_url, identity, event_id);

        let response = self.client.delete(&url).bearer_auth(token).send().await?;
        checked(response).await?;
        Ok(())
    }
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, GraphError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GraphError::Status { status, body })
}

fn event_payload(entry: &CalendarEntry) -> Value {
    let (start, end, all_day) = match &entry.window {
        EventWindow::AllDay { start, end } => (
            start.format("%Y-%m-%dT00:00:00").to_string(),
            end.format("%Y-%m-%dT00:00:00").to_string(),
            true,
        ),
        EventWindow::Timed { start, end } => (
            start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            false,
        ),
    };

    json!({
        "subject": entry.subject,
        "body": { "contentType": "text", "content": entry.body },
        "start": { "dateTime": start, "timeZone": "UTC" },
        "end": { "dateTime": end, "timeZone": "UTC" },
        "isAllDay": all_day,
        "showAs": "oof",
    })
}

#[async_trait]
impl CalendarSync for GraphCalendar {
    async fn create_event(&self, entry: &CalendarEntry) -> Option<String> {
        let credentials = self.credentials.as_ref()?;
        let Some(identity) = entry.identity.as_deref() else {
            log::info!(
                "No calendar identity for request {}; skipping event",
                entry.request_id
            );
            return None;
        };

        match self.post_event(credentials, identity, entry).await {
            Ok(event_id) => {
                log::info!(
                    "Created calendar event {} for request {}",
                    event_id,
                    entry.request_id
                );
                Some(event_id)
            }
            Err(e) => {
                log::error!(
                    "Failed to create calendar event for request {}: {}",
                    entry.request_id,
                    e
                );
                None
            }
        }
    }

    async fn delete_event(&self, identity: Option<&str>, event_id: &str) {
        let Some(credentials) = self.credentials.as_ref() else {
            return;
        };
        let Some(identity) = identity else {
            log::info!("No calendar identity; cannot delete event {}", event_id);
            return;
        };

        match self.remove_event(credentials, identity, event_id).await {
            Ok(()) => log::info!("Deleted calendar event {}", event_id),
            Err(e) => log::error!("Failed to delete calendar event {}: {}", event_id, e),
        }
    }
}
