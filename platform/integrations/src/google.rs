//! Google Workspace: Gmail send and Calendar insert, sharing one OAuth2
//! refresh-token credential

use crate::error::{IntegrationError, IntegrationResult};
use crate::http::{build_client, endpoint, handle_response};
use crate::{Calendar, Mailer};
use agent_runtime::{env_or, require_env};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh this long before Google's stated expiry
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub calendar_id: String,
    /// `From:` header of outgoing mail
    pub sender: String,
    pub token_url: String,
    pub gmail_base_url: String,
    pub calendar_base_url: String,
}

impl GoogleConfig {
    /// `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REFRESH_TOKEN`,
    /// `DOMAIN_NAME`; `GOOGLE_CALENDAR_ID` defaults to `primary`
    pub fn from_env() -> IntegrationResult<Self> {
        let domain = require_env("DOMAIN_NAME")?;
        Ok(GoogleConfig {
            client_id: require_env("GOOGLE_CLIENT_ID")?,
            client_secret: require_env("GOOGLE_CLIENT_SECRET")?,
            refresh_token: require_env("GOOGLE_REFRESH_TOKEN")?,
            calendar_id: env_or("GOOGLE_CALENDAR_ID", "primary"),
            sender: format!("No Reply <no-reply@{}>", domain),
            token_url: env_or("GOOGLE_TOKEN_URL", "https://oauth2.googleapis.com/token"),
            gmail_base_url: env_or("GMAIL_API_URL", "https://gmail.googleapis.com"),
            calendar_base_url: env_or("GOOGLE_CALENDAR_API_URL", "https://www.googleapis.com"),
        })
    }

    /// Point every Google endpoint at one server (tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.token_url = format!("{}/token", base);
        self.gmail_base_url = base.to_string();
        self.calendar_base_url = base.to_string();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    /// `email` or `popup`
    pub method: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA zone the event is shown in
    pub time_zone: String,
    pub attendees: Vec<String>,
    pub reminders: Vec<Reminder>,
}

impl CalendarEvent {
    /// Calendar API v3 event resource
    pub fn to_resource(&self) -> Value {
        json!({
            "summary": self.summary,
            "location": self.location,
            "description": self.description,
            "start": {
                "dateTime": self.start.to_rfc3339(),
                "timeZone": self.time_zone,
            },
            "end": {
                "dateTime": self.end.to_rfc3339(),
                "timeZone": self.time_zone,
            },
            "attendees": self
                .attendees
                .iter()
                .map(|email| json!({ "email": email }))
                .collect::<Vec<_>>(),
            "reminders": {
                "useDefault": false,
                "overrides": self
                    .reminders
                    .iter()
                    .map(|r| json!({ "method": r.method, "minutes": r.minutes }))
                    .collect::<Vec<_>>(),
            },
        })
    }
}

/// Plain-text RFC 822 message as Gmail's `raw` field expects it (before encoding)
pub fn rfc822_message(from: &str, to: &str, subject: &str, body: &str) -> String {
    format!(
        "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
        from, to, subject, body
    )
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct InsertedEvent {
    #[serde(default)]
    id: String,
    #[serde(rename = "htmlLink", default)]
    html_link: Option<String>,
}

#[derive(Clone)]
pub struct GoogleWorkspace {
    config: Arc<GoogleConfig>,
    http_client: Client,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl GoogleWorkspace {
    pub fn new(config: GoogleConfig) -> IntegrationResult<Self> {
        Ok(GoogleWorkspace {
            config: Arc::new(config),
            http_client: build_client()?,
            token: Arc::new(Mutex::new(None)),
        })
    }

    pub fn from_env() -> IntegrationResult<Self> {
        Self::new(GoogleConfig::from_env()?)
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Cached access token, refreshed from the refresh token when stale
    async fn access_token(&self) -> IntegrationResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let fresh: TokenResponse = handle_response(response).await?;

        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in = fresh.expires_in, "Google access token refreshed");
        Ok(fresh.access_token)
    }
}

#[async_trait]
impl Mailer for GoogleWorkspace {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> IntegrationResult<()> {
        let token = self.access_token().await?;
        let raw = URL_SAFE_NO_PAD.encode(rfc822_message(&self.config.sender, to, subject, body));
        let url = endpoint(
            &self.config.gmail_base_url,
            &["gmail", "v1", "users", "me", "messages", "send"],
        )?;

        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "raw": raw }))
            .send()
            .await?;
        let _: Value = handle_response(response).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl Calendar for GoogleWorkspace {
    async fn create_event(&self, event: &CalendarEvent) -> IntegrationResult<String> {
        let token = self.access_token().await?;
        let url = endpoint(
            &self.config.calendar_base_url,
            &["calendar", "v3", "calendars", &self.config.calendar_id, "events"],
        )?;

        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(&event.to_resource())
            .send()
            .await?;
        let created: InsertedEvent = handle_response(response).await?;

        let link = created.html_link.unwrap_or(created.id);
        if link.is_empty() {
            return Err(IntegrationError::Parse(
                "calendar insert returned neither id nor htmlLink".to_string(),
            ));
        }
        tracing::info!(link = %link, "Calendar event created");
        Ok(link)
    }
}
