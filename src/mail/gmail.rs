//! Gmail REST client.
//!
//! Talks to `gmail.googleapis.com` directly over reqwest with a bearer token
//! from the stored authorized-user file. Pagination is not handled; only
//! the first page of a listing is consumed.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::MailError;
use crate::mail::{MailClient, MailMessage};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Query used for the unread listing.
const UNREAD_QUERY: &str = "is:unread";

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageRef {
    id: Option<String>,
}

/// A message as returned by `messages.get` with `format=full`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GmailMessage {
    pub id: String,
    pub snippet: String,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePart {
    pub mime_type: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub body: Option<PartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Header {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartBody {
    pub data: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// Gmail REST client for a single account ("me").
pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl GmailClient {
    pub fn new(access_token: SecretString) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: GMAIL_API_BASE.to_string(),
            access_token,
        })
    }

    async fn check_status(
        response: reqwest::Response,
        id: Option<&str>,
    ) -> Result<reqwest::Response, MailError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MailError::AuthFailed);
        }
        if status == StatusCode::NOT_FOUND
            && let Some(id) = id
        {
            return Err(MailError::NotFound { id: id.to_string() });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl MailClient for GmailClient {
    async fn list_unread(&self) -> Result<Vec<String>, MailError> {
        let url = format!("{}/users/me/messages", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("labelIds", "INBOX"), ("q", UNREAD_QUERY)])
            .send()
            .await?;

        let response = Self::check_status(response, None).await?;
        let listing: MessageListResponse = response.json().await?;

        Ok(listing
            .messages
            .into_iter()
            .filter_map(|m| m.id)
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<MailMessage, MailError> {
        let url = format!("{}/users/me/messages/{}", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("format", "full")])
            .send()
            .await?;

        let response = Self::check_status(response, Some(id)).await?;
        let message: GmailMessage = response.json().await?;

        Ok(to_mail_message(message))
    }
}

// ── Payload handling ────────────────────────────────────────────────

fn to_mail_message(message: GmailMessage) -> MailMessage {
    let headers = message
        .payload
        .as_ref()
        .and_then(|p| p.headers.as_deref())
        .unwrap_or(&[]);

    let subject = header_value(headers, "Subject");
    let sender = header_value(headers, "From");
    let body = message
        .payload
        .as_ref()
        .map(extract_body)
        .unwrap_or_default();

    MailMessage {
        id: message.id,
        subject,
        sender,
        snippet: message.snippet,
        body,
    }
}

fn header_value(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.as_deref() == Some(name))
        .and_then(|h| h.value.clone())
}

/// Extract the plain-text body from a message payload.
///
/// Only the immediate parts list is inspected; nested multipart containers
/// are not recursed into. A partless payload falls back to its own body.
/// Returns an empty string when no plain-text data is found or it fails to
/// decode.
pub fn extract_body(payload: &MessagePart) -> String {
    let data = match payload.parts.as_deref() {
        Some(parts) if !parts.is_empty() => parts
            .iter()
            .find(|p| p.mime_type.as_deref() == Some("text/plain"))
            .and_then(|p| p.body.as_ref())
            .and_then(|b| b.data.as_deref()),
        _ => payload.body.as_ref().and_then(|b| b.data.as_deref()),
    };

    data.map(decode_body_data).unwrap_or_default()
}

/// Decode a Gmail body `data` field: URL-safe base64, padding optional.
fn decode_body_data(data: &str) -> String {
    URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}
