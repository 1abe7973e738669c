//! Mail access: trait seam plus the Gmail REST implementation.

pub mod gmail;

pub use gmail::GmailClient;

use async_trait::async_trait;

use crate::error::MailError;

/// A fetched mail message, reduced to what the digest flows consume.
#[derive(Debug, Clone, Default)]
pub struct MailMessage {
    /// Opaque provider-assigned identifier.
    pub id: String,
    /// Subject header, when present.
    pub subject: Option<String>,
    /// From header, when present.
    pub sender: Option<String>,
    /// Short preview string (listing flow only).
    pub snippet: String,
    /// Decoded plain-text body; empty when the message has none.
    pub body: String,
}

/// Read-only mail capability set.
///
/// The batch summarizer and the listing flow only ever list unread ids and
/// fetch single messages, so that is the whole contract, which also keeps
/// them testable against in-memory fakes.
#[async_trait]
pub trait MailClient: Send + Sync {
    /// List the identifiers of unread inbox messages.
    ///
    /// An empty inbox yields an empty list, not an error. Only the first
    /// page of results is returned.
    async fn list_unread(&self) -> Result<Vec<String>, MailError>;

    /// Fetch the full message for an identifier.
    ///
    /// Fails with `MailError::NotFound` when the id no longer resolves
    /// (e.g. the message was deleted between list and get).
    async fn get_message(&self, id: &str) -> Result<MailMessage, MailError>;
}
