//! Single-pass unread listing: count plus snippet previews.

use tracing::warn;

use crate::error::Result;
use crate::mail::MailClient;

/// Maximum number of messages previewed per run.
const SNIPPET_PREVIEW_LIMIT: usize = 5;

/// Print the unread count and a snippet line for the first few messages.
///
/// An empty inbox prints a notice and succeeds. A fetch failure for one
/// message is logged and skipped; a failure of the initial listing aborts
/// the run.
pub async fn run_listing(mail: &dyn MailClient) -> Result<()> {
    let ids = mail.list_unread().await?;
    if ids.is_empty() {
        println!("No unread emails found.");
        return Ok(());
    }

    println!("You have {} unread emails.\n", ids.len());
    for id in ids.iter().take(SNIPPET_PREVIEW_LIMIT) {
        match mail.get_message(id).await {
            Ok(message) => println!("- {}\n", message.snippet),
            Err(e) => warn!(id = %id, error = %e, "Failed to fetch message, skipping"),
        }
    }

    Ok(())
}
