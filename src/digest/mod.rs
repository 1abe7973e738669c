//! Digest flows over the mail and LLM seams.
//!
//! `summarizer` batches unread mail into single-prompt inference requests
//! and prints per-email summaries; `listing` is the one-shot snippet
//! preview.

pub mod listing;
pub mod summarizer;

pub use listing::run_listing;
pub use summarizer::BatchSummarizer;
