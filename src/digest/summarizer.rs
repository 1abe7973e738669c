//! Batch summarizer: the core digest loop.
//!
//! Flow:
//! 1. List unread message ids (empty inbox ends the run with a notice)
//! 2. Partition ids into fixed-size batches, order preserved
//! 3. Per batch: fetch details → build one combined prompt → one chat
//!    completion → parse the JSON array (or fall back to raw text)
//! 4. Sleep between batches to respect the provider's rate limits
//!
//! A batch either fully succeeds or is skipped with a warning; one bad
//! batch never aborts the run. There are no retries.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::SummarizerConfig;
use crate::error::Result;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mail::{MailClient, MailMessage};

/// Max characters of body text included per email.
const BODY_CHAR_LIMIT: usize = 3000;

/// Suffix appended when a body is cut at the limit.
const TRUNCATION_MARKER: &str = "...[truncated]";

/// Output token cap for one batch completion.
const BATCH_MAX_TOKENS: u32 = 1200;

/// Pause after every batch, to stay under the provider's request-rate
/// ceiling.
const BATCH_DELAY: Duration = Duration::from_secs(2);

/// Fixed category labels the model must choose from.
const CATEGORIES: [&str; 3] = ["Job", "Promotion", "Important"];

/// One per-email record parsed from the model's JSON array.
#[derive(Debug, Clone, serde::Deserialize)]
struct EmailSummary {
    /// 1-based position within the batch, as reported by the model.
    #[serde(default)]
    email: Option<u64>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    category: String,
}

/// Pulls unread mail, prompts the model per batch, prints the results.
///
/// Collaborators are injected so the whole loop runs against fakes in
/// tests.
pub struct BatchSummarizer {
    mail: Arc<dyn MailClient>,
    llm: Arc<dyn LlmProvider>,
    config: SummarizerConfig,
}

impl BatchSummarizer {
    pub fn new(
        mail: Arc<dyn MailClient>,
        llm: Arc<dyn LlmProvider>,
        config: SummarizerConfig,
    ) -> Self {
        Self { mail, llm, config }
    }

    /// Run the full summarization pass over the unread inbox.
    ///
    /// Fails only before the batch loop starts (initial listing); once
    /// batching begins, per-batch errors are logged and skipped.
    pub async fn run(&self) -> Result<()> {
        let ids = self.mail.list_unread().await?;
        if ids.is_empty() {
            println!("No unread emails to summarize.");
            return Ok(());
        }

        info!(
            count = ids.len(),
            batch_size = self.config.batch_size,
            model = self.llm.model_name(),
            "Summarizing unread mail"
        );

        for (num, batch) in ids.chunks(self.config.batch_size).enumerate() {
            println!("\nProcessing batch {} ({} emails)...", num + 1, batch.len());

            if let Err(e) = self.process_batch(batch).await {
                warn!(batch = num + 1, error = %e, "Error processing batch, skipping");
            }

            // A delay follows every batch, including failed ones.
            tokio::time::sleep(BATCH_DELAY).await;
        }

        Ok(())
    }

    /// Process one batch: fetch details, prompt, print parsed results.
    ///
    /// A JSON parse failure of the model output is degraded output, not an
    /// error; the raw text is printed and `Ok` returned.
    async fn process_batch(&self, ids: &[String]) -> Result<()> {
        let mut blocks = Vec::with_capacity(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            let message = self.mail.get_message(id).await?;
            blocks.push(format_email_block(idx + 1, &message));
        }

        let prompt = build_batch_prompt(&blocks);
        let request =
            CompletionRequest::new(vec![ChatMessage::user(prompt)]).with_max_tokens(BATCH_MAX_TOKENS);
        let response = self.llm.complete(request).await?;

        match parse_summaries(&response.content) {
            Ok(items) => print_summaries(&items),
            Err(e) => {
                warn!(error = %e, "Model returned invalid JSON, showing raw output instead");
                println!("{}", response.content);
            }
        }

        Ok(())
    }
}

// ── Prompt construction ─────────────────────────────────────────────

/// Truncate a body to the prompt limit, counting characters.
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= BODY_CHAR_LIMIT {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(BODY_CHAR_LIMIT).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Format one email as a block in the batch prompt, 1-based index.
fn format_email_block(index: usize, message: &MailMessage) -> String {
    let subject = message.subject.as_deref().unwrap_or("No Subject");
    let sender = message.sender.as_deref().unwrap_or("Unknown Sender");
    format!(
        "Email {index}:\nSubject: {subject}\nFrom: {sender}\nBody:\n{body}\n---",
        body = truncate_body(&message.body)
    )
}

/// Build the combined prompt for one batch of email blocks.
fn build_batch_prompt(blocks: &[String]) -> String {
    format!(
        "You are an intelligent email assistant.\n\n\
         For each email below:\n\
         1. Summarize it in 2 lines.\n\
         2. Categorize it as one of: {categories}.\n\
         3. Return the output strictly as a valid JSON array in this format:\n\
         [\n  {{\"email\": 1, \"summary\": \"text here\", \"category\": \"Job\"}},\n  ...\n]\n\n\
         Emails:\n{emails}",
        categories = CATEGORIES.join(", "),
        emails = blocks.join("\n")
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the model output as a JSON array of per-email records.
fn parse_summaries(raw: &str) -> std::result::Result<Vec<EmailSummary>, serde_json::Error> {
    serde_json::from_str(&extract_json_array(raw))
}

/// Extract a JSON array from LLM output (handles markdown wrapping).
fn extract_json_array(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON array
    if trimmed.starts_with('[') {
        return trimmed.to_string();
    }

    // Wrapped in a markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('[') {
                return inner.to_string();
            }
        }
    }

    // Try to find array bounds
    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// Print parsed records in the order the model returned them.
fn print_summaries(items: &[EmailSummary]) {
    println!("\nBatch Results:");
    for item in items {
        let index = item
            .email
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("\nEmail {index}");
        println!("Summary: {}", item.summary);
        println!("Category: {}", item.category);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{LlmError, MailError};
    use crate::llm::CompletionResponse;

    // ── Truncation tests ────────────────────────────────────────────

    #[test]
    fn truncate_body_short_passthrough() {
        assert_eq!(truncate_body("hello"), "hello");
    }

    #[test]
    fn truncate_body_exactly_at_limit_unchanged() {
        let body = "x".repeat(BODY_CHAR_LIMIT);
        assert_eq!(truncate_body(&body), body);
    }

    #[test]
    fn truncate_body_over_limit_cuts_and_marks() {
        let body = format!("{}{}", "x".repeat(BODY_CHAR_LIMIT), "overflow");
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            truncated.chars().count(),
            BODY_CHAR_LIMIT + TRUNCATION_MARKER.len()
        );
        assert!(truncated.starts_with(&"x".repeat(BODY_CHAR_LIMIT)));
        assert!(!truncated.contains("overflow"));
    }

    #[test]
    fn truncate_body_counts_chars_not_bytes() {
        let body = "é".repeat(BODY_CHAR_LIMIT + 1);
        let truncated = truncate_body(&body);
        assert_eq!(
            truncated.chars().count(),
            BODY_CHAR_LIMIT + TRUNCATION_MARKER.len()
        );
    }

    // ── Prompt construction tests ───────────────────────────────────

    #[test]
    fn email_block_applies_header_defaults() {
        let message = MailMessage::default();
        let block = format_email_block(3, &message);
        assert!(block.starts_with("Email 3:"));
        assert!(block.contains("Subject: No Subject"));
        assert!(block.contains("From: Unknown Sender"));
        assert!(block.ends_with("---"));
    }

    #[test]
    fn email_block_includes_message_fields() {
        let message = MailMessage {
            subject: Some("Offer inside".to_string()),
            sender: Some("shop@example.com".to_string()),
            body: "50% off".to_string(),
            ..Default::default()
        };
        let block = format_email_block(1, &message);
        assert!(block.contains("Subject: Offer inside"));
        assert!(block.contains("From: shop@example.com"));
        assert!(block.contains("50% off"));
    }

    #[test]
    fn batch_prompt_lists_categories_and_format() {
        let blocks = vec![
            "Email 1:\nSubject: A\nFrom: a@x.com\nBody:\nhi\n---".to_string(),
            "Email 2:\nSubject: B\nFrom: b@x.com\nBody:\nyo\n---".to_string(),
        ];
        let prompt = build_batch_prompt(&blocks);
        assert!(prompt.contains("Job, Promotion, Important"));
        assert!(prompt.contains("JSON array"));
        assert!(prompt.contains("Email 1:"));
        assert!(prompt.contains("Email 2:"));
    }

    // ── Partitioning tests ──────────────────────────────────────────

    #[test]
    fn batching_partitions_losslessly() {
        let ids: Vec<String> = (1..=7).map(|i| format!("id-{i}")).collect();
        let batches: Vec<&[String]> = ids.chunks(5).collect();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 5);
        assert_eq!(batches[1].len(), 2);

        let rejoined: Vec<String> = batches.concat();
        assert_eq!(rejoined, ids);
    }

    // ── Response parsing tests ──────────────────────────────────────

    #[test]
    fn parse_full_records() {
        let raw = r#"[{"email": 1, "summary": "Recruiter ping.", "category": "Job"}]"#;
        let items = parse_summaries(raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].email, Some(1));
        assert_eq!(items[0].summary, "Recruiter ping.");
        assert_eq!(items[0].category, "Job");
    }

    #[test]
    fn parse_missing_fields_get_defaults() {
        let raw = r#"[{"email": 2}, {"summary": "no index"}]"#;
        let items = parse_summaries(raw).unwrap();
        assert_eq!(items[0].summary, "");
        assert_eq!(items[0].category, "");
        assert_eq!(items[1].email, None);
        assert_eq!(items[1].summary, "no index");
    }

    #[test]
    fn parse_invalid_json_fails() {
        assert!(parse_summaries("the model rambled instead").is_err());
    }

    #[test]
    fn parse_object_instead_of_array_fails() {
        assert!(parse_summaries(r#"{"email": 1, "summary": "s"}"#).is_err());
    }

    #[test]
    fn extract_json_array_direct() {
        let input = r#"[{"email": 1}]"#;
        assert_eq!(extract_json_array(input), input);
    }

    #[test]
    fn extract_json_array_from_markdown_block() {
        let input = "Here you go:\n```json\n[{\"email\": 1}]\n```";
        assert_eq!(extract_json_array(input), "[{\"email\": 1}]");
    }

    #[test]
    fn extract_json_array_embedded_in_text() {
        let input = "Sure! [{\"email\": 1}] hope that helps.";
        let result = extract_json_array(input);
        assert!(result.starts_with('['));
        assert!(result.ends_with(']'));
    }

    // ── Mocks ───────────────────────────────────────────────────────

    struct MockMail {
        ids: Vec<String>,
        messages: HashMap<String, MailMessage>,
        fail_ids: Vec<String>,
        fetches: AtomicUsize,
    }

    impl MockMail {
        fn with_messages(count: usize) -> Self {
            let ids: Vec<String> = (1..=count).map(|i| format!("id-{i}")).collect();
            let messages = ids
                .iter()
                .map(|id| {
                    (
                        id.clone(),
                        MailMessage {
                            id: id.clone(),
                            subject: Some(format!("Subject {id}")),
                            sender: Some("alice@example.com".to_string()),
                            snippet: String::new(),
                            body: format!("Body of {id}"),
                        },
                    )
                })
                .collect();
            Self {
                ids,
                messages,
                fail_ids: Vec::new(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl MailClient for MockMail {
        async fn list_unread(&self) -> std::result::Result<Vec<String>, MailError> {
            Ok(self.ids.clone())
        }

        async fn get_message(&self, id: &str) -> std::result::Result<MailMessage, MailError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.iter().any(|f| f == id) {
                return Err(MailError::NotFound { id: id.to_string() });
            }
            Ok(self.messages.get(id).cloned().unwrap_or_default())
        }
    }

    struct MockLlm {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    impl MockLlm {
        fn returning(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, LlmError> {
            let prompt = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            Ok(CompletionResponse {
                content: self.response.clone(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    fn summarizer(
        mail: Arc<MockMail>,
        llm: Arc<MockLlm>,
        batch_size: usize,
    ) -> BatchSummarizer {
        BatchSummarizer::new(mail, llm, SummarizerConfig { batch_size })
    }

    // ── Run loop tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn empty_inbox_makes_no_inference_calls() {
        let mail = Arc::new(MockMail::with_messages(0));
        let llm = Arc::new(MockLlm::returning("[]"));
        summarizer(mail.clone(), llm.clone(), 5).run().await.unwrap();

        assert_eq!(llm.calls(), 0);
        assert_eq!(mail.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn seven_ids_batch_five_makes_two_calls_with_two_delays() {
        let mail = Arc::new(MockMail::with_messages(7));
        let llm = Arc::new(MockLlm::returning(
            r#"[{"email": 1, "summary": "s", "category": "Important"}]"#,
        ));

        let start = tokio::time::Instant::now();
        summarizer(mail.clone(), llm.clone(), 5).run().await.unwrap();

        assert_eq!(llm.calls(), 2);
        assert_eq!(mail.fetches.load(Ordering::SeqCst), 7);
        // One 2s delay after every batch, including the last.
        assert_eq!(start.elapsed(), Duration::from_secs(4));

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("Email 5:"));
        assert!(prompts[0].contains("Body of id-5"));
        assert!(!prompts[0].contains("Email 6:"));
        assert!(prompts[1].contains("Email 2:"));
        assert!(prompts[1].contains("Body of id-7"));
        assert!(!prompts[1].contains("Email 3:"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_json_response_degrades_and_continues() {
        let mail = Arc::new(MockMail::with_messages(7));
        let llm = Arc::new(MockLlm::returning("sorry, here are your summaries:"));

        let start = tokio::time::Instant::now();
        summarizer(mail, llm.clone(), 5).run().await.unwrap();

        // Both batches still submitted despite unparseable output.
        assert_eq!(llm.calls(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_batch_is_skipped_but_still_delayed() {
        let mut mock = MockMail::with_messages(7);
        mock.fail_ids.push("id-3".to_string());
        let mail = Arc::new(mock);
        let llm = Arc::new(MockLlm::returning("[]"));

        let start = tokio::time::Instant::now();
        summarizer(mail, llm.clone(), 5).run().await.unwrap();

        // Batch 1 dies on the fetch of id-3; batch 2 still completes, and
        // the delay count matches the batch count.
        assert_eq!(llm.calls(), 1);
        assert!(llm.prompts.lock().unwrap()[0].contains("Body of id-6"));
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_batch_size_controls_call_count() {
        let mail = Arc::new(MockMail::with_messages(6));
        let llm = Arc::new(MockLlm::returning("[]"));

        summarizer(mail, llm.clone(), 2).run().await.unwrap();
        assert_eq!(llm.calls(), 3);
    }
}
