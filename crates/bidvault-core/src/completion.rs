//! Completion provider abstraction and prompt assembly.
//!
//! A [`CompletionProvider`] performs one request/response exchange with a
//! text-generation service and returns the raw reply text. [`complete`]
//! wraps a provider with the fixed bid-writing prompt and the
//! [sanitizer](crate::sanitize) so callers get a typed, ordered QA list.

use async_trait::async_trait;

use crate::context::KnowledgeContext;
use crate::error::Result;
use crate::models::QaPair;
use crate::sanitize::sanitize_reply;

/// Default ceiling on tender text characters sent to the service.
pub const DEFAULT_MAX_TENDER_CHARS: usize = 400_000;

/// Appended to the retained prefix when the tender text is cut.
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";

/// Literal the service is told to use when the context has no answer.
pub const BESPOKE_FALLBACK: &str = "Requires bespoke input";

/// System instruction sent with every completion.
pub const SYSTEM_INSTRUCTION: &str = "You are a Bid Writing Engine. Your job is to extract questions from the Tender Text and answer them using the provided Context.

Rules:
1. Use POLICY_CONTEXT for factual compliance (e.g., certifications, security standards).
2. Use PAST_BID_CONTEXT to match tone/style and find similar past answers.
3. Output ONLY a raw JSON array. No markdown, no conversation, no 'thinking'.
4. Structure: [{ \"question\": \"...\", \"answer\": \"...\" }]
5. If a specific answer isn't found in the context, state 'Requires bespoke input' but try to infer from policies first.
6. You MUST cite which document you used for the answer in brackets at the end, e.g., [Source: GDPR_Policy.pdf].
7. LANGUAGE: You must use BRITISH ENGLISH spelling (e.g., 'optimise', 'colour', 'programme', 'organisation').
";

/// A remote text-generation backend.
///
/// Implementations make a single attempt per call unless they document a
/// retry policy of their own, and must check their credential before any
/// network activity.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Backend identifier used in logs (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// Send one system instruction plus one user message; return the raw reply.
    async fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String>;
}

/// Cap `text` at `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was dropped.
pub fn truncate_tender(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Build the user message embedding the three labelled sections.
pub fn build_prompt(tender_text: &str, context: &KnowledgeContext) -> String {
    format!(
        "\nPOLICY_CONTEXT:\n{}\n\nPAST_BID_CONTEXT:\n{}\n\nTENDER_TEXT:\n{}\n\nTask: Extract every question and provide a compliant answer. Return strict JSON.\n",
        context.policy, context.past_bid, tender_text
    )
}

/// Run one completion: truncate, prompt, call `provider`, sanitize.
pub async fn complete(
    provider: &dyn CompletionProvider,
    tender_text: &str,
    context: &KnowledgeContext,
    max_tender_chars: usize,
) -> Result<Vec<QaPair>> {
    let safe_text = truncate_tender(tender_text, max_tender_chars);
    if safe_text.len() != tender_text.len() {
        tracing::warn!(max_tender_chars, "tender text truncated before completion");
    }
    let prompt = build_prompt(&safe_text, context);
    tracing::info!(
        provider = provider.name(),
        prompt_chars = prompt.len(),
        "requesting completion"
    );
    let raw = provider.generate(SYSTEM_INSTRUCTION, &prompt).await?;
    let pairs = sanitize_reply(&raw)?;
    tracing::info!(pairs = pairs.len(), "completion parsed");
    Ok(pairs)
}
