//! Knowledge context assembly.
//!
//! Turns the vault snapshot into two provenance-tagged text blocks, one per
//! [`Category`]. No ranking, deduplication or truncation happens here: the
//! reference material is always passed through whole.

use crate::error::Result;
use crate::models::{Category, VaultDocument};
use crate::store::Store;

/// The two context blocks handed to the completion step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeContext {
    pub policy: String,
    pub past_bid: String,
}

impl KnowledgeContext {
    /// Build the blocks from an already-fetched vault snapshot.
    ///
    /// Entries keep the order of `docs`; each is prefixed with
    /// `[SOURCE: <name>]` and entries are separated by a blank line.
    pub fn from_documents(docs: &[VaultDocument]) -> Self {
        Self {
            policy: block(docs, Category::Policy),
            past_bid: block(docs, Category::PastBid),
        }
    }
}

fn block(docs: &[VaultDocument], category: Category) -> String {
    docs.iter()
        .filter(|d| d.category == category)
        .map(|d| format!("[SOURCE: {}]\n{}", d.name, d.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fetch the vault from `store` and assemble both blocks.
///
/// A pure function of store state: two calls with no intervening writes
/// return identical output.
pub async fn assemble_context(store: &dyn Store) -> Result<KnowledgeContext> {
    let docs = store.all_vault().await?;
    let ctx = KnowledgeContext::from_documents(&docs);
    tracing::debug!(
        documents = docs.len(),
        policy_chars = ctx.policy.len(),
        past_bid_chars = ctx.past_bid.len(),
        "assembled knowledge context"
    );
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileKind;
    use crate::store::memory::InMemoryStore;

    fn doc(name: &str, content: &str, category: Category) -> VaultDocument {
        VaultDocument::new(name, content.to_string(), category, 10, FileKind::Txt)
    }

    #[test]
    fn partitions_by_category_with_source_tags() {
        let docs = vec![
            doc("gdpr.pdf", "We comply with GDPR.", Category::Policy),
            doc("bid-2023.docx", "Our approach is agile.", Category::PastBid),
            doc("iso.txt", "ISO 27001 certified.", Category::Policy),
        ];
        let ctx = KnowledgeContext::from_documents(&docs);
        assert_eq!(
            ctx.policy,
            "[SOURCE: gdpr.pdf]\nWe comply with GDPR.\n\n[SOURCE: iso.txt]\nISO 27001 certified."
        );
        assert_eq!(ctx.past_bid, "[SOURCE: bid-2023.docx]\nOur approach is agile.");
    }

    #[test]
    fn empty_vault_gives_empty_blocks() {
        assert_eq!(KnowledgeContext::from_documents(&[]), KnowledgeContext::default());
    }

    #[tokio::test]
    async fn assembly_is_repeatable_without_writes() {
        let store = InMemoryStore::new();
        store
            .put_vault(&doc("a.txt", "alpha", Category::Policy))
            .await
            .unwrap();
        store
            .put_vault(&doc("b.txt", "beta", Category::PastBid))
            .await
            .unwrap();

        let first = assemble_context(&store).await.unwrap();
        let second = assemble_context(&store).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.policy.as_bytes(), second.policy.as_bytes());
    }

    #[test]
    fn long_content_is_never_truncated() {
        let big = "x".repeat(1_000_000);
        let ctx = KnowledgeContext::from_documents(&[doc("big.txt", &big, Category::Policy)]);
        assert!(ctx.policy.ends_with(&big));
    }
}
