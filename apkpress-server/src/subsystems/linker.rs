//! Linker subsystem: single-article link runs
//!
//! Loads the article, runs the pure pipeline and writes the result back:
//! - Targeted: link explicitly requested articles (optionally with anchor text)
//! - Auto: score the published pool and link the best matches
//!
//! Writes are retried with exponential backoff on transient store errors.
//! With `linking.check_revision` set, writes are conditional on the
//! `updated_at` seen at read time; a `Conflict` is never retried.

use std::time::Duration;

use apkpress_core::ipc::TargetRef;
use apkpress_core::models::{Article, ArticleUpdate, LinkTarget, LinkedArticle};
use apkpress_core::{ArticleStore, LinkOutcome, LinkingConfig, PipelineState, PressError};
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use uuid::Uuid;

use crate::router::AppContext;

/// Base of the exponential backoff between persistence attempts, in ms.
const RETRY_BASE_MS: u64 = 10;

/// Result of one single-article run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkReport {
    pub article_id: Uuid,
    pub title: String,
    pub links_added: usize,
    pub linked_articles: Vec<LinkedArticle>,
    pub meta_description: Option<String>,
    pub state: PipelineState,
    /// Requested targets that are missing or unpublished.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_targets: Vec<Uuid>,
}

impl LinkReport {
    fn new(article: &Article, outcome: LinkOutcome, skipped_targets: Vec<Uuid>) -> Self {
        Self {
            article_id: article.id,
            title: article.title.clone(),
            links_added: outcome.links_added,
            linked_articles: outcome.linked,
            meta_description: outcome.meta_description,
            state: outcome.state,
            skipped_targets,
        }
    }
}

/// Link the requested targets into `article_id`.
///
/// # Arguments
/// * `ctx` - Store, config and link engine
/// * `article_id` - Article whose body is edited (need not be published)
/// * `targets` - Articles to link to, by id, with optional anchor text
/// * `max_links` - Override of `linking.max_links_per_run`
///
/// # Returns
/// * `Ok(LinkReport)` - Zero links added is a normal outcome
/// * `Err` - Missing source article or a failed write
pub async fn link_targets(
    ctx: &AppContext,
    article_id: Uuid,
    targets: &[TargetRef],
    max_links: Option<usize>,
) -> Result<LinkReport, PressError> {
    let article = ctx.store.get_article(article_id).await?;

    let mut resolved = Vec::with_capacity(targets.len());
    let mut skipped = Vec::new();
    for target in targets {
        match ctx.store.get_article(target.id).await {
            Ok(found) if found.published => resolved.push(LinkTarget {
                id: Some(found.id),
                slug: found.slug,
                title: found.title,
                anchor_text: target.anchor_text.clone(),
            }),
            Ok(_) | Err(PressError::NotFound(_)) => {
                tracing::debug!(target_id = %target.id, "Skipping missing or unpublished link target");
                skipped.push(target.id);
            }
            Err(e) => return Err(e),
        }
    }

    let outcome = ctx.engine.link_article(&article, &resolved, max_links);
    if outcome.is_changed() {
        persist_outcome(ctx.store.as_ref(), &ctx.config.linking, &article, &outcome).await?;
    }
    Ok(LinkReport::new(&article, outcome, skipped))
}

/// Auto-discover related articles for `article_id` and link them.
pub async fn auto_link(
    ctx: &AppContext,
    article_id: Uuid,
    max_links: Option<usize>,
) -> Result<LinkReport, PressError> {
    let article = ctx.store.get_article(article_id).await?;
    let pool = ctx.store.list_published().await?;

    let discovery = ctx.engine.discover_and_link_in(&article, &pool, max_links);
    tracing::debug!(
        article_id = %article.id,
        candidates = discovery.related.len(),
        "Auto-discovery ranked candidates"
    );

    let outcome = discovery.outcome;
    if outcome.is_changed() {
        persist_outcome(ctx.store.as_ref(), &ctx.config.linking, &article, &outcome).await?;
    }
    Ok(LinkReport::new(&article, outcome, Vec::new()))
}

/// Write a changed outcome back to the store.
///
/// Transient errors are retried up to `persist_retries` times; everything
/// else surfaces immediately.
pub async fn persist_outcome(
    store: &dyn ArticleStore,
    config: &LinkingConfig,
    article: &Article,
    outcome: &LinkOutcome,
) -> Result<Article, PressError> {
    let update = ArticleUpdate {
        id: article.id,
        content: outcome.content.clone(),
        meta_description: outcome.meta_description.clone(),
        expected_updated_at: config.check_revision.then_some(article.updated_at),
    };

    let retry_strategy = ExponentialBackoff::from_millis(RETRY_BASE_MS)
        .max_delay(Duration::from_secs(2))
        .map(jitter)
        .take(config.persist_retries);

    RetryIf::spawn(
        retry_strategy,
        || store.update_links(&update),
        |e: &PressError| {
            let transient = e.is_transient();
            if transient {
                tracing::warn!(article_id = %update.id, error = %e, "Transient write failure, retrying");
            }
            transient
        },
    )
    .await
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use apkpress_core::models::NewArticle;
    use apkpress_core::{MemoryArticleStore, PressConfig};
    use std::sync::Arc;

    async fn seed(store: &MemoryArticleStore, slug: &str, title: &str, content: &str, published: bool) -> Article {
        store
            .insert_article(NewArticle {
                slug: slug.into(),
                title: title.into(),
                content: content.into(),
                meta_description: None,
                published,
            })
            .await
            .unwrap()
    }

    fn ctx(store: Arc<MemoryArticleStore>, linking: LinkingConfig) -> AppContext {
        let mut config = PressConfig::default();
        config.linking = linking;
        AppContext::new(store, config)
    }

    // ========================================================================
    // TEST 1: targeted run persists anchor and description
    // ========================================================================
    #[tokio::test]
    async fn test_link_targets_persists() {
        let store = Arc::new(MemoryArticleStore::new());
        let source = seed(&store, "fast-vpn", "Fast VPN", "<p>Use Fast VPN daily.</p>", true).await;
        let target = seed(&store, "secure-browser", "Secure Browser", "", true).await;
        let ctx = ctx(store.clone(), LinkingConfig::default());

        let refs = vec![TargetRef { id: target.id, anchor_text: Some("Fast VPN".into()) }];
        let report = link_targets(&ctx, source.id, &refs, None).await.unwrap();
        assert_eq!(report.links_added, 1);
        assert_eq!(report.state, PipelineState::Described);

        let saved = store.get_article(source.id).await.unwrap();
        assert_eq!(
            saved.content,
            "<p>Use <a href=\"/post/secure-browser\" data-auto-link>Fast VPN</a> daily.</p>"
        );
        assert_eq!(saved.meta_description.as_deref(), Some("Fast VPN. See also: Secure Browser."));

        let again = link_targets(&ctx, source.id, &refs, None).await.unwrap();
        assert_eq!(again.links_added, 0);
        assert_eq!(again.state, PipelineState::Unchanged);
        assert_eq!(store.get_article(source.id).await.unwrap().updated_at, saved.updated_at);
    }

    // ========================================================================
    // TEST 2: missing and unpublished targets are skipped, not errors
    // ========================================================================
    #[tokio::test]
    async fn test_link_targets_skips_unavailable() {
        let store = Arc::new(MemoryArticleStore::new());
        let source = seed(&store, "hub", "Hub", "<p>Draft Thing and Ghost.</p>", false).await;
        let draft = seed(&store, "draft-thing", "Draft Thing", "", false).await;
        let ghost = Uuid::new_v4();
        let ctx = ctx(store.clone(), LinkingConfig::default());

        let refs = vec![
            TargetRef { id: draft.id, anchor_text: None },
            TargetRef { id: ghost, anchor_text: None },
        ];
        let report = link_targets(&ctx, source.id, &refs, None).await.unwrap();
        assert_eq!(report.links_added, 0);
        assert_eq!(report.skipped_targets, vec![draft.id, ghost]);
    }

    // ========================================================================
    // TEST 3: missing source article is NotFound
    // ========================================================================
    #[tokio::test]
    async fn test_missing_source_not_found() {
        let store = Arc::new(MemoryArticleStore::new());
        let ctx = ctx(store, LinkingConfig::default());
        let err = auto_link(&ctx, Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, PressError::NotFound(_)));
    }

    // ========================================================================
    // TEST 4: auto-link links the best published match once
    // ========================================================================
    #[tokio::test]
    async fn test_auto_link_single() {
        let store = Arc::new(MemoryArticleStore::new());
        let source = seed(&store, "fast-vpn", "Fast VPN", "<p>Works well with Secure Browser.</p>", true).await;
        seed(&store, "secure-browser", "Secure Browser", "<p>Private browsing.</p>", true).await;
        seed(&store, "photo-editor", "Photo Editor", "<p>Edit photos.</p>", true).await;
        let ctx = ctx(store.clone(), LinkingConfig::default());

        let report = auto_link(&ctx, source.id, None).await.unwrap();
        assert_eq!(report.links_added, 1);
        assert_eq!(report.linked_articles[0].slug, "secure-browser");

        let again = auto_link(&ctx, source.id, None).await.unwrap();
        assert_eq!(again.links_added, 0);
    }

    // ========================================================================
    // TEST 5: revision check turns a concurrent edit into Conflict
    // ========================================================================
    #[tokio::test]
    async fn test_revision_conflict_not_retried() {
        let store = Arc::new(MemoryArticleStore::new());
        let source = seed(&store, "fast-vpn", "Fast VPN", "<p>Use Fast VPN daily.</p>", true).await;
        let config = LinkingConfig { check_revision: true, ..LinkingConfig::default() };
        let engine = apkpress_core::LinkEngine::new(&config);
        let outcome = engine.link_article(
            &source,
            &[LinkTarget::new("secure-browser", "Secure Browser").with_anchor_text("Fast VPN")],
            None,
        );

        // Someone else writes first.
        store
            .update_links(&ArticleUpdate {
                id: source.id,
                content: "<p>edited</p>".into(),
                meta_description: None,
                expected_updated_at: None,
            })
            .await
            .unwrap();

        let err = persist_outcome(store.as_ref(), &config, &source, &outcome).await.unwrap_err();
        assert!(matches!(err, PressError::Conflict(id) if id == source.id));
        assert_eq!(store.get_article(source.id).await.unwrap().content, "<p>edited</p>");
    }
}
