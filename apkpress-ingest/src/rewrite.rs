use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use apkpress_core::ipc::RewriteDraft;
use apkpress_core::models::{Article, LinkedArticle, NewArticle};
use apkpress_core::{strip_external_links, ArticleStore, LinkEngine, PipelineState, PressError};

use crate::slug::{slugify, unique_slug};

/// A draft after external-link stripping and auto-discovery, not yet saved.
#[derive(Debug, Clone)]
pub struct PreparedDraft {
    pub article: NewArticle,
    /// Hrefs of the off-site anchors that were unwrapped.
    pub removed_links: Vec<String>,
    pub linked: Vec<LinkedArticle>,
    pub state: PipelineState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub article_id: Uuid,
    pub slug: String,
    pub title: String,
    pub external_links_removed: usize,
    pub links_added: usize,
    pub linked_articles: Vec<LinkedArticle>,
    pub meta_description: Option<String>,
}

/// Strip off-site anchors from `draft` and auto-link it against `pool`.
///
/// `slug` must already be resolved; the draft is treated as an unsaved
/// article with that slug so it never links to itself.
pub fn prepare_rewritten(
    draft: &RewriteDraft,
    slug: &str,
    pool: &[Article],
    engine: &LinkEngine,
) -> PreparedDraft {
    let stripped = strip_external_links(&draft.content, engine.policy());
    if !stripped.removed.is_empty() {
        tracing::debug!(slug, removed = stripped.removed.len(), "Unwrapped external links");
    }

    let now = Utc::now();
    let unsaved = Article {
        id: Uuid::nil(),
        slug: slug.to_string(),
        title: draft.title.clone(),
        content: stripped.content,
        meta_description: draft.meta_description.clone(),
        published: draft.published,
        created_at: now,
        updated_at: now,
    };
    let discovery = engine.discover_and_link_in(&unsaved, pool, None);
    let outcome = discovery.outcome;

    PreparedDraft {
        article: NewArticle {
            slug: unsaved.slug,
            title: unsaved.title,
            content: outcome.content,
            meta_description: outcome.meta_description,
            published: unsaved.published,
        },
        removed_links: stripped.removed,
        linked: outcome.linked,
        state: outcome.state,
    }
}

/// Prepare a rewritten draft and save it as a new article.
pub async fn ingest_rewritten(
    store: &dyn ArticleStore,
    engine: &LinkEngine,
    draft: RewriteDraft,
) -> Result<IngestReport, PressError> {
    if draft.title.trim().is_empty() {
        return Err(PressError::Other("draft title is required".to_string()));
    }

    let slug = match draft.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => unique_slug(store, &slugify(&draft.title)).await?,
    };

    let pool = store.list_published().await?;
    let prepared = prepare_rewritten(&draft, &slug, &pool, engine);
    let removed = prepared.removed_links.len();
    let saved = store.insert_article(prepared.article).await?;

    tracing::info!(
        article_id = %saved.id,
        slug = %saved.slug,
        external_links_removed = removed,
        links_added = prepared.linked.len(),
        "Ingested rewritten article"
    );

    Ok(IngestReport {
        article_id: saved.id,
        slug: saved.slug,
        title: saved.title,
        external_links_removed: removed,
        links_added: prepared.linked.len(),
        linked_articles: prepared.linked,
        meta_description: saved.meta_description,
    })
}

// ============================================================================
// TESTS
// ============================================================================
