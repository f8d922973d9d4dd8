//! Read-only outbound links view.

use std::collections::HashMap;

use apkpress_core::models::{Article, ResolvedLink};
use apkpress_core::PressError;
use uuid::Uuid;

use crate::router::AppContext;

/// Anchors in `article_id`'s body that point at live published articles,
/// in document order. Dangling edges are dropped.
pub async fn outbound_links(ctx: &AppContext, article_id: Uuid) -> Result<Vec<ResolvedLink>, PressError> {
    let article = ctx.store.get_article(article_id).await?;
    let edges = ctx.engine.scan(&article.content);
    if edges.is_empty() {
        return Ok(Vec::new());
    }

    let published = ctx.store.list_published().await?;
    let by_slug: HashMap<&str, &Article> = published.iter().map(|a| (a.slug.as_str(), a)).collect();

    let links: Vec<ResolvedLink> = edges
        .into_iter()
        .filter_map(|edge| {
            let target = by_slug.get(edge.slug.as_str())?;
            Some(ResolvedLink {
                id: target.id,
                slug: edge.slug,
                title: target.title.clone(),
                anchor_text: edge.anchor_text,
            })
        })
        .collect();

    tracing::debug!(article_id = %article_id, links = links.len(), "Resolved outbound links");
    Ok(links)
}
