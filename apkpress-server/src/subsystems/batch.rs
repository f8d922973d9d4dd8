//! Batch auto-linking over every published article
//!
//! Articles are processed one at a time against a candidate index built once
//! per run. A failure on one article is recorded in its report entry and the
//! loop moves on. The same run can be scheduled periodically via
//! `linking.auto_link_interval_minutes`.

use apkpress_core::models::LinkedArticle;
use apkpress_core::PressError;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::linker::persist_outcome;
use crate::router::AppContext;

/// Per-article entry of a batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleReport {
    pub article_id: Uuid,
    pub title: String,
    pub links_added: usize,
    pub linked_articles: Vec<LinkedArticle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: usize,
    /// Articles whose new links were written.
    pub modified: usize,
    pub links_added: usize,
    pub failed: usize,
    pub articles: Vec<ArticleReport>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!("auto-linked {} of {} articles", self.modified, self.processed)
    }
}

/// Auto-link every published article.
///
/// Only a failure to read the published pool aborts the run; per-article
/// write failures land in `articles[].error`.
pub async fn auto_link_all(
    ctx: &AppContext,
    max_links: Option<usize>,
) -> Result<BatchReport, PressError> {
    let pool = ctx.store.list_published().await?;
    let index = ctx.engine.scorer().index(&pool);
    tracing::info!(articles = pool.len(), "Starting auto-link batch");

    let mut report = BatchReport::default();
    for article in &pool {
        report.processed += 1;

        let outcome = ctx.engine.discover_and_link(article, &index, max_links).outcome;
        let mut entry = ArticleReport {
            article_id: article.id,
            title: article.title.clone(),
            links_added: 0,
            linked_articles: Vec::new(),
            error: None,
        };

        if outcome.is_changed() {
            match persist_outcome(ctx.store.as_ref(), &ctx.config.linking, article, &outcome).await {
                Ok(_) => {
                    report.modified += 1;
                    report.links_added += outcome.links_added;
                    entry.links_added = outcome.links_added;
                    entry.linked_articles = outcome.linked;
                }
                Err(e) => {
                    tracing::warn!(article_id = %article.id, error = %e, "Auto-link write failed");
                    report.failed += 1;
                    entry.error = Some(e.to_string());
                }
            }
        }

        report.articles.push(entry);
    }

    tracing::info!(
        processed = report.processed,
        modified = report.modified,
        links_added = report.links_added,
        failed = report.failed,
        "Auto-link batch complete"
    );
    Ok(report)
}

/// Called from main.rs when `linking.auto_link_interval_minutes` is set.
pub async fn run_auto_link_loop(
    ctx: AppContext,
    interval_minutes: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = tokio::time::Duration::from_secs(interval_minutes.max(1) * 60);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("Auto-link loop started (interval: {}min)", interval_minutes.max(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match auto_link_all(&ctx, None).await {
                    Ok(report) => tracing::info!("Scheduled run: {}", report.summary()),
                    Err(e) => tracing::error!("Scheduled auto-link error: {}", e),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Auto-link loop shutting down");
                break;
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
