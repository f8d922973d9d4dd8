//! Pure composition of scan → score → insert → describe.
//!
//! Nothing here touches storage; callers persist the returned outcome.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LinkingConfig;
use crate::describe::synthesize;
use crate::inserter::{insert_links, InsertOptions};
use crate::models::{Article, Edge, LinkTarget, LinkedArticle};
use crate::scanner::{linked_slugs, scan, LinkPolicy};
use crate::scorer::{CandidateIndex, RelatedArticle, Scorer};

/// Where an article ended up in one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Scanned,
    Scored,
    /// Anchors inserted, description already covered them.
    Linked,
    /// Anchors inserted and description updated.
    Described,
    /// No new edges.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOutcome {
    pub article_id: Uuid,
    pub content: String,
    pub meta_description: Option<String>,
    pub links_added: usize,
    pub linked: Vec<LinkedArticle>,
    pub state: PipelineState,
}

impl LinkOutcome {
    fn unchanged(article: &Article) -> Self {
        Self {
            article_id: article.id,
            content: article.content.clone(),
            meta_description: article.meta_description.clone(),
            links_added: 0,
            linked: Vec::new(),
            state: PipelineState::Unchanged,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.links_added > 0
    }
}

/// Auto-discovery result: the ranking that fed the inserter plus the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub related: Vec<RelatedArticle>,
    pub outcome: LinkOutcome,
}

#[derive(Debug, Clone)]
pub struct LinkEngine {
    config: LinkingConfig,
    policy: LinkPolicy,
    scorer: Scorer,
}

impl LinkEngine {
    pub fn new(config: &LinkingConfig) -> Self {
        Self {
            config: config.clone(),
            policy: LinkPolicy::from(config),
            scorer: Scorer::new(config),
        }
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn scan(&self, content: &str) -> Vec<Edge> {
        scan(content, &self.policy)
    }

    /// Targeted pipeline: link the given targets into `article`.
    ///
    /// `max_links` overrides the configured per-run budget.
    pub fn link_article(
        &self,
        article: &Article,
        targets: &[LinkTarget],
        max_links: Option<usize>,
    ) -> LinkOutcome {
        let existing = linked_slugs(&article.content, &self.policy);
        tracing::trace!(article_id = %article.id, state = ?PipelineState::Scanned, edges = existing.len());

        let mut seen = BTreeSet::new();
        let fresh: Vec<LinkTarget> = targets
            .iter()
            .filter(|t| t.slug != article.slug && !existing.contains(&t.slug))
            .filter(|t| seen.insert(t.slug.clone()))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return LinkOutcome::unchanged(article);
        }

        let options = InsertOptions {
            policy: &self.policy,
            source_slug: Some(&article.slug),
            max_links: max_links.unwrap_or(self.config.max_links_per_run),
        };
        let inserted = insert_links(&article.content, &fresh, &options);
        if inserted.links_added == 0 {
            return LinkOutcome::unchanged(article);
        }

        let titles: Vec<&str> = inserted.linked.iter().map(|l| l.title.as_str()).collect();
        let description = synthesize(
            article.meta_description.as_deref(),
            &titles,
            &article.title,
            self.config.meta_description_max_chars,
        );
        let description_changed = article.meta_description.as_deref() != Some(description.as_str());
        let (meta_description, state) = if description_changed && !description.is_empty() {
            (Some(description), PipelineState::Described)
        } else {
            (article.meta_description.clone(), PipelineState::Linked)
        };

        tracing::info!(
            article_id = %article.id,
            slug = %article.slug,
            links = inserted.links_added,
            state = ?state,
            "Inserted internal links"
        );

        LinkOutcome {
            article_id: article.id,
            content: inserted.content,
            meta_description,
            links_added: inserted.links_added,
            linked: inserted.linked,
            state,
        }
    }

    /// Auto-discovery pipeline against a pre-built candidate index.
    pub fn discover_and_link(
        &self,
        article: &Article,
        index: &CandidateIndex<'_>,
        max_links: Option<usize>,
    ) -> Discovery {
        let related = self.scorer.find_related(
            article,
            index,
            &self.policy,
            self.config.candidate_pool_size,
        );
        tracing::trace!(article_id = %article.id, state = ?PipelineState::Scored, related = related.len());

        let targets: Vec<LinkTarget> = related.iter().map(LinkTarget::from).collect();
        let outcome = self.link_article(article, &targets, max_links);
        Discovery { related, outcome }
    }

    /// Auto-discovery for a single article against a raw pool.
    pub fn discover_and_link_in(
        &self,
        article: &Article,
        pool: &[Article],
        max_links: Option<usize>,
    ) -> Discovery {
        let index = self.scorer.index(pool);
        self.discover_and_link(article, &index, max_links)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(slug: &str, title: &str, content: &str) -> Article {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Article {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            meta_description: None,
            published: true,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn engine() -> LinkEngine {
        LinkEngine::new(&LinkingConfig::default())
    }

    // ========================================================================
    // TEST 1: the fast-vpn / secure-browser scenario end to end
    // ========================================================================
    #[test]
    fn test_example_scenario() {
        let a = article("fast-vpn", "Fast VPN", "<p>Use Fast VPN daily.</p>");
        let engine = engine();

        let by_title = engine.link_article(&a, &[LinkTarget::new("secure-browser", "Secure Browser")], None);
        assert_eq!(by_title.links_added, 0);
        assert_eq!(by_title.state, PipelineState::Unchanged);
        assert_eq!(by_title.content, a.content);

        let target = LinkTarget::new("secure-browser", "Secure Browser").with_anchor_text("Fast VPN");
        let out = engine.link_article(&a, &[target.clone()], None);
        assert_eq!(
            out.content,
            "<p>Use <a href=\"/post/secure-browser\" data-auto-link>Fast VPN</a> daily.</p>"
        );
        assert_eq!(out.links_added, 1);
        assert_eq!(out.state, PipelineState::Described);
        assert_eq!(out.meta_description.as_deref(), Some("Fast VPN. See also: Secure Browser."));

        let mut updated = a.clone();
        updated.content = out.content.clone();
        updated.meta_description = out.meta_description.clone();
        let again = engine.link_article(&updated, &[target], None);
        assert_eq!(again.links_added, 0);
        assert_eq!(again.content, updated.content);
        assert_eq!(again.meta_description, updated.meta_description);
    }

    // ========================================================================
    // TEST 2: auto-discovery links related articles and is idempotent
    // ========================================================================
    #[test]
    fn test_discover_and_link_idempotent() {
        let a = article(
            "fast-vpn",
            "Fast VPN",
            "<p>Pair it with a Secure Browser and an Ad Blocker for private browsing.</p>",
        );
        let pool = vec![
            a.clone(),
            article("secure-browser", "Secure Browser", "<p>Private browsing.</p>"),
            article("ad-blocker", "Ad Blocker", "<p>Blocks ads while browsing.</p>"),
            article("photo-editor", "Photo Editor", "<p>Edit photos.</p>"),
        ];
        let engine = engine();

        let first = engine.discover_and_link_in(&a, &pool, None);
        assert_eq!(first.outcome.links_added, 2);
        let slugs = linked_slugs(&first.outcome.content, engine.policy());
        assert!(slugs.contains("secure-browser"));
        assert!(slugs.contains("ad-blocker"));
        assert!(!slugs.contains("fast-vpn"));

        let mut updated = a.clone();
        updated.content = first.outcome.content.clone();
        updated.meta_description = first.outcome.meta_description.clone();
        let second = engine.discover_and_link_in(&updated, &pool, None);
        assert_eq!(second.outcome.links_added, 0);
        assert_eq!(second.outcome.content, updated.content);
        assert!(second.related.iter().all(|r| r.slug != "secure-browser" && r.slug != "ad-blocker"));
    }

    // ========================================================================
    // TEST 3: budget override caps discovery
    // ========================================================================
    #[test]
    fn test_budget_override() {
        let a = article("hub", "Tools Hub", "<p>Alpha Tool, Beta Tool, Gamma Tool and Delta Tool.</p>");
        let pool = vec![
            article("alpha", "Alpha Tool", ""),
            article("beta", "Beta Tool", ""),
            article("gamma", "Gamma Tool", ""),
            article("delta", "Delta Tool", ""),
        ];
        let engine = engine();

        let out = engine.discover_and_link_in(&a, &pool, Some(1));
        assert_eq!(out.outcome.links_added, 1);

        let default_budget = engine.discover_and_link_in(&a, &pool, None);
        assert_eq!(default_budget.outcome.links_added, 3);
        assert_eq!(engine.scan(&default_budget.outcome.content).len(), 3);
    }

    // ========================================================================
    // TEST 4: description already covering the titles leaves state Linked
    // ========================================================================
    #[test]
    fn test_linked_state_when_description_covers_titles() {
        let mut a = article("fast-vpn", "Fast VPN", "<p>Works with Secure Browser.</p>");
        a.meta_description = Some("Fast VPN works with Secure Browser.".into());
        let out = engine().link_article(&a, &[LinkTarget::new("secure-browser", "Secure Browser")], None);
        assert_eq!(out.links_added, 1);
        assert_eq!(out.state, PipelineState::Linked);
        assert_eq!(out.meta_description, a.meta_description);
    }

    // ========================================================================
    // TEST 5: self and already-linked targets short-circuit to Unchanged
    // ========================================================================
    #[test]
    fn test_self_and_existing_targets_filtered() {
        let a = article("fast-vpn", "Fast VPN", r#"<p>Fast VPN and <a href="/post/ad-blocker">Ad Blocker</a>.</p>"#);
        let targets = vec![
            LinkTarget::new("fast-vpn", "Fast VPN"),
            LinkTarget::new("ad-blocker", "Ad Blocker"),
        ];
        let out = engine().link_article(&a, &targets, None);
        assert_eq!(out.state, PipelineState::Unchanged);
        assert!(!out.is_changed());
    }
}
