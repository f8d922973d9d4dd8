//! Relevance scorer: lexical relatedness between articles.
//!
//! Score = `title_weight * |target ∩ candidate title terms|`
//!       + `body_weight  * |target ∩ candidate body-only terms|`
//!
//! Target terms come from the title plus a plain-text excerpt of the body.
//! Ties break on title hits, then recency, then slug, so runs are reproducible.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LinkingConfig;
use crate::models::{Article, LinkTarget};
use crate::scanner::{linked_slugs, LinkPolicy};

/// Function words plus the vocabulary every APK listing shares.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "but", "by", "can", "could", "did", "do", "does", "each", "for", "from", "get",
    "gets", "had", "has", "have", "he", "her", "here", "his", "how", "if", "in", "into", "is",
    "it", "its", "just", "like", "may", "more", "most", "much", "must", "my", "new", "no", "not",
    "now", "of", "on", "one", "only", "or", "other", "our", "out", "over", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "up", "use", "used", "using", "very",
    "was", "we", "were", "what", "when", "where", "which", "while", "who", "why", "will", "with",
    "would", "you", "your", "yours",
    // listing boilerplate
    "apk", "app", "apps", "android", "download", "downloads", "free", "latest", "version",
    "mod", "update", "updated", "install", "best", "full", "file", "size", "v1", "v2",
];

const HIDDEN_TEXT_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedArticle {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub score: u32,
    pub title_hits: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&RelatedArticle> for LinkTarget {
    fn from(related: &RelatedArticle) -> Self {
        LinkTarget {
            id: Some(related.id),
            slug: related.slug.clone(),
            title: related.title.clone(),
            anchor_text: None,
        }
    }
}

#[derive(Debug)]
struct IndexedArticle<'a> {
    article: &'a Article,
    title_terms: HashSet<String>,
    body_terms: HashSet<String>,
}

/// Pre-tokenized candidate pool, built once per batch.
#[derive(Debug)]
pub struct CandidateIndex<'a> {
    entries: Vec<IndexedArticle<'a>>,
}

impl CandidateIndex<'_> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Scorer {
    stopwords: HashSet<String>,
    min_token_len: usize,
    title_weight: u32,
    body_weight: u32,
    excerpt_chars: usize,
    min_score: u32,
}

impl Scorer {
    pub fn new(config: &LinkingConfig) -> Self {
        let stopwords = STOPWORDS
            .iter()
            .map(|w| w.to_string())
            .chain(config.extra_stopwords.iter().map(|w| w.to_lowercase()))
            .collect();
        Self {
            stopwords,
            min_token_len: config.min_token_len.max(1),
            title_weight: config.title_weight,
            body_weight: config.body_weight,
            excerpt_chars: config.excerpt_chars,
            min_score: config.min_score,
        }
    }

    /// Override the minimum score; `0` keeps zero-overlap candidates.
    pub fn with_min_score(mut self, min_score: u32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Significant terms: lower-cased, stop-words and short/numeric tokens dropped.
    pub fn terms(&self, text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .filter(|t| t.chars().count() >= self.min_token_len)
            .filter(|t| !t.chars().all(|c| c.is_numeric()))
            .filter(|t| !self.stopwords.contains(t))
            .collect()
    }

    fn body_terms(&self, content: &str) -> HashSet<String> {
        self.terms(&excerpt(&plain_text(content), self.excerpt_chars))
    }

    /// Tokenize the published part of `pool`.
    pub fn index<'a>(&self, pool: &'a [Article]) -> CandidateIndex<'a> {
        let mut seen = BTreeSet::new();
        let entries = pool
            .iter()
            .filter(|a| a.published)
            .filter(|a| seen.insert(a.slug.clone()))
            .map(|article| IndexedArticle {
                article,
                title_terms: self.terms(&article.title),
                body_terms: self.body_terms(&article.content),
            })
            .collect();
        CandidateIndex { entries }
    }

    /// Rank `index` against `target`, excluding the target itself and anything
    /// its body already links to.
    pub fn find_related(
        &self,
        target: &Article,
        index: &CandidateIndex<'_>,
        policy: &LinkPolicy,
        max_results: usize,
    ) -> Vec<RelatedArticle> {
        if max_results == 0 {
            return Vec::new();
        }

        let already_linked = linked_slugs(&target.content, policy);
        let mut target_terms = self.terms(&target.title);
        target_terms.extend(self.body_terms(&target.content));

        let mut ranked: Vec<RelatedArticle> = index
            .entries
            .iter()
            .filter(|c| c.article.id != target.id && c.article.slug != target.slug)
            .filter(|c| !already_linked.contains(&c.article.slug))
            .filter_map(|c| {
                let title_hits = target_terms
                    .iter()
                    .filter(|t| c.title_terms.contains(*t))
                    .count();
                let body_hits = target_terms
                    .iter()
                    .filter(|t| !c.title_terms.contains(*t) && c.body_terms.contains(*t))
                    .count();
                let score = weighted(self.title_weight, title_hits)
                    .saturating_add(weighted(self.body_weight, body_hits));
                (score >= self.min_score).then(|| RelatedArticle {
                    id: c.article.id,
                    slug: c.article.slug.clone(),
                    title: c.article.title.clone(),
                    score,
                    title_hits,
                    created_at: c.article.created_at,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.title_hits.cmp(&a.title_hits))
                .then(b.created_at.cmp(&a.created_at))
                .then(a.slug.cmp(&b.slug))
        });
        ranked.truncate(max_results);

        tracing::debug!(
            target_slug = %target.slug,
            candidates = index.entries.len(),
            ranked = ranked.len(),
            "Scored related articles"
        );

        ranked
    }

    /// One-shot variant of [`Scorer::find_related`] for a single article.
    pub fn find_related_in(
        &self,
        target: &Article,
        pool: &[Article],
        policy: &LinkPolicy,
        max_results: usize,
    ) -> Vec<RelatedArticle> {
        let index = self.index(pool);
        self.find_related(target, &index, policy, max_results)
    }
}

fn weighted(weight: u32, hits: usize) -> u32 {
    weight.saturating_mul(u32::try_from(hits).unwrap_or(u32::MAX))
}

/// Visible text of an HTML fragment, whitespace collapsed.
pub fn plain_text(content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(content);
    let mut out = String::with_capacity(content.len() / 2);
    for node in fragment.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| HIDDEN_TEXT_PARENTS.contains(&e.name())))
            .unwrap_or(false);
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `text`, backed off to a word boundary.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let head = &text[..cut];
            match head.rfind(char::is_whitespace) {
                Some(space) => head[..space].to_string(),
                None => head.to_string(),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(slug: &str, title: &str, content: &str, day: u32) -> Article {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
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

    fn scorer() -> Scorer {
        Scorer::new(&LinkingConfig::default())
    }

    // ========================================================================
    // TEST 1: terms drop stop-words, short and numeric tokens
    // ========================================================================
    #[test]
    fn test_terms_filtering() {
        let terms = scorer().terms("The BEST free VPN app for Android 2024, v2 — fast & secure!");
        let mut sorted: Vec<_> = terms.into_iter().collect();
        sorted.sort();
        assert_eq!(sorted, vec!["fast", "secure", "vpn"]);
    }

    // ========================================================================
    // TEST 2: title overlap outranks body overlap
    // ========================================================================
    #[test]
    fn test_title_matches_weigh_more() {
        let target = article("fast-vpn", "Fast VPN", "<p>Private browsing with a secure tunnel.</p>", 1);
        let title_match = article("secure-browser", "Secure Browser", "<p>Nothing shared.</p>", 2);
        let body_match = article("photo-editor", "Photo Editor", "<p>Edit photos in a secure sandbox.</p>", 3);
        let pool = vec![target.clone(), title_match.clone(), body_match.clone()];

        let ranked = scorer().find_related_in(&target, &pool, &LinkPolicy::default(), 5);
        let slugs: Vec<_> = ranked.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["secure-browser", "photo-editor"]);
        assert_eq!(ranked[0].score, 2);
        assert_eq!(ranked[1].score, 1);
        assert_eq!(ranked[0].title_hits, 1);
    }

    // ========================================================================
    // TEST 3: self, unpublished and already-linked candidates are excluded
    // ========================================================================
    #[test]
    fn test_exclusions() {
        let target = article(
            "fast-vpn",
            "Fast VPN",
            r#"<p>Pairs well with <a href="/post/vpn-guide">the guide</a>.</p>"#,
            1,
        );
        let mut twin = article("fast-vpn", "Fast VPN Mirror", "<p>fast vpn</p>", 2);
        twin.id = Uuid::new_v4();
        let linked = article("vpn-guide", "VPN Guide", "<p>vpn</p>", 3);
        let mut draft = article("vpn-draft", "VPN Draft", "<p>vpn</p>", 4);
        draft.published = false;
        let ok = article("vpn-review", "VPN Review", "<p>vpn</p>", 5);
        let pool = vec![target.clone(), twin, linked, draft, ok];

        let ranked = scorer().find_related_in(&target, &pool, &LinkPolicy::default(), 10);
        let slugs: Vec<_> = ranked.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["vpn-review"]);
    }

    // ========================================================================
    // TEST 4: ties break by recency, then slug
    // ========================================================================
    #[test]
    fn test_tie_breaking_is_deterministic() {
        let target = article("target", "Chess Engine", "", 1);
        let older = article("b-chess", "Chess Clock", "", 2);
        let newer = article("c-chess", "Chess Tutor", "", 9);
        let same_day = article("a-chess", "Chess Puzzles", "", 9);
        let pool = vec![older, newer, same_day];

        let ranked = scorer().find_related_in(&target, &pool, &LinkPolicy::default(), 3);
        let slugs: Vec<_> = ranked.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a-chess", "c-chess", "b-chess"]);
    }

    // ========================================================================
    // TEST 5: empty content yields no terms and no results
    // ========================================================================
    #[test]
    fn test_empty_target_yields_nothing() {
        let target = article("empty", "", "", 1);
        let pool = vec![article("other", "Other Thing", "<p>words here</p>", 2)];
        assert!(scorer().find_related_in(&target, &pool, &LinkPolicy::default(), 5).is_empty());

        let relaxed = scorer().with_min_score(0);
        assert_eq!(relaxed.find_related_in(&target, &pool, &LinkPolicy::default(), 5).len(), 1);
    }

    // ========================================================================
    // TEST 6: max_results caps the output
    // ========================================================================
    #[test]
    fn test_max_results() {
        let target = article("t", "Music Player", "", 1);
        let pool: Vec<_> = (2..8)
            .map(|d| article(&format!("music-{d}"), "Music Tool", "", d))
            .collect();
        assert_eq!(scorer().find_related_in(&target, &pool, &LinkPolicy::default(), 2).len(), 2);
        assert!(scorer().find_related_in(&target, &pool, &LinkPolicy::default(), 0).is_empty());
    }

    // ========================================================================
    // TEST 7: plain text skips scripts and collapses whitespace
    // ========================================================================
    #[test]
    fn test_plain_text() {
        let html = "<h2>Intro</h2>\n<p>Hello <b>world</b></p><script>var x = 1;</script><style>p{}</style>";
        assert_eq!(plain_text(html), "Intro Hello world");
        assert_eq!(plain_text("   "), "");
    }

    // ========================================================================
    // TEST 8: oversized weights saturate instead of overflowing
    // ========================================================================
    #[test]
    fn test_large_weights_saturate() {
        let heavy = Scorer::new(&LinkingConfig {
            title_weight: u32::MAX,
            body_weight: u32::MAX,
            ..LinkingConfig::default()
        });
        let target = article("fast-vpn", "Fast VPN", "<p>A secure tunnel.</p>", 1);
        let both = article("vpn-fast", "VPN Fast Secure", "<p>Tunnel everything.</p>", 2);
        let pool = vec![target.clone(), both];

        let ranked = heavy.find_related_in(&target, &pool, &LinkPolicy::default(), 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, u32::MAX);
        assert_eq!(ranked[0].title_hits, 3);
    }

    #[test]
    fn test_excerpt_backs_off_to_word_boundary() {
        assert_eq!(excerpt("alpha beta gamma", 8), "alpha");
        assert_eq!(excerpt("alpha", 10), "alpha");
        assert_eq!(excerpt("alphabet", 3), "alp");
    }
}
