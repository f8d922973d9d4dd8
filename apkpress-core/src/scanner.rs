//! Anchor scanner: reads the outbound edges stored in an article body.
//!
//! The body is the only edge store, so this is the read side of the link
//! graph: every `<a href>` that resolves to an article page becomes an
//! [`Edge`]. External links, other internal routes (pages, categories) and
//! `mailto:`/`tel:`/fragment links are ignored.

use std::collections::BTreeSet;

use scraper::{Html, Selector};
use url::Url;

use crate::config::LinkingConfig;
use crate::html::Fragment;
use crate::models::Edge;

/// Schemes that never address a page.
const NON_PAGE_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:", "sms:", "data:"];

/// How hrefs are recognised as article links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPolicy {
    post_prefix: String,
    site_host: Option<String>,
}

impl LinkPolicy {
    pub fn new(post_prefix: &str, site_host: Option<&str>) -> Self {
        let trimmed = post_prefix.trim_matches('/');
        let post_prefix = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        };
        Self {
            post_prefix,
            site_host: site_host.map(normalize_host).filter(|h| !h.is_empty()),
        }
    }

    pub fn post_prefix(&self) -> &str {
        &self.post_prefix
    }

    /// The href written into inserted anchors.
    pub fn href_for(&self, slug: &str) -> String {
        format!("{}{}", self.post_prefix, slug)
    }

    pub fn is_site_host(&self, host: Option<&str>) -> bool {
        match (&self.site_host, host) {
            (Some(site), Some(host)) => *site == normalize_host(host),
            _ => false,
        }
    }

    fn slug_from_path(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(&self.post_prefix)?;
        let slug = rest.trim_end_matches('/');
        if slug.is_empty() || slug.contains('/') {
            return None;
        }
        Some(slug.to_string())
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self::new("/post/", None)
    }
}

impl From<&LinkingConfig> for LinkPolicy {
    fn from(config: &LinkingConfig) -> Self {
        Self::new(&config.post_prefix, config.site_host.as_deref())
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HrefKind {
    /// Points at an article page on this site.
    Article(String),
    /// Another route on this site (page, category, relative path).
    Internal,
    /// Leaves the site.
    External,
    /// Fragment, mailto, tel, javascript and friends.
    Other,
}

pub fn classify_href(href: &str, policy: &LinkPolicy) -> HrefKind {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return HrefKind::Other;
    }
    let lower = href.to_ascii_lowercase();
    if NON_PAGE_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        return HrefKind::Other;
    }

    let path = if href.starts_with("//") {
        match Url::parse(&format!("https:{href}")) {
            Ok(u) if policy.is_site_host(u.host_str()) => u.path().to_string(),
            Ok(_) => return HrefKind::External,
            Err(_) => return HrefKind::Other,
        }
    } else if let Ok(u) = Url::parse(href) {
        if !matches!(u.scheme(), "http" | "https") {
            return HrefKind::Other;
        }
        if !policy.is_site_host(u.host_str()) {
            return HrefKind::External;
        }
        u.path().to_string()
    } else if href.starts_with('/') {
        href.split(['?', '#']).next().unwrap_or_default().to_string()
    } else {
        return HrefKind::Internal;
    };

    match policy.slug_from_path(&path) {
        Some(slug) => HrefKind::Article(slug),
        None => HrefKind::Internal,
    }
}

/// Every article anchor in `content`, in document order, duplicates included.
///
/// Anchors are read from the same span-preserving tree the inserter edits, so
/// each `<a>` start tag yields at most one edge.
pub fn scan(content: &str, policy: &LinkPolicy) -> Vec<Edge> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let fragment = match Fragment::parse(content) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "Falling back to lenient anchor scan");
            return scan_lenient(content, policy);
        }
    };

    fragment
        .elements("a")
        .into_iter()
        .filter_map(|el| {
            let href = el.attr("href")?;
            edge_for(href, &el.text(content), policy)
        })
        .collect()
}

/// Scan for content the tokenizer rejects (unterminated tags or comments).
fn scan_lenient(content: &str, policy: &LinkPolicy) -> Vec<Edge> {
    let fragment = Html::parse_fragment(content);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    fragment
        .select(&selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            edge_for(href, &el.text().collect::<String>(), policy)
        })
        .collect()
}

fn edge_for(href: &str, text: &str, policy: &LinkPolicy) -> Option<Edge> {
    match classify_href(href, policy) {
        HrefKind::Article(slug) => Some(Edge {
            slug,
            anchor_text: text.split_whitespace().collect::<Vec<_>>().join(" "),
        }),
        _ => None,
    }
}

/// Distinct slugs already linked from `content`.
pub fn linked_slugs(content: &str, policy: &LinkPolicy) -> BTreeSet<String> {
    scan(content, policy).into_iter().map(|e| e.slug).collect()
}

// ============================================================================
// TESTS
// ============================================================================
