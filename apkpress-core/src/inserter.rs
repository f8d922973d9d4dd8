//! Anchor inserter: the write side of the link graph.
//!
//! Phrases are searched in rewritable text nodes only (see
//! [`Fragment::text_slots`]) and wrapped by splicing the source, so a run that
//! inserts nothing returns the input byte for byte.

use std::ops::Range;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::html::{decode_entities, escape_attr, splice, Fragment};
use crate::models::{LinkTarget, LinkedArticle};
use crate::scanner::{classify_href, linked_slugs, HrefKind, LinkPolicy};

/// Marker attribute carried by every anchor this module creates.
pub const AUTO_LINK_ATTR: &str = "data-auto-link";

/// Whitespace as it may appear between two words of a phrase in source HTML.
const SOURCE_WHITESPACE: &str = r"(?:\s|&nbsp;|&#160;)+";

#[derive(Debug, Clone)]
pub struct InsertOptions<'a> {
    pub policy: &'a LinkPolicy,
    /// Slug of the article being edited; never linked to itself.
    pub source_slug: Option<&'a str>,
    pub max_links: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub content: String,
    pub links_added: usize,
    pub linked: Vec<LinkedArticle>,
}

impl InsertOutcome {
    fn unchanged(content: &str) -> Self {
        Self {
            content: content.to_string(),
            links_added: 0,
            linked: Vec::new(),
        }
    }
}

/// Insert at most one anchor per target, in target order, up to `max_links`.
///
/// Targets are skipped silently when their slug is already linked, equals the
/// source slug, or their phrase does not occur as a whole word in prose.
pub fn insert_links(content: &str, targets: &[LinkTarget], options: &InsertOptions<'_>) -> InsertOutcome {
    if options.max_links == 0 || targets.is_empty() {
        return InsertOutcome::unchanged(content);
    }
    if let Err(e) = Fragment::parse(content) {
        tracing::debug!(error = %e, "Skipping link insertion for unparsable content");
        return InsertOutcome::unchanged(content);
    }

    let mut current = content.to_string();
    let mut existing = linked_slugs(content, options.policy);
    let mut linked: Vec<LinkedArticle> = Vec::new();

    for target in targets {
        if linked.len() >= options.max_links {
            break;
        }
        let slug = target.slug.trim();
        if slug.is_empty() || options.source_slug == Some(slug) || existing.contains(slug) {
            continue;
        }
        let phrase = target.search_phrase().trim();
        let Some(pattern) = phrase_pattern(phrase) else {
            continue;
        };

        let found = match Fragment::parse(&current) {
            Ok(fragment) => find_phrase(&fragment, &pattern, phrase),
            Err(_) => None,
        };
        let Some(range) = found else {
            tracing::trace!(slug, phrase, "No text match for link target");
            continue;
        };

        let matched = current[range.clone()].to_string();
        let anchor = format!(
            "<a href=\"{}\" {}>{}</a>",
            escape_attr(&options.policy.href_for(slug)),
            AUTO_LINK_ATTR,
            matched
        );
        current = splice(&current, vec![(range, anchor)]);
        existing.insert(slug.to_string());
        linked.push(LinkedArticle {
            id: target.id,
            slug: slug.to_string(),
            title: target.title.clone(),
            anchor_text: decode_entities(&matched),
        });
    }

    if linked.is_empty() {
        return InsertOutcome::unchanged(content);
    }

    InsertOutcome {
        content: current,
        links_added: linked.len(),
        linked,
    }
}

/// Case-insensitive pattern for `phrase` as it may be written in source HTML.
fn phrase_pattern(phrase: &str) -> Option<Regex> {
    let words: Vec<String> = phrase
        .split_whitespace()
        .map(|word| {
            word.split('&')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join("(?:&amp;|&)")
        })
        .collect();
    if words.is_empty() {
        return None;
    }
    RegexBuilder::new(&words.join(SOURCE_WHITESPACE))
        .case_insensitive(true)
        .build()
        .ok()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Longest character reference name accepted by [`reference_spans`].
const MAX_REFERENCE_LEN: usize = 32;

/// Byte spans of the character references (`&amp;`, `&#233;`, `&eacute;`) in `text`.
fn reference_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'&' {
            i += 1;
            continue;
        }
        let body_start = i + 1;
        let mut j = body_start;
        while j < bytes.len() && j - body_start <= MAX_REFERENCE_LEN && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'#') {
            j += 1;
        }
        let body = &text[body_start..j];
        let well_formed = j < bytes.len()
            && bytes[j] == b';'
            && match body.strip_prefix('#') {
                Some(num) => match num.strip_prefix(['x', 'X']) {
                    Some(hex) => !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()),
                    None => !num.is_empty() && num.bytes().all(|b| b.is_ascii_digit()),
                },
                None => body.bytes().next().is_some_and(|b| b.is_ascii_alphabetic()) && !body.contains('#'),
            };
        if well_formed {
            spans.push(i..j + 1);
            i = j + 1;
        } else {
            i = body_start;
        }
    }
    spans
}

/// Whether a character reference stands for a letter or digit.
///
/// Named references the decoder does not know are almost always accented
/// letters (`&eacute;`), so they count as word characters.
fn reference_is_word(reference: &str) -> bool {
    let decoded = decode_entities(reference);
    if decoded == reference {
        return true;
    }
    decoded.chars().next().is_some_and(is_word_char)
}

/// First whole-word occurrence of `pattern` in a rewritable text node.
///
/// Matches that start or end inside a character reference are skipped, and a
/// neighbouring reference counts as the character it decodes to.
fn find_phrase(fragment: &Fragment<'_>, pattern: &Regex, phrase: &str) -> Option<Range<usize>> {
    let needs_left = phrase.chars().next().is_some_and(is_word_char);
    let needs_right = phrase.chars().next_back().is_some_and(is_word_char);

    for slot in fragment.text_slots() {
        let text = &fragment.source()[slot.clone()];
        let references = reference_spans(text);
        let splits_reference = |pos: usize| references.iter().any(|r| r.start < pos && pos < r.end);
        let word_before = |pos: usize| match references.iter().find(|r| r.end == pos) {
            Some(r) => reference_is_word(&text[r.clone()]),
            None => text[..pos].chars().next_back().is_some_and(is_word_char),
        };
        let word_after = |pos: usize| match references.iter().find(|r| r.start == pos) {
            Some(r) => reference_is_word(&text[r.clone()]),
            None => text[pos..].chars().next().is_some_and(is_word_char),
        };

        let mut start = 0;
        while let Some(m) = pattern.find_at(text, start) {
            let left_ok = !needs_left || !word_before(m.start());
            let right_ok = !needs_right || !word_after(m.end());
            let intact = !splits_reference(m.start()) && !splits_reference(m.end());
            if left_ok && right_ok && intact && !m.as_str().is_empty() {
                return Some(slot.start + m.start()..slot.start + m.end());
            }
            start = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            if start > text.len() {
                break;
            }
        }
    }
    None
}

// ============================================================================
// External link stripping
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripOutcome {
    pub content: String,
    /// Hrefs of the anchors that were unwrapped.
    pub removed: Vec<String>,
}

/// Unwrap every anchor that leaves the site, keeping its inner markup.
pub fn strip_external_links(content: &str, policy: &LinkPolicy) -> StripOutcome {
    let unchanged = || StripOutcome {
        content: content.to_string(),
        removed: Vec::new(),
    };

    let fragment = match Fragment::parse(content) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping external link strip for unparsable content");
            return unchanged();
        }
    };

    let mut edits = Vec::new();
    let mut removed = Vec::new();
    for anchor in fragment.elements("a") {
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        if classify_href(href, policy) != HrefKind::External {
            continue;
        }
        edits.push((anchor.open.clone(), String::new()));
        if let Some(close) = &anchor.close {
            edits.push((close.clone(), String::new()));
        }
        removed.push(href.to_string());
    }

    if edits.is_empty() {
        return unchanged();
    }

    StripOutcome {
        content: splice(content, edits),
        removed,
    }
}

// ============================================================================
// TESTS
// ============================================================================
