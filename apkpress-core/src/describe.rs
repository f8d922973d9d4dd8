//! Meta-description synthesizer.
//!
//! Appends a "See also" clause naming newly linked articles, dropping whole
//! trailing titles until the result fits the character budget.

const SEE_ALSO: &str = "See also: ";

/// Description mentioning `linked_titles`, at most `max_chars` characters.
///
/// Returns `current` untouched when it already mentions every title or when
/// there is nothing to mention.
pub fn synthesize(current: Option<&str>, linked_titles: &[&str], title: &str, max_chars: usize) -> String {
    let existing = current.map(str::trim).filter(|s| !s.is_empty());

    let mut titles: Vec<&str> = Vec::new();
    for t in linked_titles.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !titles.iter().any(|seen| seen.eq_ignore_ascii_case(t)) {
            titles.push(t);
        }
    }

    let missing: Vec<&str> = titles
        .into_iter()
        .filter(|t| !existing.is_some_and(|d| contains_ignore_case(d, t)))
        .collect();
    if missing.is_empty() {
        return current.unwrap_or_default().to_string();
    }

    let base = terminate(existing.unwrap_or(title.trim()));
    for n in (1..=missing.len()).rev() {
        let candidate = with_clause(&base, &missing[..n]);
        if candidate.chars().count() <= max_chars {
            return candidate;
        }
    }

    tracing::debug!(max_chars, "No room for a see-also clause");
    truncate_words(existing.map(str::to_string).unwrap_or(base).as_str(), max_chars)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn terminate(s: &str) -> String {
    let s = s.trim();
    if s.is_empty() || s.ends_with(['.', '!', '?']) {
        s.to_string()
    } else {
        format!("{s}.")
    }
}

fn with_clause(base: &str, titles: &[&str]) -> String {
    let clause = format!("{SEE_ALSO}{}.", titles.join(", "));
    if base.is_empty() {
        clause
    } else {
        format!("{base} {clause}")
    }
}

/// Cut `s` to at most `max_chars` characters on a word boundary.
pub fn truncate_words(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }

    let (cut, next) = match s.char_indices().nth(max_chars) {
        Some((i, c)) => (i, c),
        None => return s.to_string(),
    };
    let head = &s[..cut];
    let kept = if next.is_whitespace() {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(space) => &head[..space],
            None => "",
        }
    };
    kept.trim_end()
        .trim_end_matches([',', ';', ':', '-', '–', '—'])
        .trim_end()
        .to_string()
}

// ============================================================================
// TESTS
// ============================================================================
