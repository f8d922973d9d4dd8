use apkpress_core::{ArticleStore, PressError};

/// Longest slug produced from a title.
const MAX_SLUG_LEN: usize = 80;

/// Highest numeric suffix tried before giving up.
const MAX_SUFFIX: usize = 1000;

/// URL-safe slug: lower-case ASCII alphanumerics joined by single hyphens.
///
/// Falls back to `"article"` when nothing usable remains.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '\'' || c == '’' {
            // "Don't" -> "dont"
        } else {
            pending_hyphen = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        let cut = match slug[..MAX_SLUG_LEN].rfind('-') {
            Some(i) if i > 0 => i,
            _ => MAX_SLUG_LEN,
        };
        slug.truncate(cut);
    }

    if slug.is_empty() {
        "article".to_string()
    } else {
        slug
    }
}

/// `base`, or `base-2`, `base-3`, ... whichever is still free in the store.
pub async fn unique_slug(store: &dyn ArticleStore, base: &str) -> Result<String, PressError> {
    if store.get_article_by_slug(base).await?.is_none() {
        return Ok(base.to_string());
    }
    for n in 2..=MAX_SUFFIX {
        let candidate = format!("{base}-{n}");
        if store.get_article_by_slug(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(PressError::DuplicateSlug(base.to_string()))
}
