use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An internal anchor found in an article body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub slug: String,
    pub anchor_text: String,
}

/// A requested outbound link for the inserter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub slug: String,
    pub title: String,
    /// Phrase to wrap instead of the title.
    #[serde(default)]
    pub anchor_text: Option<String>,
}

impl LinkTarget {
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            slug: slug.into(),
            title: title.into(),
            anchor_text: None,
        }
    }

    pub fn with_anchor_text(mut self, anchor_text: impl Into<String>) -> Self {
        self.anchor_text = Some(anchor_text.into());
        self
    }

    /// The phrase searched for in the body: explicit anchor text, else the title.
    pub fn search_phrase(&self) -> &str {
        match self.anchor_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.title,
        }
    }
}

/// A link that was actually inserted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedArticle {
    pub id: Option<Uuid>,
    pub slug: String,
    pub title: String,
    pub anchor_text: String,
}

/// An edge joined against the live article table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub anchor_text: String,
}
