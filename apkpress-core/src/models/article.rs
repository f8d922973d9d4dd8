use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub meta_description: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a first save. The store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub meta_description: Option<String>,
    pub published: bool,
}

/// Write-back of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleUpdate {
    pub id: Uuid,
    pub content: String,
    pub meta_description: Option<String>,
    /// When set, the write only applies if the stored `updated_at` still matches.
    pub expected_updated_at: Option<DateTime<Utc>>,
}
