use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ArticleStore;
use crate::error::PressError;
use crate::models::{Article, ArticleUpdate, NewArticle};

/// In-process store keyed by id.
#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: RwLock<BTreeMap<Uuid, Article>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.articles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.articles.read().await.is_empty()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn get_article(&self, id: Uuid) -> Result<Article, PressError> {
        self.articles
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PressError::NotFound(id.to_string()))
    }

    async fn get_article_by_slug(&self, slug: &str) -> Result<Option<Article>, PressError> {
        Ok(self
            .articles
            .read()
            .await
            .values()
            .find(|a| a.slug == slug)
            .cloned())
    }

    async fn list_published(&self) -> Result<Vec<Article>, PressError> {
        let mut published: Vec<Article> = self
            .articles
            .read()
            .await
            .values()
            .filter(|a| a.published)
            .cloned()
            .collect();
        published.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(published)
    }

    async fn update_links(&self, update: &ArticleUpdate) -> Result<Article, PressError> {
        let mut articles = self.articles.write().await;
        let article = articles
            .get_mut(&update.id)
            .ok_or_else(|| PressError::NotFound(update.id.to_string()))?;

        if let Some(expected) = update.expected_updated_at {
            if article.updated_at != expected {
                return Err(PressError::Conflict(update.id));
            }
        }

        article.content = update.content.clone();
        article.meta_description = update.meta_description.clone();
        // Strictly increasing so revision checks see every write.
        let now = Utc::now();
        article.updated_at = if now > article.updated_at {
            now
        } else {
            article.updated_at + Duration::microseconds(1)
        };
        Ok(article.clone())
    }

    async fn insert_article(&self, new: NewArticle) -> Result<Article, PressError> {
        let mut articles = self.articles.write().await;
        if articles.values().any(|a| a.slug == new.slug) {
            return Err(PressError::DuplicateSlug(new.slug));
        }

        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            slug: new.slug,
            title: new.title,
            content: new.content,
            meta_description: new.meta_description,
            published: new.published,
            created_at: now,
            updated_at: now,
        };
        articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn health(&self) -> Result<String, PressError> {
        Ok(format!("memory ({} articles)", self.len().await))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// TESTS
// ============================================================================
