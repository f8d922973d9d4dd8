use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::ArticleStore;
use crate::db;
use crate::error::PressError;
use crate::models::{Article, ArticleUpdate, NewArticle};

const ARTICLE_COLUMNS: &str =
    "id, slug, title, content, meta_description, published, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn get_article(&self, id: Uuid) -> Result<Article, PressError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");
        sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PressError::NotFound(id.to_string()))
    }

    async fn get_article_by_slug(&self, slug: &str) -> Result<Option<Article>, PressError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE slug = $1");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    async fn list_published(&self) -> Result<Vec<Article>, PressError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE published = TRUE ORDER BY created_at ASC, id ASC"
        );
        let articles = sqlx::query_as::<_, Article>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    async fn update_links(&self, update: &ArticleUpdate) -> Result<Article, PressError> {
        // clock_timestamp() keeps updated_at moving within one transaction.
        let sql = format!(
            r#"
            UPDATE articles
            SET content = $2,
                meta_description = $3,
                updated_at = GREATEST(clock_timestamp(), updated_at + interval '1 microsecond')
            WHERE id = $1
              AND ($4::timestamptz IS NULL OR updated_at = $4)
            RETURNING {ARTICLE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Article>(&sql)
            .bind(update.id)
            .bind(&update.content)
            .bind(&update.meta_description)
            .bind(update.expected_updated_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(article) => Ok(article),
            None if update.expected_updated_at.is_some() => {
                // Distinguish a stale revision from a deleted row.
                let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM articles WHERE id = $1")
                    .bind(update.id)
                    .fetch_optional(&self.pool)
                    .await?;
                match exists {
                    Some(_) => Err(PressError::Conflict(update.id)),
                    None => Err(PressError::NotFound(update.id.to_string())),
                }
            }
            None => Err(PressError::NotFound(update.id.to_string())),
        }
    }

    async fn insert_article(&self, new: NewArticle) -> Result<Article, PressError> {
        let sql = format!(
            r#"
            INSERT INTO articles (slug, title, content, meta_description, published)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ARTICLE_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, Article>(&sql)
            .bind(&new.slug)
            .bind(&new.title)
            .bind(&new.content)
            .bind(&new.meta_description)
            .bind(new.published)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(article) => Ok(article),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(PressError::DuplicateSlug(new.slug))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn health(&self) -> Result<String, PressError> {
        Ok(db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
