//! Article persistence.
//!
//! The link engine only ever reads and writes articles through
//! [`ArticleStore`]. Two backends:
//! - **PostgreSQL** - [`PgArticleStore`], the production store
//! - **Memory** - [`MemoryArticleStore`], for tests and local demos

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PressError;
use crate::models::{Article, ArticleUpdate, NewArticle};

pub use memory::MemoryArticleStore;
pub use postgres::PgArticleStore;

// ============================================================================
// ArticleStore trait
// ============================================================================

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Fetch one article, published or not. Missing rows are `NotFound`.
    async fn get_article(&self, id: Uuid) -> Result<Article, PressError>;

    async fn get_article_by_slug(&self, slug: &str) -> Result<Option<Article>, PressError>;

    /// Every published article, oldest first.
    async fn list_published(&self) -> Result<Vec<Article>, PressError>;

    /// Write back content and description of a pipeline run.
    ///
    /// With `expected_updated_at` set the write is conditional and a stale
    /// revision is reported as `Conflict`.
    async fn update_links(&self, update: &ArticleUpdate) -> Result<Article, PressError>;

    /// First save. Slug collisions are `DuplicateSlug`.
    async fn insert_article(&self, new: NewArticle) -> Result<Article, PressError>;

    /// Short backend description, e.g. the PostgreSQL version string.
    async fn health(&self) -> Result<String, PressError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
