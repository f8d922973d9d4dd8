pub mod config;
pub mod db;
pub mod describe;
pub mod error;
pub mod html;
pub mod inserter;
pub mod ipc;
pub mod models;
pub mod pipeline;
pub mod scanner;
pub mod scorer;
pub mod store;

pub use config::{LinkingConfig, PressConfig};
pub use describe::synthesize;
pub use error::{HtmlError, PressError};
pub use inserter::{insert_links, strip_external_links, InsertOptions, InsertOutcome, AUTO_LINK_ATTR};
pub use pipeline::{Discovery, LinkEngine, LinkOutcome, PipelineState};
pub use scanner::{classify_href, linked_slugs, scan, HrefKind, LinkPolicy};
pub use scorer::{CandidateIndex, RelatedArticle, Scorer};
pub use store::{ArticleStore, MemoryArticleStore, PgArticleStore};
