pub mod article;
pub mod edge;

pub use article::{Article, ArticleUpdate, NewArticle};
pub use edge::{Edge, LinkTarget, LinkedArticle, ResolvedLink};
