use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PressError;

/// A target named by id in a targeted link request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    pub id: Uuid,
    /// Phrase to wrap instead of the target's title.
    #[serde(default)]
    pub anchor_text: Option<String>,
}

/// An externally rewritten draft awaiting its first save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PressRequest {
    Ping,
    Health,
    LinkArticles {
        article_id: Uuid,
        targets: Vec<TargetRef>,
        #[serde(default)]
        max_links: Option<usize>,
    },
    AutoLink {
        article_id: Uuid,
        #[serde(default)]
        max_links: Option<usize>,
    },
    AutoLinkAll {
        #[serde(default)]
        max_links: Option<usize>,
    },
    OutboundLinks {
        article_id: Uuid,
    },
    IngestRewrite {
        draft: RewriteDraft,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PressResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Error class for callers that map failures, e.g. `not_found`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub version: String,
}

impl PressResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            code: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            code: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn from_error(err: &PressError) -> Self {
        Self {
            code: Some(err.code().to_string()),
            ..Self::err(err.to_string())
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_tagged_by_action() {
        let id = Uuid::new_v4();
        let req: PressRequest = serde_json::from_value(serde_json::json!({
            "action": "link_articles",
            "article_id": id,
            "targets": [{"id": id, "anchor_text": "Fast VPN"}]
        }))
        .unwrap();
        match req {
            PressRequest::LinkArticles { article_id, targets, max_links } => {
                assert_eq!(article_id, id);
                assert_eq!(targets[0].anchor_text.as_deref(), Some("Fast VPN"));
                assert!(max_links.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        let req: PressRequest =
            serde_json::from_value(serde_json::json!({"action": "auto_link_all"})).unwrap();
        assert!(matches!(req, PressRequest::AutoLinkAll { max_links: None }));
    }

    #[test]
    fn test_request_survives_msgpack_named() {
        let draft = RewriteDraft {
            title: "Fast VPN".into(),
            content: "<p>x</p>".into(),
            slug: None,
            meta_description: None,
            published: true,
        };
        let bytes = rmp_serde::to_vec_named(&PressRequest::IngestRewrite { draft: draft.clone() }).unwrap();
        let back: PressRequest = rmp_serde::from_slice(&bytes).unwrap();
        assert!(matches!(back, PressRequest::IngestRewrite { draft: d } if d == draft));
    }

    #[test]
    fn test_error_response_carries_code() {
        let resp = PressResponse::from_error(&PressError::NotFound("abc".into()));
        assert!(!resp.is_ok());
        assert_eq!(resp.code.as_deref(), Some("not_found"));
        assert_eq!(resp.error.as_deref(), Some("Article not found: abc"));
        assert!(PressResponse::pong().code.is_none());
    }

    #[test]
    fn test_draft_defaults_to_published() {
        let draft: RewriteDraft =
            serde_json::from_value(serde_json::json!({"title": "t", "content": "c"})).unwrap();
        assert!(draft.published);
    }
}
