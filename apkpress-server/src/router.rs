use std::sync::Arc;

use apkpress_core::ipc::{PressRequest, PressResponse};
use apkpress_core::{ArticleStore, LinkEngine, PressConfig, PressError};
use serde::Serialize;

use crate::subsystems::{batch, linker, outbound};

/// Everything a request needs: the store, loaded config and link engine.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn ArticleStore>,
    pub config: PressConfig,
    pub engine: Arc<LinkEngine>,
}

impl AppContext {
    pub fn new(store: Arc<dyn ArticleStore>, config: PressConfig) -> Self {
        let engine = Arc::new(LinkEngine::new(&config.linking));
        Self { store, config, engine }
    }
}

pub async fn handle_request(request: PressRequest, ctx: &AppContext) -> PressResponse {
    match request {
        PressRequest::Ping => PressResponse::pong(),
        PressRequest::Health => match ctx.store.health().await {
            Ok(backend) => PressResponse::ok(serde_json::json!({
                "store": ctx.store.name(),
                "backend": backend,
                "status": "healthy"
            })),
            Err(e) => PressResponse::err(format!("Store health check failed: {}", e)),
        },
        PressRequest::LinkArticles { article_id, targets, max_links } => {
            respond(linker::link_targets(ctx, article_id, &targets, max_links).await)
        }
        PressRequest::AutoLink { article_id, max_links } => {
            respond(linker::auto_link(ctx, article_id, max_links).await)
        }
        PressRequest::AutoLinkAll { max_links } => match batch::auto_link_all(ctx, max_links).await {
            Ok(report) => {
                let summary = report.summary();
                let mut data = to_data(&report);
                if let Some(obj) = data.as_object_mut() {
                    obj.insert("summary".to_string(), serde_json::json!(summary));
                }
                PressResponse::ok(data)
            }
            Err(e) => PressResponse::from_error(&e),
        },
        PressRequest::OutboundLinks { article_id } => match outbound::outbound_links(ctx, article_id).await {
            Ok(links) => PressResponse::ok(serde_json::json!({
                "article_id": article_id,
                "count": links.len(),
                "links": links,
            })),
            Err(e) => PressResponse::from_error(&e),
        },
        PressRequest::IngestRewrite { draft } => {
            respond(apkpress_ingest::ingest_rewritten(ctx.store.as_ref(), &ctx.engine, draft).await)
        }
    }
}

fn respond<T: Serialize>(result: Result<T, PressError>) -> PressResponse {
    match result {
        Ok(value) => PressResponse::ok(to_data(&value)),
        Err(e) => {
            tracing::debug!(error = %e, "Request failed");
            PressResponse::from_error(&e)
        }
    }
}

fn to_data<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| serde_json::json!({ "serialization_error": e.to_string() }))
}
