use std::sync::Arc;

use apkpress_core::{ArticleStore, MemoryArticleStore, PgArticleStore, PressConfig};
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use apkpress_server::{server, AppContext};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "apkpress.toml")]
    config: String,

    /// Check database connectivity and schema, then exit
    #[arg(long)]
    health: bool,

    /// Serve from an empty in-memory store instead of PostgreSQL
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match PressConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let store: Arc<dyn ArticleStore> = if args.memory {
        tracing::warn!("Using in-memory article store; nothing will be persisted");
        Arc::new(MemoryArticleStore::new())
    } else {
        let pool = match apkpress_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        };

        if args.health {
            match apkpress_core::db::health_check(&pool).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        if let Err(e) = apkpress_core::db::ensure_schema(&pool).await {
            eprintln!("Failed to prepare schema: {}", e);
            std::process::exit(1);
        }

        if args.health {
            println!("✅ apkpress DB health check passed");
            return Ok(());
        }

        Arc::new(PgArticleStore::new(pool))
    };

    let ctx = AppContext::new(store, config.clone());

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Periodic corpus auto-link
    if let Some(minutes) = config.linking.auto_link_interval_minutes {
        tokio::spawn(apkpress_server::subsystems::batch::run_auto_link_loop(
            ctx.clone(),
            minutes,
            tx.subscribe(),
        ));
    }

    if config.http.enabled {
        let http_ctx = ctx.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = apkpress_server::http::start_http_server(http_ctx, http_shutdown).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    server::run_unix_server(&config.service.socket_path, ctx, tx.subscribe()).await?;

    Ok(())
}
