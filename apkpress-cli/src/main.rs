//! apkpress-cli: admin frontend for the internal link engine
//!
//! Talks to a running `apkpress-server` over its HTTP API.
//!
//! # Subcommands
//! - `link <article> --target <id>[=anchor text]...` - link specific articles
//! - `auto-link <article>`                            - auto-discover links for one article
//! - `auto-link-all`                                  - auto-link every published article
//! - `links <article>`                                - list outbound internal links
//! - `status`                                         - show server health

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "apkpress-cli", version, about = "apkpress internal link engine CLI")]
struct Cli {
    /// apkpress HTTP server URL (overrides APKPRESS_HTTP_URL env var)
    #[arg(long, env = "APKPRESS_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print the raw JSON response
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Link specific articles into an article
    Link {
        /// Article whose body is edited
        article: Uuid,

        /// Target article id, optionally `id=anchor text`
        #[arg(short, long = "target", value_parser = parse_target, required = true)]
        targets: Vec<TargetArg>,

        /// Maximum new links for this run
        #[arg(short = 'n', long)]
        max_links: Option<usize>,
    },

    /// Auto-discover related articles and link them
    AutoLink {
        article: Uuid,

        #[arg(short = 'n', long)]
        max_links: Option<usize>,
    },

    /// Auto-link every published article
    AutoLinkAll {
        #[arg(short = 'n', long)]
        max_links: Option<usize>,
    },

    /// List an article's outbound internal links
    Links { article: Uuid },

    /// Show apkpress server status
    Status,
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetArg {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_text: Option<String>,
}

/// Parse `<uuid>` or `<uuid>=<anchor text>`.
pub fn parse_target(s: &str) -> Result<TargetArg, String> {
    let (id, anchor) = match s.split_once('=') {
        Some((id, anchor)) => (id, Some(anchor.trim())),
        None => (s, None),
    };
    let id = Uuid::parse_str(id.trim()).map_err(|e| format!("invalid article id {id:?}: {e}"))?;
    Ok(TargetArg {
        id,
        anchor_text: anchor.filter(|a| !a.is_empty()).map(str::to_string),
    })
}

#[derive(Debug, Deserialize)]
pub struct LinkedArticle {
    pub slug: String,
    pub title: String,
    pub anchor_text: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkReport {
    pub article_id: String,
    pub title: String,
    pub links_added: usize,
    pub linked_articles: Vec<LinkedArticle>,
    #[serde(default)]
    pub skipped_targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArticleReport {
    pub title: String,
    pub links_added: usize,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchReport {
    pub summary: String,
    pub links_added: usize,
    pub articles: Vec<ArticleReport>,
}

#[derive(Debug, Deserialize)]
pub struct OutboundLink {
    pub slug: String,
    pub title: String,
    pub anchor_text: String,
}

#[derive(Debug, Deserialize)]
pub struct OutboundResponse {
    pub count: usize,
    pub links: Vec<OutboundLink>,
}

// ============================================================================
// Output Formatting
// ============================================================================

pub fn format_link_report(r: &LinkReport) -> String {
    let mut out = format!("{} ({}): {} link(s) added\n", r.title, r.article_id, r.links_added);
    for l in &r.linked_articles {
        out.push_str(&format!("  + /{} \"{}\" as \"{}\"\n", l.slug, l.title, l.anchor_text));
    }
    for id in &r.skipped_targets {
        out.push_str(&format!("  skipped {id} (missing or unpublished)\n"));
    }
    out
}

pub fn format_batch_report(r: &BatchReport) -> String {
    let mut out = format!("{}, {} link(s) added\n", r.summary, r.links_added);
    for a in &r.articles {
        match &a.error {
            Some(e) => out.push_str(&format!("  ! {}: {}\n", a.title, e)),
            None if a.links_added > 0 => out.push_str(&format!("  + {}: {}\n", a.title, a.links_added)),
            None => {}
        }
    }
    out
}

pub fn format_outbound(r: &OutboundResponse) -> String {
    if r.count == 0 {
        return "No internal links\n".to_string();
    }
    let mut out = String::new();
    for l in &r.links {
        out.push_str(&format!("{} -> {} \"{}\"\n", l.anchor_text, l.slug, l.title));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?)
}

/// Send a request and return the JSON body, exiting on transport or HTTP errors.
fn send(req: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<serde_json::Value> {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("apkpress-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        eprintln!(
            "apkpress-cli: server returned {}: {}",
            status,
            body["error"].as_str().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    Ok(resp.json()?)
}

fn print<T: for<'de> Deserialize<'de>>(
    body: serde_json::Value,
    json_output: bool,
    format: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let parsed: T = serde_json::from_value(body)?;
        print!("{}", format(&parsed));
    }
    Ok(())
}

fn do_link(
    server: &str,
    article: Uuid,
    targets: Vec<TargetArg>,
    max_links: Option<usize>,
    json_output: bool,
) -> anyhow::Result<()> {
    let url = format!("{}/articles/{}/links", server, article);
    let body = serde_json::json!({ "targets": targets, "max_links": max_links });
    let resp = send(client()?.post(&url).json(&body), &url)?;
    print(resp, json_output, format_link_report)
}

fn do_auto_link(server: &str, article: Uuid, max_links: Option<usize>, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/articles/{}/auto-link", server, article);
    let body = serde_json::json!({ "max_links": max_links });
    let resp = send(client()?.post(&url).json(&body), &url)?;
    print(resp, json_output, format_link_report)
}

fn do_auto_link_all(server: &str, max_links: Option<usize>, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/articles/auto-link", server);
    let body = serde_json::json!({ "max_links": max_links });
    let resp = send(client()?.post(&url).json(&body), &url)?;
    print(resp, json_output, format_batch_report)
}

fn do_links(server: &str, article: Uuid, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/articles/{}/links", server, article);
    let resp = send(client()?.get(&url), &url)?;
    print(resp, json_output, format_outbound)
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client()?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("apkpress server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:           {}", body["store"].as_str().unwrap_or("?"));
            println!("Backend:         {}", body["backend"].as_str().unwrap_or("?"));
            println!("Socket:          {}", body["socket"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("apkpress-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("apkpress-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Link { article, targets, max_links } => do_link(&server, article, targets, max_links, cli.json),
        Commands::AutoLink { article, max_links } => do_auto_link(&server, article, max_links, cli.json),
        Commands::AutoLinkAll { max_links } => do_auto_link_all(&server, max_links, cli.json),
        Commands::Links { article } => do_links(&server, article, cli.json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("apkpress-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "7b5c24ab-1234-5678-9abc-def012345678";

    // ========================================================================
    // TEST 1: target arguments with and without anchor text
    // ========================================================================
    #[test]
    fn test_parse_target() {
        let plain = parse_target(ID).unwrap();
        assert_eq!(plain.id.to_string(), ID);
        assert!(plain.anchor_text.is_none());

        let with_anchor = parse_target(&format!("{ID}=Fast VPN")).unwrap();
        assert_eq!(with_anchor.anchor_text.as_deref(), Some("Fast VPN"));

        let blank_anchor = parse_target(&format!("{ID}=  ")).unwrap();
        assert!(blank_anchor.anchor_text.is_none());

        assert!(parse_target("not-a-uuid=x").is_err());
    }

    // ========================================================================
    // TEST 2: targets serialize in the server's request shape
    // ========================================================================
    #[test]
    fn test_target_serialization() {
        let v = serde_json::to_value(parse_target(ID).unwrap()).unwrap();
        assert_eq!(v, serde_json::json!({ "id": ID }));
    }

    // ========================================================================
    // TEST 3: clap wiring for the link subcommand
    // ========================================================================
    #[test]
    fn test_cli_parses_link() {
        let cli = Cli::try_parse_from([
            "apkpress-cli",
            "--server",
            "http://localhost:9000/",
            "link",
            ID,
            "-t",
            &format!("{ID}=Fast VPN"),
            "-n",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Link { targets, max_links, .. } => {
                assert_eq!(targets.len(), 1);
                assert_eq!(max_links, Some(2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["apkpress-cli", "link", ID]).is_err());
    }

    // ========================================================================
    // TEST 4: human-readable reports
    // ========================================================================
    #[test]
    fn test_format_reports() {
        let report: LinkReport = serde_json::from_value(serde_json::json!({
            "article_id": ID,
            "title": "Fast VPN",
            "links_added": 1,
            "linked_articles": [{"id": null, "slug": "secure-browser", "title": "Secure Browser", "anchor_text": "Fast VPN"}],
            "state": "described"
        }))
        .unwrap();
        let text = format_link_report(&report);
        assert!(text.starts_with("Fast VPN"));
        assert!(text.contains("/secure-browser"));

        let batch: BatchReport = serde_json::from_value(serde_json::json!({
            "summary": "auto-linked 1 of 2 articles",
            "processed": 2,
            "modified": 1,
            "links_added": 2,
            "failed": 1,
            "articles": [
                {"article_id": ID, "title": "A", "links_added": 2, "linked_articles": []},
                {"article_id": ID, "title": "B", "links_added": 0, "linked_articles": [], "error": "boom"}
            ]
        }))
        .unwrap();
        let text = format_batch_report(&batch);
        assert!(text.contains("+ A: 2"));
        assert!(text.contains("! B: boom"));

        let empty: OutboundResponse = serde_json::from_value(serde_json::json!({"count": 0, "links": []})).unwrap();
        assert_eq!(format_outbound(&empty), "No internal links\n");
    }
}
