use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct PressConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub linking: LinkingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Tuning for the internal link graph engine.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkingConfig {
    /// Path prefix of article pages; hrefs are built as `{post_prefix}{slug}`.
    pub post_prefix: String,
    /// Public host of the site. Absolute hrefs on this host count as internal.
    pub site_host: Option<String>,
    /// Ceiling on new anchors inserted into one article per run.
    pub max_links_per_run: usize,
    /// How many ranked candidates auto-discovery hands to the inserter.
    pub candidate_pool_size: usize,
    pub min_score: u32,
    pub title_weight: u32,
    pub body_weight: u32,
    /// Characters of body text used as the target's excerpt when scoring.
    pub excerpt_chars: usize,
    pub min_token_len: usize,
    pub extra_stopwords: Vec<String>,
    pub meta_description_max_chars: usize,
    /// Make writes conditional on `updated_at` being unchanged since the read.
    pub check_revision: bool,
    pub persist_retries: usize,
    /// Run the corpus auto-link batch periodically when set.
    pub auto_link_interval_minutes: Option<u64>,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            post_prefix: "/post/".to_string(),
            site_host: None,
            max_links_per_run: 3,
            candidate_pool_size: 10,
            min_score: 1,
            title_weight: 2,
            body_weight: 1,
            excerpt_chars: 2000,
            min_token_len: 3,
            extra_stopwords: Vec::new(),
            meta_description_max_chars: 160,
            check_revision: false,
            persist_retries: 3,
            auto_link_interval_minutes: None,
        }
    }
}

impl Default for PressConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                socket_path: "/tmp/apkpress.sock".to_string(),
                log_level: "info".to_string(),
            },
            database: DatabaseConfig {
                url: "postgresql://localhost:5432/apkpress".to_string(),
                max_connections: 5,
            },
            http: HttpConfig::default(),
            linking: LinkingConfig::default(),
        }
    }
}

impl PressConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
