use prometheus::{IntCounterVec, Opts, Registry};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

use crate::videos::VideoSource;

pub const DEFAULT_SERVER_ADDRESS: &str = "localhost:3000";
pub const DEFAULT_API_BASE_URL: &str = "https://api.twitch.tv/helix";
pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const MAX_PAGE_SIZE: u32 = 100;
pub const NO_VIDEOS_MESSAGE: &str = "No videos found for this userId";

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id_len", &self.client_id.len())
            .field("client_secret_len", &self.client_secret.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub server_address: String,
    pub log_level: tracing::Level,
    pub log_format: LogFormat,
    pub api_base_url: String,
    pub token_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            credentials: Credentials {
                client_id: read_env_string("TWITCH_CLIENT_ID", ""),
                client_secret: read_env_string("TWITCH_CLIENT_SECRET", ""),
            },
            server_address: read_env_string("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS),
            log_level: parse_log_level(std::env::var("LOG_LEVEL").ok().as_deref()),
            log_format: parse_log_format(std::env::var("JSON_LOGGING").ok().as_deref()),
            api_base_url: read_env_string("TWITCH_API_BASE_URL", DEFAULT_API_BASE_URL),
            token_url: read_env_string("TWITCH_TOKEN_URL", DEFAULT_TOKEN_URL),
        }
    }
}

pub fn parse_log_level(value: Option<&str>) -> tracing::Level {
    match value {
        Some("ERROR") => tracing::Level::ERROR,
        Some("WARN") => tracing::Level::WARN,
        Some("INFO") => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    }
}

pub fn parse_log_format(value: Option<&str>) -> LogFormat {
    match value {
        Some("TRUE" | "true" | "True" | "T" | "t") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub inner: Arc<AppState>,
}

pub struct AppState {
    pub videos: Arc<dyn VideoSource>,
    pub metrics: Metrics,
}

impl SharedState {
    pub fn new(videos: Arc<dyn VideoSource>, metrics: Metrics) -> Self {
        Self {
            inner: Arc::new(AppState { videos, metrics }),
        }
    }
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub upstream_requests_total: IntCounterVec,
    pub oauth_grants_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["endpoint", "status"],
        )
        .expect("http counter vec should build");

        let upstream_requests_total = IntCounterVec::new(
            Opts::new("upstream_requests_total", "Requests sent to the Twitch API"),
            &["path", "status"],
        )
        .expect("upstream counter vec should build");

        let oauth_grants_total = IntCounterVec::new(
            Opts::new("oauth_grants_total", "Client credentials grants"),
            &["outcome"],
        )
        .expect("oauth counter vec should build");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("register http counter vec");
        registry
            .register(Box::new(upstream_requests_total.clone()))
            .expect("register upstream counter vec");
        registry
            .register(Box::new(oauth_grants_total.clone()))
            .expect("register oauth counter vec");

        Self {
            registry,
            http_requests_total,
            upstream_requests_total,
            oauth_grants_total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub title: String,
    pub view_count: u64,
    pub duration: String,
}

#[derive(Debug, Clone, Default)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub cursor: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideosResponse {
    pub data: Vec<Video>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct OAuthResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleVideo {
    pub title: String,
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_views: u64,
    pub mean_views: u64,
    pub total_length: u64,
    pub views_per_minute: f64,
    pub most_viewed_video: SimpleVideo,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn read_env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
