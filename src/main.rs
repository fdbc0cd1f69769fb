mod auth;
mod client;
mod error;
mod types;
mod utils;
mod videos;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};
use reqwest::Client;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::auth::AuthManager;
use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::types::*;
use crate::utils::*;
use crate::videos::VideoService;

const STATS_ENDPOINT: &str = "/streamer/:channel_id/stats";

fn build_app(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(STATS_ENDPOINT, get(streamer_stats))
        .route("/metrics", get(prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn init_tracing(config: &AppConfig) {
    let level = config.log_level.as_str().to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("streamer_stats={level},tower_http={level}")));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init(),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();
    init_tracing(&config);
    debug!("logger initialised");

    let metrics = Metrics::new();
    let http = Client::builder()
        .build()
        .expect("http client should build");
    let auth = AuthManager::new(
        http.clone(),
        config.token_url.clone(),
        config.credentials.clone(),
        metrics.clone(),
    );
    let twitch = ApiClient::new(http, config.api_base_url.clone(), auth, metrics.clone());
    let state = SharedState::new(Arc::new(VideoService::new(twitch)), metrics);

    let app = build_app(state);

    info!(address = %config.server_address, "streamer-stats listening");
    let listener = tokio::net::TcpListener::bind(config.server_address.as_str())
        .await
        .expect("bind should succeed");

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "server error");
    }
}

async fn health(State(state): State<SharedState>) -> Response {
    respond(
        &state.inner.metrics,
        "/health",
        Ok((
            StatusCode::OK,
            Json(MessageResponse {
                message: "ok".to_string(),
            }),
        )),
    )
}

async fn streamer_stats(
    State(state): State<SharedState>,
    Path(channel_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Response {
    let state = state.inner;

    let result: ApiResult<(StatusCode, Json<Stats>)> = async {
        let (channel_id, limit) = parse_stats_input(&channel_id, query.limit.as_deref())?;

        let videos = state
            .videos
            .get_user_videos(&channel_id, limit)
            .await
            .map_err(|err| {
                // partial pages are dropped; any fetch error fails the request
                error!(
                    channel_id = %channel_id,
                    limit,
                    partial = err.partial.len(),
                    error = %err.source,
                    "failed to fetch videos"
                );
                ApiError::from(err)
            })?;

        if videos.is_empty() {
            return Err(ApiError::not_found(NO_VIDEOS_MESSAGE));
        }

        let stats = generate_stats(&videos);
        debug!(?stats, "returning stats blob");
        Ok((StatusCode::OK, Json(stats)))
    }
    .await;

    respond(&state.metrics, STATS_ENDPOINT, result)
}

async fn prometheus_metrics(State(state): State<SharedState>) -> Response {
    let metrics = &state.inner.metrics;
    let metric_families = metrics.registry.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let status = match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let content_type = encoder.format_type().to_string();

    mark_request(metrics, "/metrics", status);

    (
        status,
        [("content-type", content_type)],
        String::from_utf8_lossy(&buffer).to_string(),
    )
        .into_response()
}
