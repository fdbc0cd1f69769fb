use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::types::{Metrics, SimpleVideo, Stats, Video};

pub fn respond<T: IntoResponse>(
    metrics: &Metrics,
    endpoint: &str,
    result: ApiResult<T>,
) -> Response {
    let response = match result {
        Ok(value) => value.into_response(),
        Err(err) => err.into_response(),
    };

    mark_request(metrics, endpoint, response.status());
    response
}

pub fn mark_request(metrics: &Metrics, endpoint: &str, status: StatusCode) {
    let status_label = status.as_u16().to_string();
    metrics
        .http_requests_total
        .with_label_values(&[endpoint, status_label.as_str()])
        .inc();
}

/// Checks the stats route inputs, reporting every problem at once.
pub fn parse_stats_input(channel_id: &str, limit: Option<&str>) -> ApiResult<(String, u32)> {
    let mut errors = Vec::new();

    if channel_id.is_empty() {
        errors.push("Missing channel ID".to_string());
    }

    let limit = limit
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0);
    if limit.is_none() {
        errors.push("Missing or invalid limit parameter".to_string());
    }

    match limit {
        Some(limit) if errors.is_empty() => Ok((channel_id.to_string(), limit)),
        _ => Err(ApiError::validation(errors)),
    }
}

/// Reduces a list of videos to the summary returned by the stats route.
/// Durations that fail to parse count as zero length.
/// The most viewed video stays empty until some video has more than zero
/// views; ties keep the earliest video.
pub fn generate_stats(videos: &[Video]) -> Stats {
    let mut total_views: u64 = 0;
    let mut total_seconds: f64 = 0.0;
    let mut most_viewed = SimpleVideo {
        title: String::new(),
        views: 0,
    };

    for video in videos {
        total_views += video.view_count;
        match parse_duration(&video.duration) {
            Some(seconds) => total_seconds += seconds,
            None => warn!(duration = %video.duration, title = %video.title, "unparseable video duration"),
        }
        if video.view_count > most_viewed.views {
            most_viewed = SimpleVideo {
                title: video.title.clone(),
                views: video.view_count,
            };
        }
    }

    let views_per_minute = if total_seconds > 0.0 {
        total_views as f64 * 60.0 / total_seconds
    } else {
        0.0
    };

    Stats {
        total_views,
        mean_views: total_views.checked_div(videos.len() as u64).unwrap_or(0),
        total_length: total_seconds as u64,
        views_per_minute,
        most_viewed_video: most_viewed,
    }
}

/// Parses durations such as `3m1s`, `1h53m12s` or `1.5h` into seconds.
///
/// Accepts a sequence of decimal numbers each followed by one of the units
/// `ns`, `us`, `µs`, `ms`, `s`, `m` or `h`, with an optional leading `+` or
/// `-`. A bare `0` is also accepted.
pub fn parse_duration(input: &str) -> Option<f64> {
    let input = input.trim();
    let (sign, input) = match input.as_bytes().first() {
        Some(b'-') => (-1.0, &input[1..]),
        Some(b'+') => (1.0, &input[1..]),
        _ => (1.0, input),
    };
    if input == "0" {
        return Some(0.0);
    }
    if input.is_empty() {
        return None;
    }

    let mut rest = input;
    let mut total = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * scale;
    }

    Some(sign * total)
}
