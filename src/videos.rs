use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error};

use crate::client::{ApiGet, ApiResponse};
use crate::error::{FetchError, TwitchError, TwitchResult};
use crate::types::{MAX_PAGE_SIZE, Video, VideoPage, VideosResponse};

const VIDEOS_PATH: &str = "videos";

/// Anything able to produce a creator's most recent videos.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn get_user_videos(&self, user_id: &str, limit: u32) -> Result<Vec<Video>, FetchError>;
}

pub struct VideoService<C> {
    client: C,
}

impl<C: ApiGet> VideoService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn get_videos(&self, query: &[(&str, String)]) -> TwitchResult<ApiResponse> {
        self.client.get(VIDEOS_PATH, query).await
    }

    /// Fetches a single page of at most `remaining` (capped at 100) videos,
    /// continuing from `cursor` when it is non-empty.
    pub async fn get_user_videos_page(
        &self,
        user_id: &str,
        remaining: u32,
        cursor: &str,
    ) -> TwitchResult<VideoPage> {
        let mut query = vec![
            ("user_id", user_id.to_string()),
            ("first", remaining.min(MAX_PAGE_SIZE).to_string()),
        ];
        if !cursor.is_empty() {
            query.push(("after", cursor.to_string()));
        }

        let response = self.get_videos(&query).await?;

        if response.status != StatusCode::OK {
            debug!(
                status = response.status.as_u16(),
                details = %response.body,
                "non-success status code received"
            );
            return Err(TwitchError::UpstreamApi {
                status: response.status,
            });
        }

        let parsed: VideosResponse = serde_json::from_str(&response.body).map_err(|err| {
            error!(error = %err, "JSON decoding issue");
            TwitchError::Decode(err)
        })?;

        Ok(VideoPage {
            videos: parsed.data,
            cursor: parsed.pagination.cursor.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl<C: ApiGet> VideoSource for VideoService<C> {
    async fn get_user_videos(&self, user_id: &str, limit: u32) -> Result<Vec<Video>, FetchError> {
        let mut results: Vec<Video> = Vec::new();
        if limit == 0 {
            return Ok(results);
        }

        let mut cursor = String::new();
        loop {
            let remaining = limit - results.len() as u32;
            let page = match self.get_user_videos_page(user_id, remaining, &cursor).await {
                Ok(page) => page,
                Err(source) => {
                    return Err(FetchError {
                        partial: results,
                        source,
                    });
                }
            };
            debug!(
                count = page.videos.len(),
                cursor = %page.cursor,
                "retrieved page of videos"
            );

            results.extend(page.videos);
            cursor = page.cursor;

            if results.len() >= limit as usize || cursor.is_empty() {
                return Ok(results);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pagination;
    use std::sync::Mutex;

    /// Serves `videos` in pages of `first` (at most 100), using the offset as
    /// the cursor.
    struct MockClient {
        calls: Mutex<Vec<Vec<(String, String)>>>,
        status: StatusCode,
        videos: Vec<Video>,
        fail_from_call: Option<usize>,
    }

    impl MockClient {
        fn new(status: StatusCode, videos: Vec<Video>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                status,
                videos,
                fail_from_call: None,
            }
        }

        fn calls(&self) -> Vec<Vec<(String, String)>> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn param<'a>(call: &'a [(String, String)], key: &str) -> Option<&'a str> {
        call.iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[async_trait]
    impl ApiGet for MockClient {
        async fn get(&self, path: &str, query: &[(&str, String)]) -> TwitchResult<ApiResponse> {
            assert_eq!(path, "videos");
            let call: Vec<(String, String)> = query
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect();
            let offset: usize = param(&call, "after").map_or(0, |value| value.parse().unwrap());
            let first: usize = param(&call, "first").unwrap().parse().unwrap();
            let call_index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(call);
                calls.len()
            };

            if self.fail_from_call.is_some_and(|n| call_index >= n) {
                return Ok(ApiResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "boom".to_string(),
                });
            }
            if self.status != StatusCode::OK || offset >= self.videos.len() {
                return Ok(ApiResponse {
                    status: self.status,
                    body: String::new(),
                });
            }

            let end = (offset + first.min(100)).min(self.videos.len());
            let cursor = (end < self.videos.len()).then(|| end.to_string());
            let body = VideosResponse {
                data: self.videos[offset..end].to_vec(),
                pagination: Pagination { cursor },
            };
            Ok(ApiResponse {
                status: self.status,
                body: serde_json::to_string(&body).unwrap(),
            })
        }
    }

    fn generate_videos(n: usize) -> Vec<Video> {
        (0..n)
            .map(|i| Video {
                title: format!("Title {i}"),
                view_count: 100 + i as u64,
                duration: "1m1s".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let service = VideoService::new(MockClient::new(StatusCode::BAD_REQUEST, Vec::new()));
        let err = service.get_user_videos("test", 10).await.unwrap_err();

        assert_eq!(service.client.calls().len(), 1);
        assert!(err.partial.is_empty());
        assert!(matches!(
            err.source,
            TwitchError::UpstreamApi { status } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[tokio::test]
    async fn transport_error_is_returned_without_retry() {
        struct Unreachable {
            calls: Mutex<usize>,
        }

        #[async_trait]
        impl ApiGet for Unreachable {
            async fn get(&self, _: &str, _: &[(&str, String)]) -> TwitchResult<ApiResponse> {
                *self.calls.lock().unwrap() += 1;
                let err = reqwest::Client::new()
                    .get("not a url")
                    .build()
                    .unwrap_err();
                Err(TwitchError::Transport(err))
            }
        }

        let service = VideoService::new(Unreachable {
            calls: Mutex::new(0),
        });
        let err = service.get_user_videos("test", 10).await.unwrap_err();

        assert_eq!(*service.client.calls.lock().unwrap(), 1);
        assert!(err.partial.is_empty());
        assert!(matches!(err.source, TwitchError::Transport(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        struct Garbage;

        #[async_trait]
        impl ApiGet for Garbage {
            async fn get(&self, _: &str, _: &[(&str, String)]) -> TwitchResult<ApiResponse> {
                Ok(ApiResponse {
                    status: StatusCode::OK,
                    body: "{\"data\": 12".to_string(),
                })
            }
        }

        let service = VideoService::new(Garbage);
        let err = service
            .get_user_videos_page("test", 10, "")
            .await
            .unwrap_err();
        assert!(matches!(err, TwitchError::Decode(_)));
    }

    #[tokio::test]
    async fn small_limit_is_a_single_request_without_cursor() {
        let service = VideoService::new(MockClient::new(StatusCode::OK, generate_videos(10)));
        let videos = service.get_user_videos("test", 10).await.unwrap();

        assert_eq!(videos.len(), 10);
        let calls = service.client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(param(&calls[0], "user_id"), Some("test"));
        assert_eq!(param(&calls[0], "first"), Some("10"));
        assert_eq!(param(&calls[0], "after"), None);
    }

    #[tokio::test]
    async fn large_limit_follows_cursors() {
        let service = VideoService::new(MockClient::new(StatusCode::OK, generate_videos(150)));
        let videos = service.get_user_videos("test", 150).await.unwrap();

        assert_eq!(videos.len(), 150);
        let calls = service.client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(param(&calls[0], "first"), Some("100"));
        assert_eq!(param(&calls[0], "after"), None);
        assert_eq!(param(&calls[1], "first"), Some("50"));
        assert_eq!(param(&calls[1], "after"), Some("100"));
    }

    #[tokio::test]
    async fn stops_when_cursor_runs_out() {
        let service = VideoService::new(MockClient::new(StatusCode::OK, generate_videos(120)));
        let videos = service.get_user_videos("test", 500).await.unwrap();

        assert_eq!(videos.len(), 120);
        assert_eq!(service.client.calls().len(), 2);
    }

    #[tokio::test]
    async fn stops_when_limit_is_reached() {
        let service = VideoService::new(MockClient::new(StatusCode::OK, generate_videos(1000)));
        let videos = service.get_user_videos("test", 250).await.unwrap();

        assert_eq!(videos.len(), 250);
        let calls = service.client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(param(&calls[2], "first"), Some("50"));
        assert_eq!(param(&calls[2], "after"), Some("200"));
    }

    #[tokio::test]
    async fn failure_mid_pagination_keeps_partial_results() {
        let mut client = MockClient::new(StatusCode::OK, generate_videos(300));
        client.fail_from_call = Some(2);
        let service = VideoService::new(client);

        let err = service.get_user_videos("test", 300).await.unwrap_err();
        assert_eq!(err.partial.len(), 100);
        assert_eq!(err.partial[0].title, "Title 0");
        assert_eq!(service.client.calls().len(), 2);
    }

    #[tokio::test]
    async fn zero_limit_makes_no_requests() {
        let service = VideoService::new(MockClient::new(StatusCode::OK, generate_videos(10)));
        let videos = service.get_user_videos("test", 0).await.unwrap();

        assert!(videos.is_empty());
        assert!(service.client.calls().is_empty());
    }
}
