use axum::http::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::service::ServiceError;

pub const IMAGE_SYNTHESIS_PATH: &str = "/api/v1/services/aigc/text2image/image-synthesis";
pub const VIDEO_SYNTHESIS_PATH: &str = "/api/v1/services/aigc/video-generation/video-synthesis";
const TASK_PATH: &str = "/api/v1/tasks";
const ASYNC_HEADER: &str = "X-DashScope-Async";

/// Ordered extraction rules for result URLs; the first pointer that resolves
/// to a non-empty string wins.
const IMAGE_URL_RULES: &[&str] = &[
    "/image_url",
    "/url",
    "/results/0/url",
    "/results/0/image_url",
    "/data/0/url",
    "/data/0/image_url",
    "/data/results/0/url",
];

const VIDEO_URL_RULES: &[&str] = &[
    "/video_url",
    "/video",
    "/url",
    "/results/0/video_url",
    "/results/0/url",
    "/data/0/video_url",
    "/data/results/0/video_url",
    "/data/results/0/url",
];

#[derive(Clone)]
pub struct MediaConfig {
    pub endpoint: String,
    pub api_key: String,
    pub image_model: String,
    pub video_model: String,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

/// Client for the asynchronous generation provider: submit a job, poll the
/// task endpoint until a terminal state, and download result assets.
#[derive(Clone)]
pub struct MediaClient {
    http: reqwest::Client,
    config: MediaConfig,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TaskState {
    InProgress,
    Succeeded,
    Failed,
    Unknown,
}

/// An unrecognized status stays non-terminal so a provider rolling out new
/// intermediate states does not fail jobs; the attempt cap still bounds it.
pub fn classify_status(status: Option<&str>) -> TaskState {
    match status {
        None | Some("PENDING") | Some("RUNNING") | Some("QUEUED") => TaskState::InProgress,
        Some("SUCCEEDED") => TaskState::Succeeded,
        Some("FAILED") | Some("CANCELED") | Some("TIMEOUT") => TaskState::Failed,
        Some(_) => TaskState::Unknown,
    }
}

impl MediaClient {
    pub fn new(http: reqwest::Client, config: MediaConfig) -> Self {
        Self { http, config }
    }

    pub fn image_model(&self) -> &str {
        &self.config.image_model
    }

    pub fn video_model(&self) -> &str {
        &self.config.video_model
    }

    fn ensure_configured(&self) -> Result<(), ServiceError> {
        if self.config.api_key.is_empty() {
            return Err(ServiceError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "provider_unconfigured",
                "generation provider API key not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Submit a generation job and return the provider task id.
    pub async fn submit(&self, path: &str, body: &Value) -> Result<String, ServiceError> {
        self.ensure_configured()?;
        let url = format!("{}{}", self.config.endpoint, path);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .header(ASYNC_HEADER, "enable")
            .json(body)
            .send()
            .await
            .map_err(|err| provider_error(format!("generation submit failed: {err}")))?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            let detail = truncated_body(response).await;
            return Err(provider_error(format!(
                "generation submit failed: {} {detail}",
                status.as_u16()
            )));
        }
        let data: Value = response
            .json()
            .await
            .map_err(|err| provider_error(format!("generation submit decode failed: {err}")))?;
        first_string(&data, &["/output/task_id", "/task_id", "/data/task_id"]).ok_or_else(|| {
            provider_error("generation provider did not return a task id".to_string())
        })
    }

    /// Poll the task until a terminal state or the attempt budget runs out.
    /// On success the provider's `result` payload (or the whole `output`
    /// object) is returned exactly once.
    pub async fn poll(&self, task_id: &str) -> Result<Value, ServiceError> {
        self.ensure_configured()?;
        let url = format!("{}{}/{}", self.config.endpoint, TASK_PATH, task_id);
        for _ in 0..self.config.poll_attempts {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.config.api_key)
                .send()
                .await
                .map_err(|err| provider_error(format!("task query failed: {err}")))?;
            let status = response.status();
            if status != StatusCode::OK {
                let detail = truncated_body(response).await;
                return Err(provider_error(format!(
                    "task query failed: {} {detail}",
                    status.as_u16()
                )));
            }
            let data: Value = response
                .json()
                .await
                .map_err(|err| provider_error(format!("task query decode failed: {err}")))?;
            let output = data.get("output").cloned().unwrap_or(data);
            let task_status = output
                .get("task_status")
                .or_else(|| output.get("status"))
                .and_then(Value::as_str);
            match classify_status(task_status) {
                TaskState::Succeeded => {
                    return Ok(output.get("result").cloned().unwrap_or(output));
                }
                TaskState::Failed => {
                    let message = output
                        .get("message")
                        .or_else(|| output.get("error"))
                        .and_then(Value::as_str)
                        .unwrap_or("generation task failed");
                    return Err(provider_error(message.to_string()));
                }
                TaskState::InProgress => {}
                TaskState::Unknown => {
                    tracing::warn!(
                        task_id,
                        status = task_status.unwrap_or(""),
                        "unrecognized task status, still polling"
                    );
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        Err(ServiceError::new(
            StatusCode::GATEWAY_TIMEOUT,
            "poll_timeout",
            "generation task polling timed out".to_string(),
        ))
    }

    /// Download a result asset, returning its bytes and content type.
    pub async fn download(&self, url: &str) -> Result<(Vec<u8>, String), ServiceError> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|err| download_error(format!("asset download failed: {err}")))?;
        if response.status() != StatusCode::OK {
            return Err(download_error(format!(
                "asset download failed: {}",
                response.status().as_u16()
            )));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| download_error(format!("asset download failed: {err}")))?;
        if bytes.is_empty() {
            return Err(download_error(
                "asset download returned no content".to_string(),
            ));
        }
        Ok((bytes.to_vec(), content_type))
    }
}

pub fn extract_image_url(result: &Value) -> Option<String> {
    first_string(result, IMAGE_URL_RULES)
}

pub fn extract_video_url(result: &Value) -> Option<String> {
    first_string(result, VIDEO_URL_RULES)
}

fn first_string(value: &Value, rules: &[&str]) -> Option<String> {
    rules.iter().find_map(|pointer| {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

/// Infer a file extension from content type first, then the URL suffix.
pub fn guess_extension(url: &str, content_type: Option<&str>) -> &'static str {
    if let Some(content_type) = content_type {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence {
            "image/png" => return ".png",
            "image/jpeg" => return ".jpg",
            "image/webp" => return ".webp",
            "image/gif" => return ".gif",
            "video/mp4" => return ".mp4",
            "video/quicktime" => return ".mov",
            "video/webm" => return ".webm",
            _ => {}
        }
    }
    let lower = url.to_ascii_lowercase();
    for suffix in [".png", ".jpg", ".jpeg", ".webp", ".gif", ".mp4", ".mov", ".webm"] {
        if lower.ends_with(suffix) {
            return suffix;
        }
    }
    ".bin"
}

fn provider_error(message: String) -> ServiceError {
    ServiceError::new(StatusCode::BAD_GATEWAY, "provider_error", message)
}

fn download_error(message: String) -> ServiceError {
    ServiceError::new(StatusCode::BAD_GATEWAY, "download_failed", message)
}

async fn truncated_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    body.chars().take(300).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer, attempts: u32) -> MediaClient {
        MediaClient::new(
            reqwest::Client::new(),
            MediaConfig {
                endpoint: server.base_url(),
                api_key: "test-key".to_string(),
                image_model: "image-model".to_string(),
                video_model: "video-model".to_string(),
                poll_attempts: attempts,
                poll_interval: Duration::from_millis(0),
            },
        )
    }

    #[test]
    fn pending_running_queued_and_absent_keep_polling() {
        for status in [Some("PENDING"), Some("RUNNING"), Some("QUEUED"), None] {
            assert_eq!(classify_status(status), TaskState::InProgress);
        }
    }

    #[test]
    fn terminal_statuses_classify() {
        assert_eq!(classify_status(Some("SUCCEEDED")), TaskState::Succeeded);
        for status in ["FAILED", "CANCELED", "TIMEOUT"] {
            assert_eq!(classify_status(Some(status)), TaskState::Failed);
        }
        assert_eq!(classify_status(Some("PAUSED")), TaskState::Unknown);
    }

    #[test]
    fn extraction_rules_probe_in_priority_order() {
        let nested = json!({"results": [{"url": "X"}]});
        assert_eq!(extract_image_url(&nested).as_deref(), Some("X"));

        let direct = json!({"image_url": "direct", "results": [{"url": "nested"}]});
        assert_eq!(extract_image_url(&direct).as_deref(), Some("direct"));

        let video = json!({"results": [{"video_url": "V"}]});
        assert_eq!(extract_video_url(&video).as_deref(), Some("V"));

        assert_eq!(extract_image_url(&json!({"results": []})), None);
    }

    #[test]
    fn extension_prefers_content_type_over_url() {
        assert_eq!(
            guess_extension("https://x/asset.mp4", Some("image/png; charset=binary")),
            ".png"
        );
        assert_eq!(guess_extension("https://x/clip.MP4", None), ".mp4");
        assert_eq!(guess_extension("https://x/blob", Some("application/zstd")), ".bin");
    }

    #[tokio::test]
    async fn submit_returns_task_id_from_output() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(IMAGE_SYNTHESIS_PATH)
                    .header(ASYNC_HEADER, "enable")
                    .header("authorization", "Bearer test-key");
                then.status(200)
                    .json_body(json!({"output": {"task_id": "task-1"}}));
            })
            .await;

        let task_id = client(&server, 1)
            .submit(IMAGE_SYNTHESIS_PATH, &json!({"model": "image-model"}))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(task_id, "task-1");
    }

    #[tokio::test]
    async fn poll_returns_result_exactly_once_on_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/tasks/task-1");
                then.status(200).json_body(json!({
                    "output": {
                        "task_status": "SUCCEEDED",
                        "result": {"results": [{"url": "X"}]}
                    }
                }));
            })
            .await;

        let result = client(&server, 5).poll("task-1").await.unwrap();
        assert_eq!(mock.hits_async().await, 1);
        assert_eq!(extract_image_url(&result).as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn poll_surfaces_provider_message_on_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/tasks/task-2");
                then.status(200).json_body(json!({
                    "output": {"task_status": "FAILED", "message": "content rejected"}
                }));
            })
            .await;

        let err = client(&server, 5).poll("task-2").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.body.message, "content rejected");
    }

    #[tokio::test]
    async fn poll_times_out_after_attempt_budget() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/tasks/task-3");
                then.status(200)
                    .json_body(json!({"output": {"task_status": "RUNNING"}}));
            })
            .await;

        let err = client(&server, 3).poll("task-3").await.unwrap_err();
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn unknown_status_stays_non_terminal_until_cap() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/tasks/task-4");
                then.status(200)
                    .json_body(json!({"output": {"task_status": "SUSPENDED"}}));
            })
            .await;

        let err = client(&server, 2).poll("task-4").await.unwrap_err();
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn poll_errors_immediately_on_non_200() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/tasks/task-5");
                then.status(500).body("upstream broken");
            })
            .await;

        let err = client(&server, 5).poll("task-5").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
