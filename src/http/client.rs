use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::core::event_queue::AnalyticsEvent;
use crate::core::options::ConvoKitOptions;
use crate::error::{ConvoKitError, ErrorCode, Result};
use crate::types::{ConversationPage, RealtimeSnapshot, SortMode, SpotConfig};

const USER_AGENT: &str = concat!("ConvoKit-Rust/", env!("CARGO_PKG_VERSION"));

/// Object-safe seam between the managers and the network. The live
/// implementation is [`HttpApiClient`]; tests substitute in-memory fakes.
///
/// No method retries. Callers that want retries wrap a call in their own
/// envelope (see `http::retry`).
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn fetch_config(&self, spot_id: &str) -> Result<SpotConfig>;

    async fn fetch_realtime(&self, conversation_id: &str) -> Result<RealtimeSnapshot>;

    async fn fetch_conversation(
        &self,
        spot_id: &str,
        post_id: &str,
        sort: SortMode,
        offset: i64,
    ) -> Result<ConversationPage>;

    async fn send_events(&self, events: &[AnalyticsEvent]) -> Result<()>;

    /// Current moderation status of a comment, as the raw wire string.
    async fn comment_status(&self, comment_id: &str) -> Result<String>;

    async fn mute_user(&self, user_id: &str) -> Result<()>;

    async fn delete_comment(&self, comment_id: &str, parent_id: Option<&str>) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeReadRequest<'a> {
    conversation_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationReadRequest<'a> {
    spot_id: &'a str,
    post_id: &'a str,
    sort_by: SortMode,
    offset: i64,
}

#[derive(Debug, Serialize)]
struct BatchEventsRequest<'a> {
    events: &'a [AnalyticsEvent],
}

#[derive(Debug, Deserialize)]
struct CommentStatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MuteUserRequest<'a> {
    user_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteCommentRequest<'a> {
    comment_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
}

pub struct HttpApiClient {
    client: Client,
    options: ConvoKitOptions,
}

impl HttpApiClient {
    pub fn new(options: ConvoKitOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| {
                ConvoKitError::with_source(
                    ErrorCode::NetworkError,
                    "Failed to create HTTP client",
                    e,
                )
            })?;

        Ok(Self { client, options })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.options.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("X-Spot-Id", &self.options.spot_id)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(convert_error)?;

        handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .header("X-Spot-Id", &self.options.spot_id)
            .header("User-Agent", USER_AGENT)
            .json(body)
            .send()
            .await
            .map_err(convert_error)?;

        handle_response(response).await
    }

    /// POST where only the status matters. Ack bodies vary by endpoint and
    /// are discarded.
    async fn post_ack<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let response = self
            .client
            .post(self.url(path))
            .header("X-Spot-Id", &self.options.spot_id)
            .header("User-Agent", USER_AGENT)
            .json(body)
            .send()
            .await
            .map_err(convert_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_to_error(status, &body))
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn fetch_config(&self, spot_id: &str) -> Result<SpotConfig> {
        self.get(&format!("/config/{}", spot_id)).await
    }

    async fn fetch_realtime(&self, conversation_id: &str) -> Result<RealtimeSnapshot> {
        self.post("/realtime/read", &RealtimeReadRequest { conversation_id })
            .await
    }

    async fn fetch_conversation(
        &self,
        spot_id: &str,
        post_id: &str,
        sort: SortMode,
        offset: i64,
    ) -> Result<ConversationPage> {
        self.post(
            "/conversation/read",
            &ConversationReadRequest {
                spot_id,
                post_id,
                sort_by: sort,
                offset,
            },
        )
        .await
    }

    async fn send_events(&self, events: &[AnalyticsEvent]) -> Result<()> {
        self.post_ack("/analytics/events", &BatchEventsRequest { events })
            .await
            .map_err(|e| {
                ConvoKitError::with_source(
                    ErrorCode::EventSendFailed,
                    format!("Failed to send {} events", events.len()),
                    e,
                )
            })
    }

    async fn comment_status(&self, comment_id: &str) -> Result<String> {
        let response: CommentStatusResponse =
            self.get(&format!("/comment/{}/status", comment_id)).await?;
        Ok(response.status)
    }

    async fn mute_user(&self, user_id: &str) -> Result<()> {
        self.post_ack("/user/mute", &MuteUserRequest { user_id })
            .await
    }

    async fn delete_comment(&self, comment_id: &str, parent_id: Option<&str>) -> Result<()> {
        self.post_ack(
            "/comment/delete",
            &DeleteCommentRequest {
                comment_id,
                parent_id,
            },
        )
        .await
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        let body = response.text().await.map_err(|e| {
            ConvoKitError::with_source(ErrorCode::HttpInvalidResponse, "Failed to read response", e)
        })?;

        serde_json::from_str(&body).map_err(|e| {
            ConvoKitError::with_source(
                ErrorCode::HttpInvalidResponse,
                format!("Failed to parse response: {}", e),
                e,
            )
        })
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(status_to_error(status, &body))
    }
}

fn status_to_error(status: StatusCode, body: &str) -> ConvoKitError {
    let (code, category) = match status {
        StatusCode::BAD_REQUEST => (ErrorCode::HttpBadRequest, "Client Error"),
        StatusCode::UNAUTHORIZED => (ErrorCode::HttpUnauthorized, "Authentication Error"),
        StatusCode::FORBIDDEN => (ErrorCode::HttpForbidden, "Authorization Error"),
        StatusCode::NOT_FOUND => (ErrorCode::HttpNotFound, "Not Found"),
        StatusCode::TOO_MANY_REQUESTS => (ErrorCode::HttpRateLimited, "Rate Limited"),
        s if s.is_server_error() => (ErrorCode::HttpServerError, "Server Error"),
        s if s.is_client_error() => (ErrorCode::HttpBadRequest, "Client Error"),
        _ => (ErrorCode::HttpServerError, "Server Error"),
    };

    ConvoKitError::network_error(code, format!("{}: {} - {}", category, status.as_u16(), body))
}

fn convert_error(error: reqwest::Error) -> ConvoKitError {
    if error.is_timeout() {
        ConvoKitError::with_source(ErrorCode::HttpTimeout, "Request timed out", error)
    } else if error.is_connect() {
        ConvoKitError::with_source(ErrorCode::HttpNetworkError, "Connection failed", error)
    } else {
        ConvoKitError::with_source(ErrorCode::NetworkError, error.to_string(), error)
    }
}
