//! Minimal Discord REST client scoped to one channel

use crate::api::{Channel, CreateMessage, Message, RateLimit, User};
use crate::error::{ApiError, ApiResult};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Messages fetched per poll
pub const PAGE_SIZE: u8 = 50;

/// Fallback when a 429 carries no readable body
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/bedrock-relay/bedrock-relay, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    channel_id: String,
}

impl DiscordClient {
    pub fn new(
        api_base: &str,
        token: &str,
        channel_id: &str,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            channel_id: channel_id.to_string(),
        })
    }

    /// The bot's own account; doubles as a token check
    pub async fn current_user(&self) -> ApiResult<User> {
        self.call(self.http.get(self.url("/users/@me"))).await
    }

    /// The configured channel; fails if the bot cannot see it
    pub async fn channel(&self) -> ApiResult<Channel> {
        let path = format!("/channels/{}", self.channel_id);
        self.call(self.http.get(self.url(&path))).await
    }

    /// Id of the newest message in the channel, if any
    pub async fn latest_message_id(&self) -> ApiResult<Option<String>> {
        let path = format!("/channels/{}/messages", self.channel_id);
        let messages: Vec<Message> = self
            .call(self.http.get(self.url(&path)).query(&[("limit", "1")]))
            .await?;
        Ok(messages.into_iter().next().map(|m| m.id))
    }

    /// Messages newer than `after`, oldest first
    pub async fn messages_after(&self, after: Option<&str>) -> ApiResult<Vec<Message>> {
        let path = format!("/channels/{}/messages", self.channel_id);
        let limit = PAGE_SIZE.to_string();
        let mut request = self.http.get(self.url(&path)).query(&[("limit", limit.as_str())]);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }

        let mut messages: Vec<Message> = self.call(request).await?;
        messages.sort_by_key(Message::snowflake);
        Ok(messages)
    }

    /// Post a message to the channel
    pub async fn create_message(&self, body: &CreateMessage) -> ApiResult<Message> {
        let path = format!("/channels/{}/messages", self.channel_id);
        self.call(self.http.post(self.url(&path)).json(body)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;

        let status = response.status();
        debug!("Discord API {} {}", response.url().path(), status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .json::<RateLimit>()
                .await
                .ok()
                .filter(|limit| limit.retry_after.is_finite() && limit.retry_after >= 0.0)
                .map(|limit| Duration::from_secs_f64(limit.retry_after))
                .unwrap_or(DEFAULT_RETRY_AFTER);
            return Err(ApiError::RateLimited { retry_after });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
                body,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}
