//! Agent-side HTTP client for the control plane.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::{EventData, EventType, SpeakerTimeframe};

#[derive(Debug, Error)]
pub enum ControlPlaneClientError {
    #[error("control plane transport error: {0}")]
    Transport(String),
    #[error("control plane rejected call ({status}): {message}")]
    Api { status: u16, message: String },
}

type ClientResult<T> = Result<T, ControlPlaneClientError>;

/// What a heartbeat response may carry back.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatReply {
    #[serde(default)]
    pub should_leave: Option<bool>,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    http: Client,
    base_url: String,
    token: String,
    bot_id: i64,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, bot_id: i64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            bot_id,
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/agent/bots/{}/{}", self.base_url, self.bot_id, suffix)
    }

    async fn post_json<T: serde::Serialize>(
        &self,
        suffix: &str,
        body: &T,
    ) -> ClientResult<reqwest::Response> {
        let response = self
            .http
            .post(self.url(suffix))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| ControlPlaneClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ControlPlaneClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    pub async fn heartbeat(&self) -> ClientResult<HeartbeatReply> {
        let response = self.post_json("heartbeat", &json!({})).await?;
        response
            .json()
            .await
            .map_err(|e| ControlPlaneClientError::Transport(e.to_string()))
    }

    pub async fn report_event(
        &self,
        event_type: EventType,
        event_time: DateTime<Utc>,
        data: &EventData,
    ) -> ClientResult<()> {
        self.post_json(
            "events",
            &json!({
                "eventType": event_type.as_str(),
                "eventTime": event_time,
                "data": data,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        status: &str,
        recording_key: Option<&str>,
        speaker_timeframes: Option<&[SpeakerTimeframe]>,
    ) -> ClientResult<()> {
        self.post_json(
            "status",
            &json!({
                "status": status,
                "recordingKey": recording_key,
                "speakerTimeframes": speaker_timeframes,
            }),
        )
        .await?;
        Ok(())
    }

    /// Pop the next queued chat message; `None` when the queue is dry.
    pub async fn dequeue_message(&self) -> ClientResult<Option<String>> {
        let response = self.post_json("chat/dequeue", &json!({})).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ControlPlaneClientError::Transport(e.to_string()))?;

        Ok(value
            .get("messageText")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Ship raw PNG bytes; the control plane stores them and returns
    /// the object key.
    pub async fn upload_screenshot(
        &self,
        png: Vec<u8>,
        shot_type: &str,
        state: &str,
        trigger: Option<&str>,
    ) -> ClientResult<String> {
        let mut url = format!(
            "{}?type={}&state={}",
            self.url("screenshots"),
            shot_type,
            state
        );
        if let Some(trigger) = trigger {
            url.push_str(&format!("&trigger={trigger}"));
        }

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(png)
            .send()
            .await
            .map_err(|e| ControlPlaneClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ControlPlaneClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ControlPlaneClientError::Transport(e.to_string()))?;
        Ok(value
            .get("key")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heartbeat_parses_operator_intent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/agent/bots/7/heartbeat")
            .match_header("authorization", "Bearer tok")
            .with_body(r#"{"shouldLeave": true, "logLevel": "debug"}"#)
            .create_async()
            .await;

        let client = ControlPlaneClient::new(server.url(), "tok", 7);
        let reply = client.heartbeat().await.unwrap();
        assert_eq!(reply.should_leave, Some(true));
        assert_eq!(reply.log_level.as_deref(), Some("debug"));
    }

    #[tokio::test]
    async fn heartbeat_tolerates_empty_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/agent/bots/7/heartbeat")
            .with_body("{}")
            .create_async()
            .await;

        let client = ControlPlaneClient::new(server.url(), "tok", 7);
        let reply = client.heartbeat().await.unwrap();
        assert_eq!(reply.should_leave, None);
        assert_eq!(reply.log_level, None);
    }

    #[tokio::test]
    async fn dequeue_returns_none_on_null_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/agent/bots/7/chat/dequeue")
            .with_body("null")
            .create_async()
            .await;

        let client = ControlPlaneClient::new(server.url(), "tok", 7);
        assert!(client.dequeue_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_2xx_surfaces_as_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/agent/bots/7/events")
            .with_status(403)
            .with_body("bad token")
            .create_async()
            .await;

        let client = ControlPlaneClient::new(server.url(), "tok", 7);
        let err = client
            .report_event(EventType::Log, Utc::now(), &EventData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ControlPlaneClientError::Api { status: 403, .. }));
    }
}
