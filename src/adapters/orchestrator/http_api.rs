//! Container-service HTTP API adapter.
//!
//! Drives a remote container service (the warm-pool backend) over its
//! REST API. The same client serves the ephemeral variant; only the
//! teardown policy differs and that lives in the deployment
//! coordinator.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::ports::{
    ContainerOrchestrator, OrchestratorError, OrchestratorResult, ServiceStatus,
};

#[derive(Debug, Clone)]
pub struct ContainerApiClient {
    http: Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Serialize)]
struct CreateServiceRequest<'a> {
    image: &'a str,
    env: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct EnvUpdateRequest<'a> {
    env: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct DescriptionRequest<'a> {
    description: &'a str,
}

impl ContainerApiClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.api_token)
    }

    /// Send a request, mapping transport failures and non-2xx responses
    /// to [`OrchestratorError`]. 404 becomes `ServiceNotFound`.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        service_id: Option<&str>,
    ) -> OrchestratorResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = service_id {
                return Err(OrchestratorError::ServiceNotFound(id.to_string()));
            }
        }

        let message = response.text().await.unwrap_or_default();
        Err(OrchestratorError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ContainerOrchestrator for ContainerApiClient {
    async fn create(
        &self,
        image: &str,
        env: &HashMap<String, String>,
        name: Option<&str>,
    ) -> OrchestratorResult<String> {
        let body = CreateServiceRequest { image, env, name };
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/services").json(&body),
                None,
            )
            .await?;

        let service: ServiceResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;
        Ok(service.id)
    }

    async fn start(&self, service_id: &str) -> OrchestratorResult<()> {
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/services/{service_id}/start"),
            ),
            Some(service_id),
        )
        .await?;
        Ok(())
    }

    async fn stop(&self, service_id: &str) -> OrchestratorResult<()> {
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/services/{service_id}/stop"),
            ),
            Some(service_id),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, service_id: &str) -> OrchestratorResult<()> {
        self.send(
            self.request(reqwest::Method::DELETE, &format!("/services/{service_id}")),
            Some(service_id),
        )
        .await?;
        Ok(())
    }

    async fn update_env(
        &self,
        service_id: &str,
        env: &HashMap<String, String>,
    ) -> OrchestratorResult<()> {
        let body = EnvUpdateRequest { env };
        self.send(
            self.request(reqwest::Method::PUT, &format!("/services/{service_id}/env"))
                .json(&body),
            Some(service_id),
        )
        .await?;
        Ok(())
    }

    async fn describe(&self, service_id: &str) -> OrchestratorResult<ServiceStatus> {
        let response = self
            .send(
                self.request(reqwest::Method::GET, &format!("/services/{service_id}")),
                Some(service_id),
            )
            .await?;

        let service: ServiceResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;

        Ok(service
            .status
            .as_deref()
            .map(ServiceStatus::normalize)
            .unwrap_or(ServiceStatus::Unknown))
    }

    async fn set_description(
        &self,
        service_id: &str,
        description: &str,
    ) -> OrchestratorResult<()> {
        let body = DescriptionRequest { description };
        self.send(
            self.request(
                reqwest::Method::PATCH,
                &format!("/services/{service_id}/description"),
            )
            .json(&body),
            Some(service_id),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_posts_image_and_env() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/services")
            .match_header("authorization", "Bearer tok")
            .with_status(201)
            .with_body(r#"{"id": "svc-123", "status": "starting"}"#)
            .create_async()
            .await;

        let client = ContainerApiClient::new(server.url(), "tok");
        let mut env = HashMap::new();
        env.insert("BOT_DATA".to_string(), "abc".to_string());

        let id = client
            .create("meetbot/agent-meet:latest", &env, Some("pool-meet-001"))
            .await
            .unwrap();
        assert_eq!(id, "svc-123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn describe_normalizes_unknown_vocabulary() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/services/svc-1")
            .with_body(r#"{"id": "svc-1", "status": "suspended"}"#)
            .create_async()
            .await;

        let client = ContainerApiClient::new(server.url(), "tok");
        let status = client.describe("svc-1").await.unwrap();
        assert_eq!(status, ServiceStatus::Unknown);
    }

    #[tokio::test]
    async fn missing_service_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/services/svc-9/stop")
            .with_status(404)
            .create_async()
            .await;

        let client = ContainerApiClient::new(server.url(), "tok");
        let err = client.stop("svc-9").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ServiceNotFound(id) if id == "svc-9"));
    }

    #[tokio::test]
    async fn server_error_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/services/svc-9/start")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = ContainerApiClient::new(server.url(), "tok");
        let err = client.start("svc-9").await.unwrap_err();
        match err {
            OrchestratorError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
