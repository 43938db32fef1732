//! HTTP implementation of the session service client.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::error::{ServiceError, ServiceResult};
use super::models::*;
use super::SessionApi;

/// Required by Livy's CSRF protection on mutating requests.
const REQUESTED_BY_HEADER: &str = "X-Requested-By";
const REQUESTED_BY_VALUE: &str = "livy-pool";

/// Client for a Livy-compatible REST endpoint.
#[derive(Debug, Clone)]
pub struct LivyClient {
    /// HTTP client.
    client: Client,
    /// Base URL of the server (e.g. "http://livy.example.com:8998").
    base_url: String,
}

impl LivyClient {
    /// Create a new client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to create HTTP client");

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self { client, base_url }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> ServiceResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        Ok(response.json().await?)
    }

    async fn api_error(status: StatusCode, response: Response) -> ServiceError {
        let body = response.text().await.unwrap_or_default();
        ServiceError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl SessionApi for LivyClient {
    async fn create_session(&self, request: &CreateSessionRequest) -> ServiceResult<Session> {
        let url = format!("{}/sessions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(REQUESTED_BY_HEADER, REQUESTED_BY_VALUE)
            .json(request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn get_session(&self, id: i64) -> ServiceResult<Option<Session>> {
        let url = format!("{}/sessions/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(response).await.map(Some)
    }

    async fn list_sessions(&self) -> ServiceResult<SessionList> {
        let url = format!("{}/sessions", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    async fn delete_session(&self, id: i64) -> ServiceResult<()> {
        let url = format!("{}/sessions/{}", self.base_url, id);
        let response = self
            .client
            .delete(&url)
            .header(REQUESTED_BY_HEADER, REQUESTED_BY_VALUE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        Ok(())
    }

    async fn submit_statement(
        &self,
        session_id: i64,
        code: &str,
        kind: StatementKind,
    ) -> ServiceResult<Statement> {
        let url = format!("{}/sessions/{}/statements", self.base_url, session_id);
        let request = StatementRequest {
            code: code.to_string(),
            kind,
        };
        let response = self
            .client
            .post(&url)
            .header(REQUESTED_BY_HEADER, REQUESTED_BY_VALUE)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn get_statement(&self, session_id: i64, statement_id: i64) -> ServiceResult<Statement> {
        let url = format!(
            "{}/sessions/{}/statements/{}",
            self.base_url, session_id, statement_id
        );
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    async fn cancel_statement(&self, session_id: i64, statement_id: i64) -> ServiceResult<()> {
        let url = format!(
            "{}/sessions/{}/statements/{}/cancel",
            self.base_url, session_id, statement_id
        );
        let response = self
            .client
            .post(&url)
            .header(REQUESTED_BY_HEADER, REQUESTED_BY_VALUE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        let client = LivyClient::new("http://localhost:8998/");
        assert_eq!(client.base_url, "http://localhost:8998");
    }
}
