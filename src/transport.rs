use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};

use crate::Result;
use crate::signing::SignedRequest;

/// Status and raw body text of one response.
///
/// The body is kept as text because non-200 responses carry no guaranteed
/// shape; the session layer decides how to parse it.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status_code: StatusCode,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn new<S: Into<String>>(status_code: StatusCode, body: S) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }
}

/// Sends one signed POST and waits at most `timeout` for the response.
///
/// Implementations report timeouts and connection failures as
/// [`Kind::Transport`](crate::error::Kind::Transport) and must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &SignedRequest, timeout: Duration) -> Result<RawResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn post(&self, request: &SignedRequest, timeout: Duration) -> Result<RawResponse> {
        (**self).post(request, timeout).await
    }
}

/// [`Transport`] over a `reqwest` client.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(client: ReqwestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip(self, request, timeout),
            fields(endpoint = request.endpoint, status_code)
        )
    )]
    async fn post(&self, request: &SignedRequest, timeout: Duration) -> Result<RawResponse> {
        let response = self
            .client
            .post(request.url.clone())
            .headers(request.headers.clone())
            .json(&request.body)
            .timeout(timeout)
            .send()
            .await?;
        let status_code = response.status();

        #[cfg(feature = "tracing")]
        tracing::Span::current().record("status_code", status_code.as_u16());

        let body = response.text().await?;
        Ok(RawResponse { status_code, body })
    }
}
