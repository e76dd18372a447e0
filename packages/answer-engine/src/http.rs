//! `reqwest`-backed [`Transport`].

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::traits::transport::{ConnectionFailure, HttpReply, HttpRequest, Method, Transport};

/// HTTP transport over one shared `reqwest` connection pool.
///
/// Cloning is cheap and clones share the pool, so one instance can serve
/// every concurrent pipeline.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> ConfigResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpReply, ConnectionFailure> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(connection_failure)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(connection_failure)?;
        Ok(HttpReply { status, body })
    }
}

fn connection_failure(err: reqwest::Error) -> ConnectionFailure {
    ConnectionFailure {
        message: err.to_string(),
        timed_out: err.is_timeout(),
    }
}
