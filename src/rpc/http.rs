//! reqwest-backed JSON-RPC transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::error::RpcError;
use crate::rpc::{CallContext, RpcRequest, RpcResponse, RpcTransport};

/// JSON-RPC 1.1 over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpRpcTransport {
    client: Client,
    url: String,
}

impl HttpRpcTransport {
    /// Fails when the TLS backend cannot be initialised.
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        let url = url.into();
        // Only the connect phase is bounded; converter-backed calls can run for hours.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RpcError::Transport {
                url: url.clone(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        ctx: &CallContext,
    ) -> Result<Vec<Value>, RpcError> {
        let request = RpcRequest::new(method, params);

        tracing::debug!(url = %self.url, method, "Sending JSON-RPC request");

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(token) = &ctx.token {
            builder = builder.header("Authorization", token.expose_secret());
        }
        if let Some(tag) = &ctx.tag {
            builder = builder.header("Kbrpc-Tag", tag);
        }
        if let Some(metadata) = &ctx.metadata {
            builder = builder.header("Kbrpc-Metadata", metadata.to_string());
        }
        if let Some(dest) = &ctx.error_dest {
            builder = builder.header("Kbrpc-Errordest", dest);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(url = %self.url, method, "JSON-RPC request failed: {}", e);
            RpcError::Transport {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RpcError::Transport {
            url: self.url.clone(),
            reason: format!("failed to read response body: {}", e),
        })?;

        tracing::debug!(method, %status, "JSON-RPC response received");

        // KBase servers report JSON-RPC errors with HTTP 500 and a JSON body,
        // so the body is parsed regardless of status.
        match serde_json::from_str::<RpcResponse>(&body) {
            Ok(envelope) => envelope.into_result(method),
            Err(_) if !status.is_success() => Err(RpcError::InvalidResponse {
                method: method.to_string(),
                reason: format!("HTTP {}: {}", status, truncate(&body)),
            }),
            Err(e) => Err(RpcError::InvalidResponse {
                method: method.to_string(),
                reason: format!("JSON parse error: {}. Raw: {}", e, truncate(&body)),
            }),
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= 200 {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(200).collect::<String>())
    }
}
