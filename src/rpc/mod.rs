//! JSON-RPC 1.1 plumbing shared by the Workspace and DataFileUtil clients.
//!
//! ```text
//! caller ──▶ RpcTransport::call(method, params, ctx)
//!                 │
//!                 ▼
//!        POST {"version":"1.1","method":..,"params":[..],"id":..}
//!        Authorization / Kbrpc-Tag / Kbrpc-Metadata / Kbrpc-Errordest
//!                 │
//!                 ▼
//!        {"result":[..]}  or  {"error":{"code":..,"message":..}}
//! ```

mod envelope;
pub mod flag;
mod http;

pub use envelope::{RpcErrorObject, RpcRequest, RpcResponse, new_request_id};
pub use http::HttpRpcTransport;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;

use crate::error::RpcError;

/// Per-call metadata propagated to every downstream RPC.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Auth token, sent as the `Authorization` header.
    pub token: Option<SecretString>,
    /// Correlation tag (`Kbrpc-Tag`).
    pub tag: Option<String>,
    /// Free-form metadata (`Kbrpc-Metadata`, JSON-encoded).
    pub metadata: Option<Value>,
    /// Error destination hint (`Kbrpc-Errordest`).
    pub error_dest: Option<String>,
}

impl CallContext {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::from(token.into())),
            ..Default::default()
        }
    }
}

/// Answer to the `status` method every KBase SDK service exposes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServiceStatus {
    pub state: String,
    #[serde(default)]
    pub message: String,
    pub version: String,
    #[serde(default)]
    pub git_url: String,
    #[serde(default)]
    pub git_commit_hash: String,
}

/// A JSON-RPC endpoint.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Call `method` with positional `params`, returning the `result` array.
    async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        ctx: &CallContext,
    ) -> Result<Vec<Value>, RpcError>;

    /// Endpoint URL, for diagnostics.
    fn url(&self) -> &str;
}

impl std::fmt::Debug for dyn RpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcTransport").field("url", &self.url()).finish()
    }
}

/// Decode the first element of a result array.
pub fn first_result<T: serde::de::DeserializeOwned>(
    method: &str,
    results: Vec<Value>,
) -> Result<T, RpcError> {
    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| RpcError::InvalidResponse {
            method: method.to_string(),
            reason: "empty result array".to_string(),
        })?;

    serde_json::from_value(first).map_err(|e| RpcError::InvalidResponse {
        method: method.to_string(),
        reason: format!("unexpected result shape: {}", e),
    })
}
