//! Request and response envelopes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

pub const RPC_VERSION: &str = "1.1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "default_version")]
    pub version: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            version: RPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(Value::String(new_request_id())),
            context: None,
        }
    }
}

fn default_version() -> String {
    RPC_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            version: RPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: RpcErrorObject) -> Self {
        Self {
            version: RPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Unwrap into the result array, or the server's error.
    pub fn into_result(self, method: &str) -> Result<Vec<Value>, RpcError> {
        if let Some(error) = self.error {
            return Err(error.into());
        }

        match self.result {
            Some(Value::Array(values)) => Ok(values),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(RpcError::InvalidResponse {
                method: method.to_string(),
                reason: format!("result is not an array: {}", other),
            }),
        }
    }
}

/// JSON-RPC error object as KBase services emit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default = "default_error_name")]
    pub name: String,
    pub code: i64,
    pub message: String,
    /// Server-side detail (usually a stack trace).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

fn default_error_name() -> String {
    "JSONRPCError".to_string()
}

impl From<RpcErrorObject> for RpcError {
    fn from(e: RpcErrorObject) -> Self {
        RpcError::Remote {
            name: e.name,
            code: e.code,
            message: e.message,
            data: e.error,
        }
    }
}

/// Random request id, in the same spirit as the generated KBase clients.
pub fn new_request_id() -> String {
    rand::thread_rng().r#gen::<u64>().to_string()
}
