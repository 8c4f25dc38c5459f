//! JSON-RPC 1.1 endpoint for `FBAFileUtil.*`.
//!
//! Successful calls answer HTTP 200 with `{"result": [value]}`. Failures
//! answer HTTP 500 with a KBase-style error object.

use std::error::Error as _;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::error::ConversionError;
use crate::rpc::{CallContext, RpcErrorObject, RpcRequest, RpcResponse};
use crate::service::{FbaFileUtil, SERVICE_NAME};

pub const CODE_PARSE_ERROR: i64 = -32700;
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
pub const CODE_INVALID_PARAMS: i64 = -32602;
pub const CODE_SERVER_ERROR: i64 = -32500;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Unknown method {0}")]
    UnknownMethod(String),

    #[error("Invalid params for {method}: {reason}")]
    InvalidParams { method: String, reason: String },

    #[error("Failed to encode result of {method}: {reason}")]
    Encode { method: String, reason: String },

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl DispatchError {
    pub fn code(&self) -> i64 {
        match self {
            Self::Malformed(_) => CODE_PARSE_ERROR,
            Self::UnknownMethod(_) => CODE_METHOD_NOT_FOUND,
            Self::InvalidParams { .. } | Self::Conversion(ConversionError::ArgumentShape { .. }) => {
                CODE_INVALID_PARAMS
            }
            Self::Encode { .. } | Self::Conversion(_) => CODE_SERVER_ERROR,
        }
    }

    /// Wire form, with the source chain in `error`.
    pub fn to_error_object(&self) -> RpcErrorObject {
        let mut chain = self.to_string();
        let mut source = self.source();
        while let Some(s) = source {
            chain.push_str(&format!("\ncaused by: {}", s));
            source = s.source();
        }

        RpcErrorObject {
            name: "JSONRPCError".to_string(),
            code: self.code(),
            message: self.to_string(),
            error: Some(Value::String(chain)),
        }
    }
}

pub fn router(service: Arc<FbaFileUtil>) -> Router {
    Router::new()
        .route("/", post(rpc_handler))
        .route("/rpc", post(rpc_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub async fn serve(service: Arc<FbaFileUtil>, port: u16) -> crate::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("FBAFileUtil listening on {}", addr);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

async fn rpc_handler(
    State(service): State<Arc<FbaFileUtil>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<RpcResponse>) {
    let response = match serde_json::from_slice::<RpcRequest>(&body) {
        Ok(request) => handle_request(&service, request, call_context(&headers)).await,
        Err(e) => {
            let err = DispatchError::Malformed(e.to_string());
            RpcResponse::failure(None, err.to_error_object())
        }
    };

    let status = if response.error.is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(response))
}

/// Build the call context from `Authorization` and `Kbrpc-*` headers.
pub fn call_context(headers: &HeaderMap) -> CallContext {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    CallContext {
        token: text("authorization").map(SecretString::from),
        tag: text("kbrpc-tag"),
        metadata: text("kbrpc-metadata").and_then(|m| serde_json::from_str(&m).ok()),
        error_dest: text("kbrpc-errordest"),
    }
}

/// Run one request to completion and wrap the outcome in a response envelope.
pub async fn handle_request(
    service: &FbaFileUtil,
    request: RpcRequest,
    ctx: CallContext,
) -> RpcResponse {
    let id = request.id.clone();
    match dispatch(service, &request.method, request.params, &ctx).await {
        Ok(result) => RpcResponse::success(id, Value::Array(vec![result])),
        Err(e) => {
            tracing::warn!(method = %request.method, code = e.code(), error = %e, "Call failed");
            RpcResponse::failure(id, e.to_error_object())
        }
    }
}

pub async fn dispatch(
    service: &FbaFileUtil,
    method: &str,
    params: Vec<Value>,
    ctx: &CallContext,
) -> Result<Value, DispatchError> {
    let operation = method
        .strip_prefix(SERVICE_NAME)
        .and_then(|rest| rest.strip_prefix('.'))
        .ok_or_else(|| DispatchError::UnknownMethod(method.to_string()))?;

    tracing::debug!(method, "Dispatching call");

    match operation {
        "status" => {
            no_params(method, &params)?;
            encode(method, service.status())
        }
        "sbml_file_to_model" => {
            encode(method, service.sbml_file_to_model(one_param(method, params)?, ctx).await?)
        }
        "excel_file_to_model" => {
            encode(method, service.excel_file_to_model(one_param(method, params)?, ctx).await?)
        }
        "tsv_file_to_model" => {
            encode(method, service.tsv_file_to_model(one_param(method, params)?, ctx).await?)
        }
        "model_to_excel_file" => {
            encode(method, service.model_to_excel_file(one_param(method, params)?, ctx).await?)
        }
        "model_to_sbml_file" => {
            encode(method, service.model_to_sbml_file(one_param(method, params)?, ctx).await?)
        }
        "model_to_tsv_file" => {
            encode(method, service.model_to_tsv_file(one_param(method, params)?, ctx).await?)
        }
        "fba_to_excel_file" => {
            encode(method, service.fba_to_excel_file(one_param(method, params)?, ctx).await?)
        }
        "fba_to_tsv_file" => {
            encode(method, service.fba_to_tsv_file(one_param(method, params)?, ctx).await?)
        }
        "tsv_file_to_media" => {
            encode(method, service.tsv_file_to_media(one_param(method, params)?, ctx).await?)
        }
        "excel_file_to_media" => {
            encode(method, service.excel_file_to_media(one_param(method, params)?, ctx).await?)
        }
        "media_to_tsv_file" => {
            encode(method, service.media_to_tsv_file(one_param(method, params)?, ctx).await?)
        }
        "media_to_excel_file" => {
            encode(method, service.media_to_excel_file(one_param(method, params)?, ctx).await?)
        }
        "tsv_file_to_phenotype_set" => encode(
            method,
            service.tsv_file_to_phenotype_set(one_param(method, params)?, ctx).await?,
        ),
        "phenotype_set_to_tsv_file" => encode(
            method,
            service.phenotype_set_to_tsv_file(one_param(method, params)?, ctx).await?,
        ),
        "phenotype_simulation_set_to_excel_file" => encode(
            method,
            service
                .phenotype_simulation_set_to_excel_file(one_param(method, params)?, ctx)
                .await?,
        ),
        "phenotype_simulation_set_to_tsv_file" => encode(
            method,
            service
                .phenotype_simulation_set_to_tsv_file(one_param(method, params)?, ctx)
                .await?,
        ),
        _ => Err(DispatchError::UnknownMethod(method.to_string())),
    }
}

fn no_params(method: &str, params: &[Value]) -> Result<(), DispatchError> {
    if params.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::InvalidParams {
            method: method.to_string(),
            reason: format!("expected no arguments, got {}", params.len()),
        })
    }
}

fn one_param<P: DeserializeOwned>(method: &str, params: Vec<Value>) -> Result<P, DispatchError> {
    let invalid = |reason: String| DispatchError::InvalidParams {
        method: method.to_string(),
        reason,
    };

    let [param]: [Value; 1] = params
        .try_into()
        .map_err(|p: Vec<Value>| invalid(format!("expected 1 argument, got {}", p.len())))?;
    serde_json::from_value(param).map_err(|e| invalid(e.to_string()))
}

fn encode<R: Serialize>(method: &str, result: R) -> Result<Value, DispatchError> {
    serde_json::to_value(result).map_err(|e| DispatchError::Encode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
