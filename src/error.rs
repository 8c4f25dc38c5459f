//! Error types for the conversion service and its RPC collaborators.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup configuration errors. All of them abort process initialization.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting '{key}': {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load env file {path}: {reason}")]
    EnvFile { path: PathBuf, reason: String },
}

/// Errors raised by the JSON-RPC layer and the async job proxy.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Wrong number of positional arguments for the declared operation.
    #[error("{method} takes {expected} argument(s) but {actual} were given")]
    ArgumentShape {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// The call never produced an HTTP response.
    #[error("Transport failure calling {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a JSON-RPC error object.
    #[error("{name} {code}: {message}")]
    Remote {
        name: String,
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Invalid response from {method}: {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error("Job {handle} did not finish within {waited:?}")]
    DeadlineExceeded { handle: String, waited: Duration },

    #[error("Wait for job {handle} was cancelled")]
    Cancelled { handle: String },
}

/// Errors raised while running a conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Malformed input to a public operation, detected before any side effect.
    #[error("Invalid arguments to {operation}: {reason}")]
    ArgumentShape { operation: String, reason: String },

    #[error("Failed to create scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter {program} could not be started: {reason}")]
    LaunchFailed { program: String, reason: String },

    #[error("Converter killed by signal {signal} (core dumped: {core_dumped})")]
    KilledBySignal { signal: i32, core_dumped: bool },

    #[error("Converter exited with code {code}")]
    NonZeroExit { code: i32 },

    #[error("Expected exactly one output file in {dir}, found {}: [{}]", .entries.len(), .entries.join(", "))]
    UnexpectedOutput { dir: PathBuf, entries: Vec<String> },

    #[error("Failed to read output directory {dir}: {source}")]
    OutputListing {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Object not found: {reference}")]
    NotFound { reference: String },

    #[error("{operation} is declared but not implemented")]
    NotImplemented { operation: String },

    #[error("Shock transfer requested but no DataFileUtil callback URL is configured")]
    ShockUnavailable,

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
