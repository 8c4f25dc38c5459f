//! FBAFileUtil: converts between flat model files and FBA Workspace objects.
//!
//! Conversions run as external converter scripts. Staging through Shock
//! goes via the DataFileUtil async-job client in [`data_file_util`].

pub mod config;
pub mod conversion;
pub mod data_file_util;
pub mod error;
pub mod rpc;
pub mod server;
pub mod service;
pub mod workspace;

pub use config::ServiceConfig;
pub use error::{ConfigError, ConversionError, Error, Result, RpcError};
pub use service::FbaFileUtil;
