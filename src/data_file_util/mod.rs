//! Client for the DataFileUtil service.
//!
//! DataFileUtil moves files between local disk and the Shock blob store and
//! saves or fetches Workspace objects. Every operation except `status` runs
//! as a remote async job: the client submits it, polls `_check_job` and
//! unwraps the finished job's result.

mod async_call;
mod types;

pub use async_call::{AsyncCallProxy, JobHandle, JobStatus, Operation, WaitOptions};
pub use types::{
    FileToShockOutput, FileToShockParams, GetObjectsParams, GetObjectsResults, Handle,
    ObjectData, ObjectSaveData, SaveObjectsParams, ShockNodeOutput, ShockNodeParams,
    ShockToFileOutput, ShockToFileParams, UnpackFileParams, UnpackFileResult,
};

#[cfg(test)]
pub(crate) use async_call::tests::ScriptedTransport;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::RpcError;
use crate::rpc::{CallContext, HttpRpcTransport, RpcTransport, ServiceStatus, first_result};
use crate::workspace::ObjectInfo;

pub const SERVICE_NAME: &str = "DataFileUtil";

/// Declared DataFileUtil operations.
pub mod ops {
    use super::Operation;

    pub const SHOCK_TO_FILE: Operation = Operation::new("shock_to_file", 1);
    pub const SHOCK_TO_FILE_MASS: Operation = Operation::new("shock_to_file_mass", 1);
    pub const FILE_TO_SHOCK: Operation = Operation::new("file_to_shock", 1);
    pub const FILE_TO_SHOCK_MASS: Operation = Operation::new("file_to_shock_mass", 1);
    pub const UNPACK_FILE: Operation = Operation::new("unpack_file", 1);
    pub const COPY_SHOCK_NODE: Operation = Operation::new("copy_shock_node", 1);
    pub const OWN_SHOCK_NODE: Operation = Operation::new("own_shock_node", 1);
    pub const WS_NAME_TO_ID: Operation = Operation::new("ws_name_to_id", 1);
    pub const SAVE_OBJECTS: Operation = Operation::new("save_objects", 1);
    pub const GET_OBJECTS: Operation = Operation::new("get_objects", 1);
    pub const VERSIONS: Operation = Operation::new("versions", 0);
}

/// Typed DataFileUtil client.
#[derive(Debug, Clone)]
pub struct DataFileUtilClient {
    proxy: AsyncCallProxy,
    transport: Arc<dyn RpcTransport>,
    wait: WaitOptions,
}

impl DataFileUtilClient {
    /// Client over HTTP at `url` (usually the SDK callback URL).
    pub fn new(url: impl Into<String>, poll_interval: Duration) -> Result<Self, RpcError> {
        Ok(Self::with_transport(
            Arc::new(HttpRpcTransport::new(url)?),
            poll_interval,
        ))
    }

    pub fn with_transport(transport: Arc<dyn RpcTransport>, poll_interval: Duration) -> Self {
        Self {
            proxy: AsyncCallProxy::new(transport.clone(), SERVICE_NAME)
                .with_poll_interval(poll_interval),
            transport,
            wait: WaitOptions::default(),
        }
    }

    /// Bound every wait issued by this client.
    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    pub fn proxy(&self) -> &AsyncCallProxy {
        &self.proxy
    }

    async fn run<P, R>(&self, op: &Operation, params: &P, ctx: &CallContext) -> Result<R, RpcError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let arg = serde_json::to_value(params).map_err(|e| RpcError::InvalidResponse {
            method: op.name.to_string(),
            reason: format!("failed to encode arguments: {}", e),
        })?;
        let results = self.proxy.call(op, vec![arg], &self.wait, ctx).await?;
        first_result(&format!("{}.{}", SERVICE_NAME, op.name), results)
    }

    /// Download a Shock node to a local path.
    pub async fn shock_to_file(
        &self,
        params: &ShockToFileParams,
        ctx: &CallContext,
    ) -> Result<ShockToFileOutput, RpcError> {
        self.run(&ops::SHOCK_TO_FILE, params, ctx).await
    }

    pub async fn shock_to_file_mass(
        &self,
        params: &[ShockToFileParams],
        ctx: &CallContext,
    ) -> Result<Vec<ShockToFileOutput>, RpcError> {
        self.run(&ops::SHOCK_TO_FILE_MASS, params, ctx).await
    }

    /// Upload a local file to Shock.
    pub async fn file_to_shock(
        &self,
        params: &FileToShockParams,
        ctx: &CallContext,
    ) -> Result<FileToShockOutput, RpcError> {
        self.run(&ops::FILE_TO_SHOCK, params, ctx).await
    }

    pub async fn file_to_shock_mass(
        &self,
        params: &[FileToShockParams],
        ctx: &CallContext,
    ) -> Result<Vec<FileToShockOutput>, RpcError> {
        self.run(&ops::FILE_TO_SHOCK_MASS, params, ctx).await
    }

    pub async fn unpack_file(
        &self,
        params: &UnpackFileParams,
        ctx: &CallContext,
    ) -> Result<UnpackFileResult, RpcError> {
        self.run(&ops::UNPACK_FILE, params, ctx).await
    }

    pub async fn copy_shock_node(
        &self,
        params: &ShockNodeParams,
        ctx: &CallContext,
    ) -> Result<ShockNodeOutput, RpcError> {
        self.run(&ops::COPY_SHOCK_NODE, params, ctx).await
    }

    pub async fn own_shock_node(
        &self,
        params: &ShockNodeParams,
        ctx: &CallContext,
    ) -> Result<ShockNodeOutput, RpcError> {
        self.run(&ops::OWN_SHOCK_NODE, params, ctx).await
    }

    pub async fn ws_name_to_id(&self, name: &str, ctx: &CallContext) -> Result<i64, RpcError> {
        self.run(&ops::WS_NAME_TO_ID, name, ctx).await
    }

    pub async fn save_objects(
        &self,
        params: &SaveObjectsParams,
        ctx: &CallContext,
    ) -> Result<Vec<ObjectInfo>, RpcError> {
        self.run(&ops::SAVE_OBJECTS, params, ctx).await
    }

    pub async fn get_objects(
        &self,
        params: &GetObjectsParams,
        ctx: &CallContext,
    ) -> Result<GetObjectsResults, RpcError> {
        self.run(&ops::GET_OBJECTS, params, ctx).await
    }

    /// Service version pair. The only argument-less async operation.
    pub async fn versions(&self, ctx: &CallContext) -> Result<(String, String), RpcError> {
        let results = self.proxy.call(&ops::VERSIONS, vec![], &self.wait, ctx).await?;
        first_result(&format!("{}.versions", SERVICE_NAME), results)
    }

    /// Status is answered directly, without a job.
    pub async fn status(&self, ctx: &CallContext) -> Result<ServiceStatus, RpcError> {
        let method = format!("{}.status", SERVICE_NAME);
        let results = self.transport.call(&method, vec![], ctx).await?;
        first_result(&method, results)
    }
}
