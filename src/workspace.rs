//! Workspace service collaborator.
//!
//! Only the object-info lookup is needed here: after a converter saves an
//! object, its reference is resolved by name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ConversionError, RpcError};
use crate::rpc::{CallContext, HttpRpcTransport, RpcTransport, first_result};

/// Metadata of a stored object.
///
/// The service sends this as an 11-element tuple; it is decoded once here so
/// nothing downstream indexes by position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ObjectInfoTuple")]
pub struct ObjectInfo {
    pub object_id: i64,
    pub name: String,
    pub type_string: String,
    pub save_date: String,
    pub version: i64,
    pub saved_by: String,
    pub workspace_id: i64,
    pub workspace_name: String,
    pub checksum: String,
    pub size: i64,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct ObjectInfoTuple(
    i64,
    String,
    String,
    String,
    i64,
    String,
    i64,
    String,
    String,
    i64,
    Option<HashMap<String, String>>,
);

impl From<ObjectInfoTuple> for ObjectInfo {
    fn from(t: ObjectInfoTuple) -> Self {
        Self {
            object_id: t.0,
            name: t.1,
            type_string: t.2,
            save_date: t.3,
            version: t.4,
            saved_by: t.5,
            workspace_id: t.6,
            workspace_name: t.7,
            checksum: t.8,
            size: t.9,
            metadata: t.10,
        }
    }
}

/// `wsid/objid/version` reference to one object version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceReference(String);

impl WorkspaceReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&ObjectInfo> for WorkspaceReference {
    fn from(info: &ObjectInfo) -> Self {
        Self(format!(
            "{}/{}/{}",
            info.workspace_id, info.object_id, info.version
        ))
    }
}

impl std::fmt::Display for WorkspaceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object metadata lookup.
#[async_trait]
pub trait WorkspaceLookup: Send + Sync {
    /// Look up `workspace/object`. `None` means no such object.
    async fn object_info(
        &self,
        workspace: &str,
        object: &str,
        ctx: &CallContext,
    ) -> Result<Option<ObjectInfo>, RpcError>;

    /// Service URL handed to converters.
    fn url(&self) -> &str;
}

/// JSON-RPC Workspace client.
#[derive(Debug, Clone)]
pub struct WorkspaceClient {
    transport: Arc<dyn RpcTransport>,
}

impl WorkspaceClient {
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        Ok(Self::with_transport(Arc::new(HttpRpcTransport::new(url)?)))
    }

    pub fn with_transport(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl WorkspaceLookup for WorkspaceClient {
    async fn object_info(
        &self,
        workspace: &str,
        object: &str,
        ctx: &CallContext,
    ) -> Result<Option<ObjectInfo>, RpcError> {
        const METHOD: &str = "Workspace.get_object_info_new";

        // ignoreErrors turns "no such object" into a null entry.
        let params = json!({
            "objects": [{"ref": format!("{}/{}", workspace, object)}],
            "includeMetadata": 0,
            "ignoreErrors": 1,
        });

        let results = self.transport.call(METHOD, vec![params], ctx).await?;
        let infos: Vec<Option<ObjectInfo>> = first_result(METHOD, results)?;
        Ok(infos.into_iter().next().flatten())
    }

    fn url(&self) -> &str {
        self.transport.url()
    }
}

/// Resolve a named object to its `wsid/objid/version` reference.
pub async fn resolve_workspace_reference(
    lookup: &dyn WorkspaceLookup,
    workspace: &str,
    object: &str,
    ctx: &CallContext,
) -> Result<WorkspaceReference, ConversionError> {
    let info = lookup
        .object_info(workspace, object, ctx)
        .await?
        .ok_or_else(|| ConversionError::NotFound {
            reference: format!("{}/{}", workspace, object),
        })?;

    let reference = WorkspaceReference::from(&info);
    tracing::debug!(%reference, workspace, object, "Resolved workspace reference");
    Ok(reference)
}

/// Build an `ObjectInfo` tuple as the service would send it.
#[cfg(test)]
pub(crate) fn info_tuple(objid: i64, name: &str, version: i64, wsid: i64, ws: &str) -> serde_json::Value {
    json!([
        objid,
        name,
        "KBaseFBA.FBAModel-11.0",
        "2016-05-17T19:25:47+0000",
        version,
        "someuser",
        wsid,
        ws,
        "5d41402abc4b2a76b9719d911017c592",
        1024,
        null
    ])
}

/// In-memory lookup for tests.
#[cfg(test)]
pub(crate) struct StaticWorkspace {
    pub(crate) url: String,
    pub(crate) objects: HashMap<String, ObjectInfo>,
}

#[cfg(test)]
impl StaticWorkspace {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            objects: HashMap::new(),
        }
    }

    pub(crate) fn with_object(mut self, ws: &str, wsid: i64, name: &str, objid: i64, version: i64) -> Self {
        let info = serde_json::from_value(info_tuple(objid, name, version, wsid, ws))
            .expect("valid object info");
        self.objects.insert(format!("{}/{}", ws, name), info);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl WorkspaceLookup for StaticWorkspace {
    async fn object_info(
        &self,
        workspace: &str,
        object: &str,
        _ctx: &CallContext,
    ) -> Result<Option<ObjectInfo>, RpcError> {
        Ok(self.objects.get(&format!("{}/{}", workspace, object)).cloned())
    }

    fn url(&self) -> &str {
        &self.url
    }
}
