//! Argument and result types for DataFileUtil operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rpc::flag;
use crate::workspace::ObjectInfo;

/// Reference to a blob stored in Shock, with enough metadata to retrieve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    pub hid: String,
    pub file_name: String,
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_sha1: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShockToFileParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shock_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle_id: Option<String>,
    /// Target path; a directory means "keep the node's file name".
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpack: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShockToFileOutput {
    pub node_file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub attributes: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileToShockParams {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub make_handle: bool,
    /// `gzip`, `targz` or `zip`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileToShockOutput {
    pub shock_id: String,
    #[serde(default)]
    pub handle: Option<Handle>,
    #[serde(default)]
    pub node_file_name: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpackFileParams {
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpackFileResult {
    pub file_path: String,
}

/// Shared shape of `copy_shock_node` and `own_shock_node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShockNodeParams {
    pub shock_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub make_handle: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShockNodeOutput {
    pub shock_id: String,
    #[serde(default)]
    pub handle: Option<Handle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSaveData {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, String>>,
    #[serde(default, deserialize_with = "flag::deserialize", skip_serializing_if = "is_false")]
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveObjectsParams {
    /// Workspace id (see `ws_name_to_id`).
    pub id: i64,
    pub objects: Vec<ObjectSaveData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetObjectsParams {
    pub object_refs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectData {
    pub data: Value,
    pub info: ObjectInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetObjectsResults {
    pub data: Vec<ObjectData>,
}

fn is_false(b: &bool) -> bool {
    !*b
}
