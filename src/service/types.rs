//! Parameter and result types of the FBAFileUtil operations.

use serde::{Deserialize, Serialize};

use crate::rpc::flag;

/// A local file, a Shock node, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shock_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    #[serde(rename = "ref")]
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelCreationParams {
    pub model_file: File,
    pub model_name: String,
    pub workspace_name: String,
    #[serde(default)]
    pub genome: Option<String>,
    #[serde(default)]
    pub biomass: Option<Vec<String>>,
    /// Only used by the TSV import.
    #[serde(default)]
    pub compounds_file: Option<File>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelObjectSelectionParams {
    pub workspace_name: String,
    pub model_name: String,
    #[serde(default, deserialize_with = "flag::optional")]
    pub save_to_shock: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTsvFiles {
    pub compounds_file: File,
    pub reactions_file: File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FbaObjectSelectionParams {
    pub workspace_name: String,
    pub fba_name: String,
    #[serde(default, deserialize_with = "flag::optional")]
    pub save_to_shock: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FbaTsvFiles {
    pub compounds_file: File,
    pub reactions_file: File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaCreationParams {
    pub media_file: File,
    pub media_name: String,
    pub workspace_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaObjectSelectionParams {
    pub workspace_name: String,
    pub media_name: String,
    #[serde(default, deserialize_with = "flag::optional")]
    pub save_to_shock: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhenotypeSetCreationParams {
    pub phenotype_set_file: File,
    pub phenotype_set_name: String,
    pub workspace_name: String,
    #[serde(default)]
    pub genome: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhenotypeSetObjectSelectionParams {
    pub workspace_name: String,
    pub phenotype_set_name: String,
    #[serde(default, deserialize_with = "flag::optional")]
    pub save_to_shock: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhenotypeSimulationSetObjectSelectionParams {
    pub workspace_name: String,
    pub phenotype_simulation_set_name: String,
    #[serde(default, deserialize_with = "flag::optional")]
    pub save_to_shock: Option<bool>,
}
