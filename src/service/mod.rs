//! FBAFileUtil: conversions between flat files and FBA Workspace objects.
//!
//! Only the SBML model import and export are backed by converters. The
//! other declared operations answer `NotImplemented`.

mod types;

pub use types::{
    FbaObjectSelectionParams, FbaTsvFiles, File, MediaCreationParams, MediaObjectSelectionParams,
    ModelCreationParams, ModelObjectSelectionParams, ModelTsvFiles, PhenotypeSetCreationParams,
    PhenotypeSetObjectSelectionParams, PhenotypeSimulationSetObjectSelectionParams, WorkspaceRef,
};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::conversion::{ConversionRunner, DownloadRequest, ScratchSpace, UploadRequest};
use crate::data_file_util::{DataFileUtilClient, FileToShockParams, ShockToFileParams};
use crate::error::ConversionError;
use crate::rpc::{CallContext, ServiceStatus};
use crate::workspace::{WorkspaceClient, WorkspaceLookup};

pub const SERVICE_NAME: &str = "FBAFileUtil";
pub const GIT_URL: &str = "https://github.com/kbaseapps/FBAFileUtil";

pub const SBML_IMPORT_SCRIPT: &str =
    "plugins/scripts/upload/trns_transform_SBML_FBAModel_to_KBaseFBA_FBAModel.pl";
pub const SBML_EXPORT_SCRIPT: &str =
    "plugins/scripts/download/trns_transform_KBaseFBA_FBAModel_to_SBML_FBAModel.pl";

type Result<T> = std::result::Result<T, ConversionError>;

/// The FBAFileUtil service.
#[derive(Debug, Clone)]
pub struct FbaFileUtil {
    runner: ConversionRunner,
    data_files: Option<DataFileUtilClient>,
    sbml_import_script: String,
    sbml_export_script: String,
}

impl FbaFileUtil {
    /// Service talking to the configured Workspace and DataFileUtil over HTTP.
    pub fn new(config: &ServiceConfig) -> crate::Result<Self> {
        let workspace: Arc<dyn WorkspaceLookup> =
            Arc::new(WorkspaceClient::new(config.workspace_url.clone())?);
        let data_files = config
            .callback_url
            .as_ref()
            .map(|url| DataFileUtilClient::new(url.clone(), config.poll_interval))
            .transpose()?;
        Ok(Self::with_collaborators(config, workspace, data_files))
    }

    pub fn with_collaborators(
        config: &ServiceConfig,
        workspace: Arc<dyn WorkspaceLookup>,
        data_files: Option<DataFileUtilClient>,
    ) -> Self {
        Self {
            runner: ConversionRunner::new(config, workspace),
            data_files,
            sbml_import_script: SBML_IMPORT_SCRIPT.to_string(),
            sbml_export_script: SBML_EXPORT_SCRIPT.to_string(),
        }
    }

    /// Override the converter scripts (relative to the plugin root).
    pub fn with_sbml_scripts(mut self, import: impl Into<String>, export: impl Into<String>) -> Self {
        self.sbml_import_script = import.into();
        self.sbml_export_script = export.into();
        self
    }

    fn data_files(&self) -> Result<&DataFileUtilClient> {
        self.data_files.as_ref().ok_or(ConversionError::ShockUnavailable)
    }

    /// Import an SBML file as an FBAModel object.
    pub async fn sbml_file_to_model(
        &self,
        params: ModelCreationParams,
        ctx: &CallContext,
    ) -> Result<WorkspaceRef> {
        const OP: &str = "sbml_file_to_model";
        require(OP, "model_name", &params.model_name)?;
        require(OP, "workspace_name", &params.workspace_name)?;

        let source = input_source(OP, "model_file", &params.model_file)?;
        if matches!(source, InputSource::Shock(_)) {
            self.data_files()?;
        }

        let scratch = self.runner.prepare_scratch_space().await?;
        let input_file = self.stage_input(source, &scratch, ctx).await?;

        let reference = self
            .runner
            .upload(
                &scratch,
                &UploadRequest {
                    script: &self.sbml_import_script,
                    input_file: &input_file,
                    object_name: &params.model_name,
                    workspace_name: &params.workspace_name,
                },
                ctx,
            )
            .await?;

        Ok(WorkspaceRef {
            reference: reference.into_string(),
        })
    }

    /// Export an FBAModel object as SBML.
    pub async fn model_to_sbml_file(
        &self,
        params: ModelObjectSelectionParams,
        ctx: &CallContext,
    ) -> Result<File> {
        const OP: &str = "model_to_sbml_file";
        require(OP, "model_name", &params.model_name)?;
        require(OP, "workspace_name", &params.workspace_name)?;

        let save_to_shock = params.save_to_shock.unwrap_or(false);
        if save_to_shock {
            self.data_files()?;
        }

        let scratch = self.runner.prepare_scratch_space().await?;
        let produced = self
            .runner
            .download(
                &scratch,
                &DownloadRequest {
                    script: &self.sbml_export_script,
                    object_name: &params.model_name,
                    workspace_name: &params.workspace_name,
                },
                ctx,
            )
            .await?;

        let path = produced.path.to_string_lossy().into_owned();
        let shock_id = if save_to_shock {
            let uploaded = self
                .data_files()?
                .file_to_shock(
                    &FileToShockParams {
                        file_path: path.clone(),
                        ..Default::default()
                    },
                    ctx,
                )
                .await?;
            tracing::info!(shock_id = %uploaded.shock_id, "Saved export to Shock");
            Some(uploaded.shock_id)
        } else {
            None
        };

        Ok(File {
            path: Some(path),
            shock_id,
        })
    }

    async fn stage_input(
        &self,
        source: InputSource<'_>,
        scratch: &ScratchSpace,
        ctx: &CallContext,
    ) -> Result<PathBuf> {
        match source {
            InputSource::Path(path) => Ok(PathBuf::from(path)),
            InputSource::Shock(shock_id) => {
                let staged = self
                    .data_files()?
                    .shock_to_file(
                        &ShockToFileParams {
                            shock_id: Some(shock_id.to_string()),
                            file_path: scratch.path().to_string_lossy().into_owned(),
                            ..Default::default()
                        },
                        ctx,
                    )
                    .await?;
                tracing::debug!(shock_id, path = %staged.file_path, "Staged input from Shock");
                Ok(PathBuf::from(staged.file_path))
            }
        }
    }

    pub async fn excel_file_to_model(
        &self,
        _params: ModelCreationParams,
        _ctx: &CallContext,
    ) -> Result<WorkspaceRef> {
        not_implemented("excel_file_to_model")
    }

    pub async fn tsv_file_to_model(
        &self,
        _params: ModelCreationParams,
        _ctx: &CallContext,
    ) -> Result<WorkspaceRef> {
        not_implemented("tsv_file_to_model")
    }

    pub async fn model_to_excel_file(
        &self,
        _params: ModelObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<File> {
        not_implemented("model_to_excel_file")
    }

    pub async fn model_to_tsv_file(
        &self,
        _params: ModelObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<ModelTsvFiles> {
        not_implemented("model_to_tsv_file")
    }

    pub async fn fba_to_excel_file(
        &self,
        _params: FbaObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<File> {
        not_implemented("fba_to_excel_file")
    }

    pub async fn fba_to_tsv_file(
        &self,
        _params: FbaObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<FbaTsvFiles> {
        not_implemented("fba_to_tsv_file")
    }

    pub async fn tsv_file_to_media(
        &self,
        _params: MediaCreationParams,
        _ctx: &CallContext,
    ) -> Result<WorkspaceRef> {
        not_implemented("tsv_file_to_media")
    }

    pub async fn excel_file_to_media(
        &self,
        _params: MediaCreationParams,
        _ctx: &CallContext,
    ) -> Result<WorkspaceRef> {
        not_implemented("excel_file_to_media")
    }

    pub async fn media_to_tsv_file(
        &self,
        _params: MediaObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<File> {
        not_implemented("media_to_tsv_file")
    }

    pub async fn media_to_excel_file(
        &self,
        _params: MediaObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<File> {
        not_implemented("media_to_excel_file")
    }

    pub async fn tsv_file_to_phenotype_set(
        &self,
        _params: PhenotypeSetCreationParams,
        _ctx: &CallContext,
    ) -> Result<WorkspaceRef> {
        not_implemented("tsv_file_to_phenotype_set")
    }

    pub async fn phenotype_set_to_tsv_file(
        &self,
        _params: PhenotypeSetObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<File> {
        not_implemented("phenotype_set_to_tsv_file")
    }

    pub async fn phenotype_simulation_set_to_excel_file(
        &self,
        _params: PhenotypeSimulationSetObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<File> {
        not_implemented("phenotype_simulation_set_to_excel_file")
    }

    pub async fn phenotype_simulation_set_to_tsv_file(
        &self,
        _params: PhenotypeSimulationSetObjectSelectionParams,
        _ctx: &CallContext,
    ) -> Result<File> {
        not_implemented("phenotype_simulation_set_to_tsv_file")
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            state: "OK".to_string(),
            message: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_url: GIT_URL.to_string(),
            git_commit_hash: option_env!("GIT_COMMIT_HASH").unwrap_or_default().to_string(),
        }
    }
}

enum InputSource<'a> {
    Path(&'a str),
    Shock(&'a str),
}

/// A local path wins over a Shock node when both are given.
fn input_source<'a>(operation: &str, field: &str, file: &'a File) -> Result<InputSource<'a>> {
    let present = |v: &'a Option<String>| v.as_deref().filter(|s| !s.trim().is_empty());

    if let Some(path) = present(&file.path) {
        Ok(InputSource::Path(path))
    } else if let Some(shock_id) = present(&file.shock_id) {
        Ok(InputSource::Shock(shock_id))
    } else {
        Err(ConversionError::ArgumentShape {
            operation: operation.to_string(),
            reason: format!("{} needs a path or a shock_id", field),
        })
    }
}

fn require(operation: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConversionError::ArgumentShape {
            operation: operation.to_string(),
            reason: format!("{} must not be empty", field),
        });
    }
    Ok(())
}

fn not_implemented<T>(operation: &str) -> Result<T> {
    tracing::warn!(operation, "Called an operation that has no converter");
    Err(ConversionError::NotImplemented {
        operation: operation.to_string(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::conversion::tests::{DOWNLOAD_SCRIPT, UPLOAD_SCRIPT, config, plugin_root};
    use crate::data_file_util::ScriptedTransport;
    use crate::workspace::StaticWorkspace;

    struct Fixture {
        plugins: tempfile::TempDir,
        scratch: tempfile::TempDir,
    }

    impl Fixture {
        fn new(upload_body: &str, download_body: &str) -> Self {
            Self {
                plugins: plugin_root(upload_body, download_body),
                scratch: tempfile::tempdir().unwrap(),
            }
        }

        fn service(&self, data_files: Option<DataFileUtilClient>) -> FbaFileUtil {
            let cfg = config(self.plugins.path(), self.scratch.path());
            let ws = StaticWorkspace::new(&cfg.workspace_url).with_object("my_ws", 77, "my_model", 9, 2);
            FbaFileUtil::with_collaborators(&cfg, Arc::new(ws), data_files)
                .with_sbml_scripts(UPLOAD_SCRIPT, DOWNLOAD_SCRIPT)
        }

        fn scratch_dirs(&self) -> Vec<PathBuf> {
            std::fs::read_dir(self.scratch.path())
                .unwrap()
                .map(|e| e.unwrap().path())
                .collect()
        }
    }

    fn dfu(transport: Arc<ScriptedTransport>) -> DataFileUtilClient {
        DataFileUtilClient::with_transport(transport, std::time::Duration::from_millis(1))
    }

    fn model_params(file: File) -> ModelCreationParams {
        ModelCreationParams {
            model_file: file,
            model_name: "my_model".to_string(),
            workspace_name: "my_ws".to_string(),
            genome: None,
            biomass: None,
            compounds_file: None,
        }
    }

    #[tokio::test]
    async fn test_sbml_upload_from_path() {
        let fx = Fixture::new("printf '%s\\n' \"$@\" > args.txt", "exit 0");
        let service = fx.service(None);

        let out = service
            .sbml_file_to_model(
                model_params(File {
                    path: Some("/data/e_coli.sbml".to_string()),
                    shock_id: None,
                }),
                &CallContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(out.reference, "77/9/2");
        let dirs = fx.scratch_dirs();
        assert_eq!(dirs.len(), 1);
        let args = std::fs::read_to_string(dirs[0].join("args.txt")).unwrap();
        assert!(args.contains("/data/e_coli.sbml"));
    }

    #[tokio::test]
    async fn test_sbml_upload_from_shock() {
        let fx = Fixture::new("printf '%s\\n' \"$@\" > args.txt", "exit 0");
        let transport = ScriptedTransport::new(vec![
            Ok(vec![json!("job-1")]),
            Ok(vec![json!({
                "finished": 1,
                "result": [{"node_file_name": "e_coli.sbml", "file_path": "/staged/e_coli.sbml", "size": 10}]
            })]),
        ]);
        let service = fx.service(Some(dfu(transport.clone())));

        service
            .sbml_file_to_model(
                model_params(File {
                    path: None,
                    shock_id: Some("node-1".to_string()),
                }),
                &CallContext::default(),
            )
            .await
            .unwrap();

        let dirs = fx.scratch_dirs();
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, "DataFileUtil._shock_to_file_submit");
        assert_eq!(calls[0].1[0]["shock_id"], "node-1");
        assert_eq!(calls[0].1[0]["file_path"], dirs[0].to_str().unwrap());

        let args = std::fs::read_to_string(dirs[0].join("args.txt")).unwrap();
        assert!(args.contains("/staged/e_coli.sbml"));
    }

    #[tokio::test]
    async fn test_upload_without_input_is_rejected_before_side_effects() {
        let fx = Fixture::new("exit 0", "exit 0");
        let err = fx
            .service(None)
            .sbml_file_to_model(model_params(File::default()), &CallContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::ArgumentShape { .. }));
        assert!(fx.scratch_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_shock_input_without_callback() {
        let fx = Fixture::new("exit 0", "exit 0");
        let err = fx
            .service(None)
            .sbml_file_to_model(
                model_params(File {
                    path: None,
                    shock_id: Some("node-1".to_string()),
                }),
                &CallContext::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::ShockUnavailable));
        assert!(fx.scratch_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_sbml_download() {
        let fx = Fixture::new("exit 0", "echo '<sbml/>' > my_model.xml");
        let out = fx
            .service(None)
            .model_to_sbml_file(
                ModelObjectSelectionParams {
                    workspace_name: "my_ws".to_string(),
                    model_name: "my_model".to_string(),
                    save_to_shock: None,
                },
                &CallContext::default(),
            )
            .await
            .unwrap();

        let path = PathBuf::from(out.path.unwrap());
        assert_eq!(path.file_name().unwrap(), "my_model.xml");
        assert!(path.starts_with(fx.scratch.path()));
        assert_eq!(out.shock_id, None);
    }

    #[tokio::test]
    async fn test_sbml_download_saved_to_shock() {
        let fx = Fixture::new("exit 0", "echo '<sbml/>' > my_model.xml");
        let transport = ScriptedTransport::new(vec![
            Ok(vec![json!("job-5")]),
            Ok(vec![json!({"finished": 1, "result": [{"shock_id": "node-77"}]})]),
        ]);
        let out = fx
            .service(Some(dfu(transport.clone())))
            .model_to_sbml_file(
                ModelObjectSelectionParams {
                    workspace_name: "my_ws".to_string(),
                    model_name: "my_model".to_string(),
                    save_to_shock: Some(true),
                },
                &CallContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(out.shock_id.as_deref(), Some("node-77"));
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, "DataFileUtil._file_to_shock_submit");
        assert_eq!(calls[0].1[0]["file_path"], out.path.unwrap().as_str());
    }

    #[tokio::test]
    async fn test_download_failure_is_fatal() {
        let fx = Fixture::new("exit 0", "exit 1");
        let err = fx
            .service(None)
            .model_to_sbml_file(
                ModelObjectSelectionParams {
                    workspace_name: "my_ws".to_string(),
                    model_name: "my_model".to_string(),
                    save_to_shock: None,
                },
                &CallContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::NonZeroExit { code: 1 }));
    }

    #[tokio::test]
    async fn test_stubs_are_explicitly_unimplemented() {
        let fx = Fixture::new("exit 0", "exit 0");
        let service = fx.service(None);
        let ctx = CallContext::default();

        let err = service
            .tsv_file_to_model(model_params(File::default()), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::NotImplemented { ref operation } if operation == "tsv_file_to_model"));

        let err = service
            .fba_to_tsv_file(
                FbaObjectSelectionParams {
                    workspace_name: "my_ws".to_string(),
                    fba_name: "fba".to_string(),
                    save_to_shock: None,
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::NotImplemented { .. }));
        assert!(fx.scratch_dirs().is_empty());
    }

    #[test]
    fn test_new_builds_http_collaborators() {
        let fx = Fixture::new("exit 0", "exit 0");
        let mut cfg = config(fx.plugins.path(), fx.scratch.path());
        cfg.callback_url = Some("http://127.0.0.1:9/callback".to_string());

        let service = FbaFileUtil::new(&cfg).unwrap();
        assert!(service.data_files.is_some());
    }

    #[test]
    fn test_status() {
        let fx = Fixture::new("exit 0", "exit 0");
        let status = fx.service(None).status();
        assert_eq!(status.state, "OK");
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }
}
