//! Runs external format converters.
//!
//! ```text
//! upload:   scratch ──▶ converter(input file ─▶ Workspace) ──▶ exit 0? ──▶ resolve ref
//! download: scratch ──▶ converter(Workspace ─▶ file)       ──▶ exit 0? ──▶ exactly one file
//! ```
//!
//! Every call gets its own scratch directory, so concurrent calls never
//! share files. Converters are trusted to save (upload) or produce
//! (download) exactly one artifact.

mod collect;
mod command;
mod scratch;

pub use collect::{ProducedFile, collect_single_output_file};
pub use command::{ConverterCommand, ExternalCommandResult};
pub use scratch::ScratchSpace;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::config::ServiceConfig;
use crate::error::ConversionError;
use crate::rpc::CallContext;
use crate::workspace::{WorkspaceLookup, WorkspaceReference, resolve_workspace_reference};

/// Converters always talk to the FBA code linked into the script itself.
const FBA_SERVICE_URL: &str = "impl";

/// Environment variable converters read the caller's token from.
pub const AUTH_TOKEN_ENV: &str = "KB_AUTH_TOKEN";

/// File to Workspace object.
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    /// Script path relative to the plugin root.
    pub script: &'a str,
    pub input_file: &'a Path,
    pub object_name: &'a str,
    pub workspace_name: &'a str,
}

/// Workspace object to file.
#[derive(Debug, Clone)]
pub struct DownloadRequest<'a> {
    /// Script path relative to the plugin root.
    pub script: &'a str,
    pub object_name: &'a str,
    pub workspace_name: &'a str,
}

/// Executes one conversion step per call.
#[derive(Clone)]
pub struct ConversionRunner {
    interpreter: String,
    plugin_root: PathBuf,
    scratch_root: PathBuf,
    workspace: Arc<dyn WorkspaceLookup>,
}

impl std::fmt::Debug for ConversionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionRunner")
            .field("interpreter", &self.interpreter)
            .field("plugin_root", &self.plugin_root)
            .field("scratch_root", &self.scratch_root)
            .field("workspace_url", &self.workspace.url())
            .finish()
    }
}

impl ConversionRunner {
    pub fn new(config: &ServiceConfig, workspace: Arc<dyn WorkspaceLookup>) -> Self {
        Self {
            interpreter: config.converter_interpreter.clone(),
            plugin_root: config.transform_plugin_path.clone(),
            scratch_root: config.scratch.clone(),
            workspace,
        }
    }

    pub async fn prepare_scratch_space(&self) -> Result<ScratchSpace, ConversionError> {
        ScratchSpace::prepare(&self.scratch_root).await
    }

    fn converter(&self, script: &str, scratch: &ScratchSpace, ctx: &CallContext) -> ConverterCommand {
        let script_path = self.plugin_root.join(script);
        let mut cmd = ConverterCommand::new(&self.interpreter, scratch.path())
            .arg(script_path.to_string_lossy());
        if let Some(token) = &ctx.token {
            cmd = cmd.env(AUTH_TOKEN_ENV, token.expose_secret());
        }
        cmd
    }

    /// Import `input_file` as a new Workspace object and return its reference.
    pub async fn upload(
        &self,
        scratch: &ScratchSpace,
        request: &UploadRequest<'_>,
        ctx: &CallContext,
    ) -> Result<WorkspaceReference, ConversionError> {
        let cmd = self
            .converter(request.script, scratch, ctx)
            .flag("input_file_name", request.input_file.to_string_lossy())
            .flag("object_name", request.object_name)
            .flag("workspace_name", request.workspace_name)
            .flag("workspace_service_url", self.workspace.url())
            .flag("fba_service_url", FBA_SERVICE_URL);

        cmd.run().await.into_result(cmd.program())?;

        let reference = resolve_workspace_reference(
            self.workspace.as_ref(),
            request.workspace_name,
            request.object_name,
            ctx,
        )
        .await?;

        tracing::info!(%reference, object = request.object_name, "Upload conversion finished");
        Ok(reference)
    }

    /// Export a Workspace object into the scratch space and return the file.
    pub async fn download(
        &self,
        scratch: &ScratchSpace,
        request: &DownloadRequest<'_>,
        ctx: &CallContext,
    ) -> Result<ProducedFile, ConversionError> {
        let cmd = self
            .converter(request.script, scratch, ctx)
            .flag("object_name", request.object_name)
            .flag("workspace_name", request.workspace_name)
            .flag("workspace_service_url", self.workspace.url())
            .flag("fba_service_url", FBA_SERVICE_URL);

        cmd.run().await.into_result(cmd.program())?;

        let produced = collect_single_output_file(scratch.path()).await?;
        tracing::info!(path = %produced.path.display(), object = request.object_name, "Download conversion finished");
        Ok(produced)
    }
}
