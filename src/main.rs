//! FBAFileUtil service binary.
//!
//! `serve` runs the JSON-RPC endpoint. `run` answers one request read from
//! a file, the way KBase async jobs invoke a service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fba_file_util::rpc::{CallContext, RpcRequest};
use fba_file_util::{FbaFileUtil, ServiceConfig, server};

#[derive(Parser, Debug)]
#[command(name = "fba-file-util")]
#[command(about = "Converts between SBML files and FBA Workspace objects", version)]
struct Cli {
    /// Load settings from this file instead of `.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the JSON-RPC HTTP service
    Serve {
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,
    },

    /// Answer a single request from `input` and write the response to `output`
    Run {
        input: PathBuf,
        output: PathBuf,

        /// Auth token forwarded to converters and downstream services
        #[arg(long, env = "KB_AUTH_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fba_file_util=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = ServiceConfig::load(cli.env_file.as_deref())
        .context("invalid service configuration")?;

    tracing::info!(
        workspace_url = %config.workspace_url,
        scratch = %config.scratch.display(),
        shock_staging = config.callback_url.is_some(),
        "Loaded configuration"
    );

    let service = Arc::new(FbaFileUtil::new(&config).context("failed to build RPC clients")?);

    match cli.command {
        Command::Serve { port } => server::serve(service, port)
            .await
            .context("JSON-RPC server failed")?,
        Command::Run {
            input,
            output,
            token,
        } => {
            let raw = tokio::fs::read(&input)
                .await
                .with_context(|| format!("failed to read {}", input.display()))?;
            let request: RpcRequest = serde_json::from_slice(&raw)
                .with_context(|| format!("{} is not a JSON-RPC request", input.display()))?;

            let ctx = token.map(CallContext::with_token).unwrap_or_default();
            let response = server::handle_request(&service, request, ctx).await;
            let failed = response.error.is_some();

            tokio::fs::write(&output, serde_json::to_vec_pretty(&response)?)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;

            if failed {
                anyhow::bail!("call failed, see {}", output.display());
            }
        }
    }

    Ok(())
}
