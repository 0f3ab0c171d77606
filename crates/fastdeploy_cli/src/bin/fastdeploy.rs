use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use clap::{Parser, Subcommand};
use fastdeploy_cli::adapters::code_update::FunctionCodeUpdater;
use fastdeploy_cli::adapters::invoke::{InvokeOutcome, UpdaterInvoker};
use fastdeploy_cli::commands;
use fastdeploy_cli::ship;
use fastdeploy_core::config::{load_service_config, ConfigOverrides};

/// Fast code-only deploys for serverless services
#[derive(Parser)]
#[command(name = "fastdeploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project file path
    #[arg(short, long, default_value = "serverless.yml")]
    config: PathBuf,

    /// Deployment stage override
    #[arg(short, long)]
    stage: Option<String>,

    /// AWS region override
    #[arg(short, long)]
    region: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the update package, publish it and update every function
    Run {
        /// Rebuild the remote base package even if one already exists
        #[arg(long)]
        rebuild_base: bool,
    },

    /// Stage the updater stub for the host framework to deploy
    Prepare,

    /// Remove the staged updater stub folder
    Clean {
        /// Remove the folder even when cleanFolder is disabled
        #[arg(short, long)]
        force: bool,
    },

    /// Print the resolved fast-deploy view of the project file
    Validate,
}

struct LambdaUpdaterInvoker {
    lambda_client: aws_sdk_lambda::Client,
}

impl UpdaterInvoker for LambdaUpdaterInvoker {
    fn invoke_updater(
        &self,
        function_name: &str,
        qualifier: &str,
        payload: &[u8],
    ) -> Result<InvokeOutcome, String> {
        let function = function_name.to_string();
        let version = qualifier.to_string();
        let request_payload = payload.to_vec();
        let client = self.lambda_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .invoke()
                    .function_name(function)
                    .qualifier(version)
                    .invocation_type(InvocationType::RequestResponse)
                    .payload(Blob::new(request_payload))
                    .send()
                    .await
                    .map_err(|error| format!("failed to invoke updater function: {error}"))?;

                Ok(InvokeOutcome {
                    function_error: output.function_error().map(str::to_string),
                    payload: output
                        .payload()
                        .map(|blob| blob.as_ref().to_vec())
                        .unwrap_or_default(),
                })
            })
        })
    }
}

struct LambdaCodeUpdater {
    lambda_client: aws_sdk_lambda::Client,
}

impl FunctionCodeUpdater for LambdaCodeUpdater {
    fn update_function_code(
        &self,
        function_name: &str,
        bucket: &str,
        object_key: &str,
    ) -> Result<(), String> {
        let function = function_name.to_string();
        let package_bucket = bucket.to_string();
        let package_key = object_key.to_string();
        let client = self.lambda_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .update_function_code()
                    .function_name(function)
                    .s3_bucket(package_bucket)
                    .s3_key(package_key)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to update function code: {error}"))
            })
        })
    }
}

async fn sdk_config(region: Option<String>) -> aws_config::SdkConfig {
    let loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    let loader = match region {
        Some(region) => loader.region(aws_config::Region::new(region)),
        None => loader,
    };
    loader.load().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let overrides = ConfigOverrides {
        stage: cli.stage.clone(),
        region: cli.region.clone(),
    };
    let config = load_service_config(&cli.config, &overrides)?;

    let project_root = match cli.config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let project_root = project_root
        .canonicalize()
        .with_context(|| format!("failed to resolve project root {}", project_root.display()))?;

    match cli.command {
        Commands::Run { rebuild_base } => {
            let aws_config = sdk_config(config.region.clone()).await;
            let lambda_client = aws_sdk_lambda::Client::new(&aws_config);
            let invoker = LambdaUpdaterInvoker {
                lambda_client: lambda_client.clone(),
            };
            let updater = Arc::new(LambdaCodeUpdater { lambda_client });
            let qualifier = ship::resolve_qualifier();
            commands::run::execute(
                &project_root,
                &config,
                rebuild_base,
                &qualifier,
                &invoker,
                updater,
            )
            .await?;
        }
        Commands::Prepare => commands::prepare::execute(&project_root, &config)?,
        Commands::Clean { force } => commands::clean::execute(&project_root, &config, force)?,
        Commands::Validate => commands::validate::execute(&config)?,
    }

    Ok(())
}
