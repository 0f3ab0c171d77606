//! Builds the update artifact, ships it through the updater function and
//! fans the published package out to every deployed function.

use std::path::Path;
use std::sync::Arc;

use fastdeploy_core::config::{DeployedFunction, ServiceConfig};

use crate::adapters::code_update::FunctionCodeUpdater;
use crate::adapters::invoke::UpdaterInvoker;
use crate::archive::build_update_artifact;
use crate::error::FastDeployError;
use crate::fanout;
use crate::ship::ship_update_artifact;

pub async fn execute<U>(
    project_root: &Path,
    config: &ServiceConfig,
    rebuild_base: bool,
    qualifier: &str,
    invoker: &impl UpdaterInvoker,
    updater: Arc<U>,
) -> Result<(), FastDeployError>
where
    U: FunctionCodeUpdater + Send + Sync + 'static,
{
    tracing::info!(
        service = %config.service_name,
        stage = %config.stage,
        "starting fast deploy"
    );

    for logical_name in &config.skipped_function_entries {
        tracing::warn!(
            function = %logical_name,
            "function entry is not a plain mapping and will not receive code updates"
        );
    }

    if config.fast_deploy.include.is_empty() {
        return Err(FastDeployError::NothingToDeploy);
    }

    let rules = config.fast_deploy.include.resolve(project_root);
    let artifact_path = config.update_artifact_path(project_root);
    let summary = build_update_artifact(&rules, &artifact_path)?;
    if summary.entry_count == 0 {
        tracing::warn!("include patterns matched no files; the update package is empty");
    }
    tracing::info!(
        artifact = %artifact_path.display(),
        entries = summary.entry_count,
        bytes = summary.byte_size,
        "built update artifact"
    );

    let object_key = ship_update_artifact(&artifact_path, config, qualifier, rebuild_base, invoker)?;
    println!(
        "✓ published update package s3://{}/{}",
        config.deployment_bucket, object_key
    );

    // The updater must never overwrite its own code mid-invocation.
    let mut targets: Vec<DeployedFunction> = Vec::new();
    for function in &config.functions {
        if function.remote_name == config.fast_deploy.name {
            tracing::warn!(
                function = %function.remote_name,
                "updater function does not receive its own update"
            );
            continue;
        }
        targets.push(function.clone());
    }

    if targets.is_empty() {
        tracing::warn!("no functions configured; nothing to update");
        return Ok(());
    }

    let report = fanout::update_all(updater, &targets, &config.deployment_bucket, &object_key).await;
    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!("✓ {} ({})", outcome.logical_name, outcome.remote_name),
            Some(error) => println!(
                "✗ {} ({}): {}",
                outcome.logical_name, outcome.remote_name, error
            ),
        }
    }

    if report.all_succeeded() {
        Ok(())
    } else {
        Err(FastDeployError::CodeUpdate {
            failed: report
                .failures()
                .into_iter()
                .map(|outcome| outcome.remote_name.clone())
                .collect(),
        })
    }
}
