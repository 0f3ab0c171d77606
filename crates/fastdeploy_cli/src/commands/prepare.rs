//! Stages the updater stub so the host framework can deploy it.

use std::path::Path;

use fastdeploy_core::config::ServiceConfig;

use crate::error::FastDeployError;
use crate::stub::stage_updater_stub;

pub fn execute(project_root: &Path, config: &ServiceConfig) -> Result<(), FastDeployError> {
    tracing::info!(folder = %config.fast_deploy.folder_name, "staging updater stub");

    let staged = stage_updater_stub(config, project_root)?;

    println!("✓ staged updater stub");
    println!("  Handler:    {}", staged.handler_path.display());
    println!("  Definition: {}", staged.definition_path.display());
    println!();
    println!("Reference the updater from the project file:");
    println!();
    println!("  functions:");
    println!(
        "    FastDeploy: ${{file({}/function.yml)}}",
        config.fast_deploy.folder_name
    );
    println!();
    println!("then deploy the service once before running `fastdeploy run`.");
    Ok(())
}
