//! Removes the staged updater stub folder.

use std::path::Path;

use fastdeploy_core::config::ServiceConfig;

use crate::error::FastDeployError;
use crate::stub::clean_stub_folder;

pub fn execute(
    project_root: &Path,
    config: &ServiceConfig,
    force: bool,
) -> Result<(), FastDeployError> {
    if !config.fast_deploy.clean_folder && !force {
        return Err(FastDeployError::CleanDisabled {
            folder: config.fast_deploy.folder_name.clone(),
        });
    }

    if clean_stub_folder(config, project_root)? {
        println!(
            "✓ removed {}",
            config.stub_folder_path(project_root).display()
        );
    } else {
        println!("nothing to clean");
    }
    Ok(())
}
