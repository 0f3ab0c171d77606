//! Staging of the updater function into the project.
//!
//! `prepare` drops two files into the stub folder: the bundled Python
//! handler and a `function.yml` holding the updater definition for the host
//! framework to merge with `${file(...)}`. The folder is recreated from
//! scratch on every staging so stale handler copies cannot linger.

use std::path::PathBuf;

use fastdeploy_core::config::ServiceConfig;

use crate::error::FastDeployError;

pub const UPDATER_STUB_TEMPLATE: &str = include_str!("templates/fast_deploy.py");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedStub {
    pub folder: PathBuf,
    pub handler_path: PathBuf,
    pub definition_path: PathBuf,
}

pub fn stage_updater_stub(
    config: &ServiceConfig,
    project_root: &std::path::Path,
) -> Result<StagedStub, FastDeployError> {
    let folder = config.stub_folder_path(project_root);
    if folder.exists() {
        std::fs::remove_dir_all(&folder).map_err(|source| FastDeployError::LocalIo {
            context: "remove stale stub folder",
            path: folder.clone(),
            source,
        })?;
    }
    std::fs::create_dir_all(&folder).map_err(|source| FastDeployError::LocalIo {
        context: "create stub folder",
        path: folder.clone(),
        source,
    })?;

    let handler_path = config.stub_handler_path(project_root);
    std::fs::write(&handler_path, UPDATER_STUB_TEMPLATE).map_err(|source| {
        FastDeployError::LocalIo {
            context: "write updater handler",
            path: handler_path.clone(),
            source,
        }
    })?;

    let spec = config.updater_function_spec();
    let definition = serde_yaml::to_string(&spec)
        .expect("updater function spec should serialize");
    let definition_path = config.updater_definition_path(project_root);
    std::fs::write(&definition_path, definition).map_err(|source| {
        FastDeployError::LocalIo {
            context: "write updater definition",
            path: definition_path.clone(),
            source,
        }
    })?;

    Ok(StagedStub {
        folder,
        handler_path,
        definition_path,
    })
}

/// Removes the staged folder. Returns false when there was nothing to
/// remove.
pub fn clean_stub_folder(
    config: &ServiceConfig,
    project_root: &std::path::Path,
) -> Result<bool, FastDeployError> {
    let folder = config.stub_folder_path(project_root);
    if !folder.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(&folder).map_err(|source| FastDeployError::LocalIo {
        context: "remove stub folder",
        path: folder.clone(),
        source,
    })?;
    Ok(true)
}
