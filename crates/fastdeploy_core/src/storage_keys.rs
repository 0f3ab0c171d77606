//! Deterministic S3 key layout shared by the client and the updater
//! function. Repeated deploys of one service/stage overwrite the same keys.

pub fn fastdeploy_prefix(service: &str, stage: &str) -> String {
    format!("serverless/{service}/{stage}/fastdeploy")
}

/// Key for the raw update artifact exactly as shipped by the client.
pub fn update_package_key(service: &str, stage: &str) -> String {
    format!(
        "{}/{service}-FastDeployUpdate.zip",
        fastdeploy_prefix(service, stage)
    )
}

/// Key for the cached base package, the newest full deployment with every
/// fast-deployed entry stripped out.
pub fn base_package_key(service: &str, stage: &str) -> String {
    format!(
        "{}/{service}-FastDeployBase.zip",
        fastdeploy_prefix(service, stage)
    )
}

/// Key for the published full package that `UpdateFunctionCode` points at.
pub fn full_package_key(service: &str, stage: &str) -> String {
    format!("{}/{service}.zip", fastdeploy_prefix(service, stage))
}

/// Prefix under which the host framework stores its timestamped deployment
/// directories, scanned when a base package has to be derived.
pub fn deployment_scan_prefix(service: &str, stage: &str) -> String {
    format!("serverless/{service}/{stage}/")
}

/// File name of the framework-built service package inside a deployment
/// directory.
pub fn framework_package_file_name(service: &str) -> String {
    format!("{service}.zip")
}
