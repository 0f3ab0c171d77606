//! Prints the resolved fast-deploy view of the project file.

use fastdeploy_core::config::ServiceConfig;

use crate::error::FastDeployError;

pub fn execute(config: &ServiceConfig) -> Result<(), FastDeployError> {
    println!("✓ configuration is valid");
    println!();
    println!("Service:");
    println!("  Name:   {}", config.service_name);
    println!("  Stage:  {}", config.stage);
    if let Some(region) = &config.region {
        println!("  Region: {}", region);
    }
    println!("  Bucket: {}", config.deployment_bucket);
    println!();
    println!("Updater:");
    println!("  Name:        {}", config.fast_deploy.name);
    println!("  Memory Size: {} MB", config.fast_deploy.memory_size);
    println!("  Timeout:     {} s", config.fast_deploy.timeout);
    println!("  Stub Folder: {}", config.fast_deploy.folder_name);
    println!();
    println!("Functions ({}):", config.functions.len());
    for function in &config.functions {
        println!("  • {} -> {}", function.logical_name, function.remote_name);
    }
    for skipped in &config.skipped_function_entries {
        println!("  • {} (skipped: not a plain mapping)", skipped);
    }

    let patterns = config.fast_deploy.include.patterns();
    println!();
    if patterns.is_empty() {
        println!("No include patterns configured; `fastdeploy run` will refuse to deploy.");
    } else {
        println!("Include patterns ({}):", patterns.len());
        for pattern in patterns {
            println!("  • {}", pattern);
        }
    }
    Ok(())
}
