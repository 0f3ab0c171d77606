//! Ships the update artifact to the updater function.
//!
//! One synchronous invoke carries the whole artifact, base64 encoded inside
//! the JSON payload. The three failure surfaces stay distinct: transport
//! errors from the invoke itself, function errors raised by the updater,
//! and well-transported responses that do not carry an object key.

use std::path::Path;

use fastdeploy_core::config::ServiceConfig;
use fastdeploy_core::contract::{
    artifact_fingerprint, stable_contract_json, RemoteErrorBody, UpdateRequest, UpdateResponse,
    MAX_SYNC_INVOKE_PAYLOAD_BYTES,
};

use crate::adapters::invoke::{InvokeOutcome, UpdaterInvoker};
use crate::error::FastDeployError;

pub const QUALIFIER_ENV_VAR: &str = "FASTDEPLOY_QUALIFIER";
pub const DEFAULT_QUALIFIER: &str = "$LATEST";

/// Updater alias to invoke: `FASTDEPLOY_QUALIFIER` when set, `$LATEST`
/// otherwise.
pub fn resolve_qualifier() -> String {
    resolve_qualifier_from(std::env::var(QUALIFIER_ENV_VAR).ok())
}

fn resolve_qualifier_from(configured: Option<String>) -> String {
    configured
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_QUALIFIER.to_string())
}

/// Reads the finished artifact back, wraps it in an [`UpdateRequest`], and
/// performs the invoke. Returns the S3 key of the published full package.
pub fn ship_update_artifact(
    artifact_path: &Path,
    config: &ServiceConfig,
    qualifier: &str,
    rebuild_base: bool,
    invoker: &impl UpdaterInvoker,
) -> Result<String, FastDeployError> {
    let zip_bytes = std::fs::read(artifact_path).map_err(|source| FastDeployError::LocalIo {
        context: "read update artifact",
        path: artifact_path.to_path_buf(),
        source,
    })?;

    let request = UpdateRequest::for_artifact(
        &config.service_name,
        &config.stage,
        &config.deployment_bucket,
        &zip_bytes,
        config.fast_deploy.include.patterns(),
        rebuild_base,
    );
    let payload = stable_contract_json(&request).into_bytes();
    if payload.len() > MAX_SYNC_INVOKE_PAYLOAD_BYTES {
        return Err(FastDeployError::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_SYNC_INVOKE_PAYLOAD_BYTES,
        });
    }

    tracing::info!(
        updater = %config.fast_deploy.name,
        qualifier,
        artifact_bytes = zip_bytes.len(),
        fingerprint = %artifact_fingerprint(&zip_bytes),
        "invoking updater function"
    );

    let outcome = invoker
        .invoke_updater(&config.fast_deploy.name, qualifier, &payload)
        .map_err(|message| FastDeployError::Transport { message })?;

    interpret_outcome(outcome)
}

fn interpret_outcome(outcome: InvokeOutcome) -> Result<String, FastDeployError> {
    if outcome.function_error.is_some() {
        let message = serde_json::from_slice::<RemoteErrorBody>(&outcome.payload)
            .map(|body| body.error_message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&outcome.payload).into_owned());
        return Err(FastDeployError::RemoteExecution { message });
    }

    let response: UpdateResponse =
        serde_json::from_slice(&outcome.payload).map_err(|error| FastDeployError::Protocol {
            message: format!("response is not an s3ObjectKey object: {error}"),
        })?;
    if response.s3_object_key.trim().is_empty() {
        return Err(FastDeployError::Protocol {
            message: "response carried an empty s3ObjectKey".to_string(),
        });
    }
    Ok(response.s3_object_key)
}
