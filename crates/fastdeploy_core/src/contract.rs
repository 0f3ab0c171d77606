use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// AWS limit on a synchronous invoke request payload.
pub const MAX_SYNC_INVOKE_PAYLOAD_BYTES: usize = 6 * 1024 * 1024;

/// Payload sent to the updater function. Field names are part of the wire
/// contract shared with the bundled stub handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub service_name: String,
    pub deployment_stage: String,
    pub deployment_s3_bucket_name: String,
    pub base64_encoded_zip_file_bytes: String,
    pub glob_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub force_create_new_base_deployment_package: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub s3_object_key: String,
}

/// Body of a function error raised by the updater. Runtimes attach extra
/// fields (error type, stack trace); only the message is contractual.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteErrorBody {
    pub error_message: String,
}

/// Update request with trimmed identifiers and the artifact decoded back
/// into raw zip bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUpdateRequest {
    pub service_name: String,
    pub deployment_stage: String,
    pub deployment_s3_bucket_name: String,
    pub zip_file_bytes: Vec<u8>,
    pub glob_patterns: Vec<String>,
    pub force_create_new_base_deployment_package: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

impl UpdateRequest {
    /// Builds the wire payload for an update artifact, encoding the zip
    /// bytes with the standard base64 alphabet.
    pub fn for_artifact(
        service_name: impl Into<String>,
        deployment_stage: impl Into<String>,
        deployment_s3_bucket_name: impl Into<String>,
        zip_file_bytes: &[u8],
        glob_patterns: Vec<String>,
        force_create_new_base_deployment_package: bool,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            deployment_stage: deployment_stage.into(),
            deployment_s3_bucket_name: deployment_s3_bucket_name.into(),
            base64_encoded_zip_file_bytes: BASE64.encode(zip_file_bytes),
            glob_patterns,
            force_create_new_base_deployment_package,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn validated_identifier(
    value: &str,
    field: &'static str,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} cannot be empty")));
    }
    // Identifiers are embedded in storage keys as path segments.
    if trimmed.contains('/') {
        return Err(ValidationError::new(format!(
            "{field} must not contain '/'"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn normalize_update_request(
    payload: UpdateRequest,
) -> Result<NormalizedUpdateRequest, ValidationError> {
    let service_name = validated_identifier(&payload.service_name, "serviceName")?;
    let deployment_stage = validated_identifier(&payload.deployment_stage, "deploymentStage")?;

    let deployment_s3_bucket_name = payload.deployment_s3_bucket_name.trim().to_string();
    if deployment_s3_bucket_name.is_empty() {
        return Err(ValidationError::new(
            "deploymentS3BucketName cannot be empty",
        ));
    }

    if payload.base64_encoded_zip_file_bytes.is_empty() {
        return Err(ValidationError::new(
            "base64EncodedZipFileBytes cannot be empty",
        ));
    }
    let zip_file_bytes = BASE64
        .decode(payload.base64_encoded_zip_file_bytes.as_bytes())
        .map_err(|error| {
            ValidationError::new(format!(
                "base64EncodedZipFileBytes is not valid base64: {error}"
            ))
        })?;

    let mut glob_patterns: Vec<String> = Vec::new();
    for pattern in payload.glob_patterns {
        if pattern.trim().is_empty() {
            return Err(ValidationError::new(
                "globPatterns must be non-empty strings",
            ));
        }
        if !glob_patterns.contains(&pattern) {
            glob_patterns.push(pattern);
        }
    }

    Ok(NormalizedUpdateRequest {
        service_name,
        deployment_stage,
        deployment_s3_bucket_name,
        zip_file_bytes,
        glob_patterns,
        force_create_new_base_deployment_package: payload
            .force_create_new_base_deployment_package,
    })
}

/// Hex digest identifying the exact artifact bytes shipped in a request.
pub fn artifact_fingerprint(zip_file_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(zip_file_bytes);
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
