//! Service configuration loading.
//!
//! Parses the host framework's project file (`serverless.yml` shape) and
//! resolves the `custom.fastDeploy` section into a validated view. Raw
//! structs mirror the file; resolution applies defaults and bounds once so
//! downstream code never re-checks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::include::InclusionSpec;

pub const DEFAULT_STAGE: &str = "dev";
pub const DEFAULT_MEMORY_SIZE_MB: u32 = 512;
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 30;
pub const DEFAULT_STUB_FOLDER: &str = "_fastdeploy";
pub const UPDATER_RUNTIME: &str = "python3.12";
pub const UPDATER_DESCRIPTION: &str =
    "Publishes fast deploy update packages for this service";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("project file {path} not found")]
    NotFound { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse project file: {message}")]
    Parse { message: String },
    #[error("missing {field}: {reason}")]
    MissingField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
struct RawProjectFile {
    service: RawService,
    provider: RawProvider,
    #[serde(default)]
    functions: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    custom: RawCustom,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawService {
    Name(String),
    Detailed { name: String },
}

impl RawService {
    fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProvider {
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    deployment_bucket: Option<RawDeploymentBucket>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDeploymentBucket {
    Name(String),
    Detailed { name: String },
}

impl RawDeploymentBucket {
    fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name } => name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCustom {
    #[serde(rename = "fastDeploy")]
    fast_deploy: Option<RawFastDeploy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawFastDeploy {
    #[serde(default = "default_clean_folder")]
    clean_folder: bool,
    #[serde(default = "default_memory_size")]
    memory_size: u32,
    name: Option<String>,
    role: Option<String>,
    tags: Option<BTreeMap<String, String>>,
    #[serde(default = "default_timeout")]
    timeout: u32,
    #[serde(default = "default_folder_name")]
    folder_name: String,
    include: Option<InclusionSpec>,
}

impl Default for RawFastDeploy {
    fn default() -> Self {
        Self {
            clean_folder: default_clean_folder(),
            memory_size: default_memory_size(),
            name: None,
            role: None,
            tags: None,
            timeout: default_timeout(),
            folder_name: default_folder_name(),
            include: None,
        }
    }
}

fn default_clean_folder() -> bool {
    true
}

fn default_memory_size() -> u32 {
    DEFAULT_MEMORY_SIZE_MB
}

fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_folder_name() -> String {
    DEFAULT_STUB_FOLDER.to_string()
}

/// Validated `custom.fastDeploy` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastDeployConfig {
    pub clean_folder: bool,
    pub memory_size: u32,
    pub name: String,
    pub role: Option<String>,
    pub tags: Option<BTreeMap<String, String>>,
    pub timeout: u32,
    pub folder_name: String,
    pub include: InclusionSpec,
}

/// One function of the service, with the remote name `UpdateFunctionCode`
/// is addressed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedFunction {
    pub logical_name: String,
    pub remote_name: String,
}

/// Stage/region values supplied on the command line, which take precedence
/// over the project file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub stage: Option<String>,
    pub region: Option<String>,
}

/// Fully resolved view of the project file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub service_name: String,
    pub stage: String,
    pub region: Option<String>,
    pub deployment_bucket: String,
    pub functions: Vec<DeployedFunction>,
    /// Logical names of function entries that were not plain mappings
    /// (typically `${file(...)}` references the host framework would
    /// resolve). They are excluded from code updates.
    pub skipped_function_entries: Vec<String>,
    pub fast_deploy: FastDeployConfig,
}

/// Updater function definition written by `prepare` for the host framework
/// to merge via a `${file(...)}` reference.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdaterFunctionSpec {
    pub description: String,
    pub events: Vec<String>,
    pub handler: String,
    pub memory_size: u32,
    pub name: String,
    pub package: UpdaterPackageSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub runtime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    pub timeout: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpdaterPackageSpec {
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    pub individually: bool,
}

impl ServiceConfig {
    /// Path of the update artifact the archive step writes and the ship
    /// step reads back.
    pub fn update_artifact_path(&self, project_root: &Path) -> PathBuf {
        project_root
            .join(".serverless")
            .join(format!("{}-FastDeployUpdate.zip", self.service_name))
    }

    pub fn stub_folder_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.fast_deploy.folder_name)
    }

    pub fn stub_handler_path(&self, project_root: &Path) -> PathBuf {
        self.stub_folder_path(project_root).join("fast_deploy.py")
    }

    pub fn updater_definition_path(&self, project_root: &Path) -> PathBuf {
        self.stub_folder_path(project_root).join("function.yml")
    }

    pub fn updater_function_spec(&self) -> UpdaterFunctionSpec {
        let folder = &self.fast_deploy.folder_name;
        UpdaterFunctionSpec {
            description: UPDATER_DESCRIPTION.to_string(),
            events: Vec::new(),
            handler: format!("{folder}/fast_deploy.handle"),
            memory_size: self.fast_deploy.memory_size,
            name: self.fast_deploy.name.clone(),
            package: UpdaterPackageSpec {
                exclude: vec!["**".to_string()],
                include: vec![format!("{folder}/**")],
                individually: true,
            },
            role: self.fast_deploy.role.clone(),
            runtime: UPDATER_RUNTIME.to_string(),
            tags: self.fast_deploy.tags.clone(),
            timeout: self.fast_deploy.timeout,
        }
    }
}

/// Load and resolve the project file from disk.
pub fn load_service_config(
    path: impl AsRef<Path>,
    overrides: &ConfigOverrides,
) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_service_config(&content, overrides)
}

/// Resolve the project file from its YAML text.
pub fn parse_service_config(
    content: &str,
    overrides: &ConfigOverrides,
) -> Result<ServiceConfig, ConfigError> {
    let raw: RawProjectFile = serde_yaml::from_str(content).map_err(|error| {
        ConfigError::Parse {
            message: error.to_string(),
        }
    })?;
    resolve_service_config(raw, overrides)
}

fn resolve_service_config(
    raw: RawProjectFile,
    overrides: &ConfigOverrides,
) -> Result<ServiceConfig, ConfigError> {
    let service_name = validated_segment(raw.service.name(), "service")?;

    let stage = match (&overrides.stage, &raw.provider.stage) {
        (Some(stage), _) => stage.clone(),
        (None, Some(stage)) => stage.clone(),
        (None, None) => DEFAULT_STAGE.to_string(),
    };
    let stage = validated_segment(&stage, "stage")?;

    let region = overrides
        .region
        .clone()
        .or_else(|| raw.provider.region.clone())
        .map(|region| region.trim().to_string())
        .filter(|region| !region.is_empty());

    let deployment_bucket = raw
        .provider
        .deployment_bucket
        .as_ref()
        .map(|bucket| bucket.name().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(ConfigError::MissingField {
            field: "provider.deploymentBucket",
            reason: "the update payload names the bucket the updater writes to",
        })?;

    let mut functions = Vec::new();
    let mut skipped_function_entries = Vec::new();
    for (logical_name, definition) in &raw.functions {
        if !definition.is_mapping() {
            skipped_function_entries.push(logical_name.clone());
            continue;
        }
        let remote_name = definition
            .get("name")
            .and_then(serde_yaml::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{service_name}-{stage}-{logical_name}"));
        functions.push(DeployedFunction {
            logical_name: logical_name.clone(),
            remote_name,
        });
    }

    let fast_deploy = resolve_fast_deploy(
        raw.custom.fast_deploy.unwrap_or_default(),
        &service_name,
        &stage,
    )?;

    Ok(ServiceConfig {
        service_name,
        stage,
        region,
        deployment_bucket,
        functions,
        skipped_function_entries,
        fast_deploy,
    })
}

fn resolve_fast_deploy(
    raw: RawFastDeploy,
    service_name: &str,
    stage: &str,
) -> Result<FastDeployConfig, ConfigError> {
    if raw.memory_size == 0 {
        return Err(ConfigError::InvalidField {
            field: "custom.fastDeploy.memorySize",
            reason: "must be greater than zero".to_string(),
        });
    }
    if raw.timeout == 0 {
        return Err(ConfigError::InvalidField {
            field: "custom.fastDeploy.timeout",
            reason: "must be greater than zero".to_string(),
        });
    }

    let folder_name = raw.folder_name.trim().to_string();
    if folder_name.is_empty() || folder_name == "." || folder_name == ".." {
        return Err(ConfigError::InvalidField {
            field: "custom.fastDeploy.folderName",
            reason: format!("'{}' is not a usable folder name", raw.folder_name),
        });
    }
    if folder_name.contains('/') || folder_name.contains('\\') {
        return Err(ConfigError::InvalidField {
            field: "custom.fastDeploy.folderName",
            reason: "must be a single path segment".to_string(),
        });
    }

    let name = match raw.name {
        Some(name) => {
            let trimmed = name.trim().to_string();
            if trimmed.is_empty() {
                return Err(ConfigError::InvalidField {
                    field: "custom.fastDeploy.name",
                    reason: "must be non-empty when set".to_string(),
                });
            }
            trimmed
        }
        None => format!("{service_name}-{stage}-FastDeploy"),
    };

    if let Some(tags) = &raw.tags {
        if tags.keys().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::InvalidField {
                field: "custom.fastDeploy.tags",
                reason: "tag names cannot be empty".to_string(),
            });
        }
    }

    Ok(FastDeployConfig {
        clean_folder: raw.clean_folder,
        memory_size: raw.memory_size,
        name,
        role: raw.role,
        tags: raw.tags,
        timeout: raw.timeout,
        folder_name,
        include: raw.include.unwrap_or_default(),
    })
}

fn validated_segment(value: &str, field: &'static str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidField {
            field,
            reason: "cannot be empty".to_string(),
        });
    }
    // Embedded in storage keys as a path segment.
    if trimmed.contains('/') {
        return Err(ConfigError::InvalidField {
            field,
            reason: "must not contain '/'".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
service: widget-api
provider:
  name: aws
  runtime: nodejs20.x
  stage: staging
  region: eu-west-1
  deploymentBucket: widget-deploys
functions:
  api:
    handler: src/api.handler
  worker:
    handler: src/worker.handler
    name: widget-background-worker
custom:
  fastDeploy:
    memorySize: 1024
    timeout: 60
    include:
      - src/**/*.js
      - package.json
"#;

    const MINIMAL_CONFIG: &str = r#"
service: widget-api
provider:
  name: aws
  deploymentBucket: widget-deploys
functions:
  api:
    handler: src/api.handler
"#;

    fn no_overrides() -> ConfigOverrides {
        ConfigOverrides::default()
    }

    #[test]
    fn resolves_full_config() {
        let config = parse_service_config(FULL_CONFIG, &no_overrides())
            .expect("config should resolve");

        assert_eq!(config.service_name, "widget-api");
        assert_eq!(config.stage, "staging");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.deployment_bucket, "widget-deploys");
        assert_eq!(config.fast_deploy.memory_size, 1024);
        assert_eq!(config.fast_deploy.timeout, 60);
        assert_eq!(config.fast_deploy.name, "widget-api-staging-FastDeploy");
        assert_eq!(config.fast_deploy.folder_name, "_fastdeploy");
        assert!(config.fast_deploy.clean_folder);
        assert_eq!(
            config.fast_deploy.include.patterns(),
            vec!["src/**/*.js", "package.json"]
        );
    }

    #[test]
    fn function_names_default_to_service_stage_logical() {
        let config = parse_service_config(FULL_CONFIG, &no_overrides())
            .expect("config should resolve");

        assert_eq!(config.functions.len(), 2);
        assert_eq!(config.functions[0].logical_name, "api");
        assert_eq!(config.functions[0].remote_name, "widget-api-staging-api");
        assert_eq!(config.functions[1].remote_name, "widget-background-worker");
    }

    #[test]
    fn applies_defaults_without_custom_section() {
        let config = parse_service_config(MINIMAL_CONFIG, &no_overrides())
            .expect("config should resolve");

        assert_eq!(config.stage, "dev");
        assert_eq!(config.region, None);
        assert_eq!(config.fast_deploy.memory_size, DEFAULT_MEMORY_SIZE_MB);
        assert_eq!(config.fast_deploy.timeout, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(config.fast_deploy.name, "widget-api-dev-FastDeploy");
        assert!(config.fast_deploy.include.is_empty());
    }

    #[test]
    fn stage_override_beats_provider_stage() {
        let overrides = ConfigOverrides {
            stage: Some("prod".to_string()),
            region: None,
        };
        let config =
            parse_service_config(FULL_CONFIG, &overrides).expect("config should resolve");
        assert_eq!(config.stage, "prod");
        assert_eq!(config.fast_deploy.name, "widget-api-prod-FastDeploy");
    }

    #[test]
    fn accepts_detailed_deployment_bucket() {
        let yaml = r#"
service: widget-api
provider:
  deploymentBucket:
    name: widget-deploys
    serverSideEncryption: AES256
"#;
        let config = parse_service_config(yaml, &no_overrides())
            .expect("config should resolve");
        assert_eq!(config.deployment_bucket, "widget-deploys");
    }

    #[test]
    fn rejects_missing_deployment_bucket() {
        let yaml = r#"
service: widget-api
provider:
  name: aws
"#;
        let error = parse_service_config(yaml, &no_overrides())
            .expect_err("config should fail");
        assert!(matches!(
            error,
            ConfigError::MissingField {
                field: "provider.deploymentBucket",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_memory_size() {
        let yaml = r#"
service: widget-api
provider:
  deploymentBucket: widget-deploys
custom:
  fastDeploy:
    memorySize: 0
"#;
        let error = parse_service_config(yaml, &no_overrides())
            .expect_err("config should fail");
        assert!(matches!(
            error,
            ConfigError::InvalidField {
                field: "custom.fastDeploy.memorySize",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_fast_deploy_option() {
        let yaml = r#"
service: widget-api
provider:
  deploymentBucket: widget-deploys
custom:
  fastDeploy:
    memorysize: 1024
"#;
        let error = parse_service_config(yaml, &no_overrides())
            .expect_err("config should fail");
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn rejects_traversing_folder_name() {
        let yaml = r#"
service: widget-api
provider:
  deploymentBucket: widget-deploys
custom:
  fastDeploy:
    folderName: ..
"#;
        let error = parse_service_config(yaml, &no_overrides())
            .expect_err("config should fail");
        assert!(matches!(
            error,
            ConfigError::InvalidField {
                field: "custom.fastDeploy.folderName",
                ..
            }
        ));
    }

    #[test]
    fn skips_non_mapping_function_entries() {
        let yaml = r#"
service: widget-api
provider:
  deploymentBucket: widget-deploys
functions:
  api:
    handler: src/api.handler
  legacy: ${file(functions/legacy.yml)}
"#;
        let config = parse_service_config(yaml, &no_overrides())
            .expect("config should resolve");
        assert_eq!(config.functions.len(), 1);
        assert_eq!(config.skipped_function_entries, vec!["legacy"]);
    }

    #[test]
    fn derives_artifact_and_stub_paths() {
        let config = parse_service_config(MINIMAL_CONFIG, &no_overrides())
            .expect("config should resolve");
        let root = Path::new("/work/widget-api");

        assert_eq!(
            config.update_artifact_path(root),
            PathBuf::from("/work/widget-api/.serverless/widget-api-FastDeployUpdate.zip")
        );
        assert_eq!(
            config.stub_folder_path(root),
            PathBuf::from("/work/widget-api/_fastdeploy")
        );
        assert_eq!(
            config.stub_handler_path(root),
            PathBuf::from("/work/widget-api/_fastdeploy/fast_deploy.py")
        );
    }

    #[test]
    fn updater_spec_packages_only_the_stub_folder() {
        let config = parse_service_config(MINIMAL_CONFIG, &no_overrides())
            .expect("config should resolve");
        let spec = config.updater_function_spec();

        assert_eq!(spec.name, "widget-api-dev-FastDeploy");
        assert_eq!(spec.handler, "_fastdeploy/fast_deploy.handle");
        assert_eq!(spec.runtime, UPDATER_RUNTIME);
        assert_eq!(spec.package.exclude, vec!["**"]);
        assert_eq!(spec.package.include, vec!["_fastdeploy/**"]);
        assert!(spec.package.individually);

        let yaml = serde_yaml::to_string(&spec).expect("spec should serialize");
        assert!(yaml.contains("memorySize: 512"));
        assert!(yaml.contains("runtime: python3.12"));
        assert!(yaml.contains("events: []"));
        assert!(!yaml.contains("role:"));
    }
}
