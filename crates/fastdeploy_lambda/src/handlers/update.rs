use serde_json::json;

use fastdeploy_core::contract::{
    artifact_fingerprint, normalize_update_request, NormalizedUpdateRequest, UpdateRequest,
    UpdateResponse,
};
use fastdeploy_core::storage_keys::{
    base_package_key, deployment_scan_prefix, fastdeploy_prefix, framework_package_file_name,
    full_package_key, update_package_key,
};

use crate::adapters::object_store::DeploymentStore;
use crate::packages::{merge_packages, strip_matching_entries};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateHandlerError {
    pub message: String,
}

/// Publishes a full deployment package for the request and returns its key.
///
/// The raw update artifact is stored first, then merged over a base package.
/// The base is reused from a previous run when present; otherwise it is
/// derived from the newest framework deployment with every entry matched by
/// the request's glob patterns stripped out.
pub fn handle_update_request(
    payload: UpdateRequest,
    store: &impl DeploymentStore,
) -> Result<UpdateResponse, UpdateHandlerError> {
    match publish_update(payload, store) {
        Ok(response) => Ok(response),
        Err(error) => {
            log_update_error(
                "update_failed",
                json!({
                    "error": error.message.clone(),
                }),
            );
            Err(error)
        }
    }
}

fn publish_update(
    payload: UpdateRequest,
    store: &impl DeploymentStore,
) -> Result<UpdateResponse, UpdateHandlerError> {
    let request = normalize_update_request(payload).map_err(|error| UpdateHandlerError {
        message: error.message().to_string(),
    })?;

    log_update_info(
        "update_received",
        json!({
            "service": request.service_name.clone(),
            "stage": request.deployment_stage.clone(),
            "bucket": request.deployment_s3_bucket_name.clone(),
            "update_bytes": request.zip_file_bytes.len(),
            "fingerprint": artifact_fingerprint(&request.zip_file_bytes),
            "force_new_base": request.force_create_new_base_deployment_package,
            "glob_patterns": request.glob_patterns.clone(),
        }),
    );

    let update_key = update_package_key(&request.service_name, &request.deployment_stage);
    store
        .put_object(
            &request.deployment_s3_bucket_name,
            &update_key,
            &request.zip_file_bytes,
        )
        .map_err(|error| UpdateHandlerError {
            message: format!("failed to store update package: {error}"),
        })?;

    let base_key = base_package_key(&request.service_name, &request.deployment_stage);
    let existing_base = if request.force_create_new_base_deployment_package {
        None
    } else {
        store
            .get_object(&request.deployment_s3_bucket_name, &base_key)
            .map_err(|error| UpdateHandlerError {
                message: format!("failed to read base package: {error}"),
            })?
    };

    let base_package = match existing_base {
        Some(package) => package,
        None => {
            let package = derive_base_package(&request, store)?;
            store
                .put_object(&request.deployment_s3_bucket_name, &base_key, &package)
                .map_err(|error| UpdateHandlerError {
                    message: format!("failed to store base package: {error}"),
                })?;
            package
        }
    };

    let full_package =
        merge_packages(&base_package, &request.zip_file_bytes).map_err(|error| {
            UpdateHandlerError {
                message: format!("failed to merge deployment packages: {error}"),
            }
        })?;

    let full_key = full_package_key(&request.service_name, &request.deployment_stage);
    store
        .put_object(&request.deployment_s3_bucket_name, &full_key, &full_package)
        .map_err(|error| UpdateHandlerError {
            message: format!("failed to store full package: {error}"),
        })?;

    log_update_info(
        "full_package_published",
        json!({
            "key": full_key.clone(),
            "bytes": full_package.len(),
        }),
    );

    Ok(UpdateResponse {
        s3_object_key: full_key,
    })
}

/// Walks the framework's timestamped deployment directories from newest to
/// oldest and strips the fast-deployed entries out of the first package it
/// finds. The updater's own prefix lives under the same parent and is
/// skipped.
fn derive_base_package(
    request: &NormalizedUpdateRequest,
    store: &impl DeploymentStore,
) -> Result<Vec<u8>, UpdateHandlerError> {
    let scan_prefix = deployment_scan_prefix(&request.service_name, &request.deployment_stage);
    let own_prefix = format!(
        "{}/",
        fastdeploy_prefix(&request.service_name, &request.deployment_stage)
    );

    let mut prefixes = store
        .list_child_prefixes(&request.deployment_s3_bucket_name, &scan_prefix)
        .map_err(|error| UpdateHandlerError {
            message: format!("failed to list deployments: {error}"),
        })?;
    prefixes.retain(|prefix| prefix != &own_prefix);
    prefixes.sort();

    let package_file = framework_package_file_name(&request.service_name);
    for prefix in prefixes.iter().rev() {
        let candidate_key = format!("{prefix}{package_file}");
        let exists = store
            .object_exists(&request.deployment_s3_bucket_name, &candidate_key)
            .map_err(|error| UpdateHandlerError {
                message: format!("failed to check deployment package: {error}"),
            })?;
        if !exists {
            continue;
        }

        let package = store
            .get_object(&request.deployment_s3_bucket_name, &candidate_key)
            .map_err(|error| UpdateHandlerError {
                message: format!("failed to read deployment package: {error}"),
            })?
            .ok_or_else(|| UpdateHandlerError {
                message: format!("deployment package disappeared: {candidate_key}"),
            })?;

        log_update_info(
            "base_package_derived",
            json!({
                "source_key": candidate_key.clone(),
                "source_bytes": package.len(),
            }),
        );

        return strip_matching_entries(&package, &request.glob_patterns).map_err(|error| {
            UpdateHandlerError {
                message: format!("failed to strip update entries from deployment package: {error}"),
            }
        });
    }

    Err(UpdateHandlerError {
        message: format!(
            "Could not find any deployments for [{}-{}]",
            request.service_name, request.deployment_stage
        ),
    })
}

fn log_update_info(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "update_handler",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

fn log_update_error(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "update_handler",
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    use zip::write::FileOptions;
    use zip::CompressionMethod;

    use super::*;

    const BUCKET: &str = "widget-deploys";
    const NEWEST_DEPLOYMENT: &str = "serverless/widget-api/dev/1600000000000-2020-09-13T12:26:40.000Z/";
    const OLDER_DEPLOYMENT: &str = "serverless/widget-api/dev/1500000000000-2017-07-14T02:40:00.000Z/";
    const FASTDEPLOY_PREFIX: &str = "serverless/widget-api/dev/fastdeploy/";

    struct RecordingStore {
        objects: Mutex<HashMap<(String, String), Vec<u8>>>,
        child_prefixes: Vec<String>,
        fail_put_keys: Vec<String>,
        list_calls: Mutex<usize>,
        put_order: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new(child_prefixes: Vec<String>) -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                child_prefixes,
                fail_put_keys: Vec::new(),
                list_calls: Mutex::new(0),
                put_order: Mutex::new(Vec::new()),
            }
        }

        fn seed_object(&self, key: &str, body: &[u8]) {
            self.objects
                .lock()
                .expect("poisoned mutex")
                .insert((BUCKET.to_string(), key.to_string()), body.to_vec());
        }

        fn body(&self, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .expect("poisoned mutex")
                .get(&(BUCKET.to_string(), key.to_string()))
                .cloned()
        }

        fn list_calls(&self) -> usize {
            *self.list_calls.lock().expect("poisoned mutex")
        }

        fn put_order(&self) -> Vec<String> {
            self.put_order.lock().expect("poisoned mutex").clone()
        }
    }

    impl DeploymentStore for RecordingStore {
        fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
            if self.fail_put_keys.iter().any(|denied| denied == key) {
                return Err(format!("simulated write failure for key: {key}"));
            }
            self.put_order
                .lock()
                .expect("poisoned mutex")
                .push(key.to_string());
            self.objects
                .lock()
                .expect("poisoned mutex")
                .insert((bucket.to_string(), key.to_string()), body.to_vec());
            Ok(())
        }

        fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, String> {
            Ok(self
                .objects
                .lock()
                .expect("poisoned mutex")
                .get(&(bucket.to_string(), key.to_string()))
                .cloned())
        }

        fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, String> {
            Ok(self
                .objects
                .lock()
                .expect("poisoned mutex")
                .contains_key(&(bucket.to_string(), key.to_string())))
        }

        fn list_child_prefixes(&self, _bucket: &str, _prefix: &str) -> Result<Vec<String>, String> {
            *self.list_calls.lock().expect("poisoned mutex") += 1;
            Ok(self.child_prefixes.clone())
        }
    }

    fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, body) in entries {
            writer.start_file(*name, options).expect("entry should start");
            writer.write_all(body).expect("entry should be written");
        }
        writer.finish().expect("zip should finish").into_inner()
    }

    fn entry_names(package: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(package))
            .expect("package should be a zip");
        let mut names: Vec<String> = (0..archive.len())
            .map(|index| {
                archive
                    .by_index(index)
                    .expect("entry should be readable")
                    .name()
                    .to_string()
            })
            .collect();
        names.sort();
        names
    }

    fn update_zip() -> Vec<u8> {
        make_zip(&[("src/app.js", b"new code".as_ref())])
    }

    fn deployed_zip() -> Vec<u8> {
        make_zip(&[
            ("src/app.js", b"old code".as_ref()),
            ("vendor/lib.js", b"vendor".as_ref()),
        ])
    }

    fn sample_request(force: bool) -> UpdateRequest {
        UpdateRequest::for_artifact(
            "widget-api",
            "dev",
            BUCKET,
            &update_zip(),
            vec!["src/**".to_string()],
            force,
        )
    }

    #[test]
    fn reuses_an_existing_base_package() {
        let store = RecordingStore::new(vec![FASTDEPLOY_PREFIX.to_string()]);
        store.seed_object(
            &base_package_key("widget-api", "dev"),
            &make_zip(&[("vendor/lib.js", b"vendor".as_ref())]),
        );

        let response = handle_update_request(sample_request(false), &store)
            .expect("update should succeed");

        assert_eq!(
            response.s3_object_key,
            "serverless/widget-api/dev/fastdeploy/widget-api.zip"
        );
        assert_eq!(store.list_calls(), 0);

        let full = store
            .body(&full_package_key("widget-api", "dev"))
            .expect("full package should be stored");
        assert_eq!(entry_names(&full), vec!["src/app.js", "vendor/lib.js"]);
        assert!(store
            .body(&update_package_key("widget-api", "dev"))
            .is_some());
    }

    #[test]
    fn derives_base_from_the_newest_deployment() {
        let store = RecordingStore::new(vec![
            OLDER_DEPLOYMENT.to_string(),
            FASTDEPLOY_PREFIX.to_string(),
            NEWEST_DEPLOYMENT.to_string(),
        ]);
        store.seed_object(
            &format!("{OLDER_DEPLOYMENT}widget-api.zip"),
            &make_zip(&[("stale.py", b"stale".as_ref())]),
        );
        store.seed_object(&format!("{NEWEST_DEPLOYMENT}widget-api.zip"), &deployed_zip());

        handle_update_request(sample_request(false), &store).expect("update should succeed");

        let base = store
            .body(&base_package_key("widget-api", "dev"))
            .expect("base package should be stored");
        assert_eq!(entry_names(&base), vec!["vendor/lib.js"]);

        let full = store
            .body(&full_package_key("widget-api", "dev"))
            .expect("full package should be stored");
        assert_eq!(entry_names(&full), vec!["src/app.js", "vendor/lib.js"]);
    }

    #[test]
    fn scan_skips_deployments_without_a_package() {
        let store = RecordingStore::new(vec![
            OLDER_DEPLOYMENT.to_string(),
            NEWEST_DEPLOYMENT.to_string(),
        ]);
        store.seed_object(&format!("{OLDER_DEPLOYMENT}widget-api.zip"), &deployed_zip());

        handle_update_request(sample_request(false), &store).expect("update should succeed");

        let base = store
            .body(&base_package_key("widget-api", "dev"))
            .expect("base package should be stored");
        assert_eq!(entry_names(&base), vec!["vendor/lib.js"]);
    }

    #[test]
    fn missing_deployments_fail_after_the_update_is_stored() {
        let store = RecordingStore::new(vec![FASTDEPLOY_PREFIX.to_string()]);

        let error = handle_update_request(sample_request(false), &store)
            .expect_err("update should fail");

        assert_eq!(
            error.message,
            "Could not find any deployments for [widget-api-dev]"
        );
        assert_eq!(
            store.put_order(),
            vec![update_package_key("widget-api", "dev")]
        );
    }

    #[test]
    fn force_flag_rederives_the_base_package() {
        let store = RecordingStore::new(vec![NEWEST_DEPLOYMENT.to_string()]);
        store.seed_object(
            &base_package_key("widget-api", "dev"),
            &make_zip(&[("stale.py", b"stale".as_ref())]),
        );
        store.seed_object(&format!("{NEWEST_DEPLOYMENT}widget-api.zip"), &deployed_zip());

        handle_update_request(sample_request(true), &store).expect("update should succeed");

        assert_eq!(store.list_calls(), 1);
        let base = store
            .body(&base_package_key("widget-api", "dev"))
            .expect("base package should be stored");
        assert_eq!(entry_names(&base), vec!["vendor/lib.js"]);
        let full = store
            .body(&full_package_key("widget-api", "dev"))
            .expect("full package should be stored");
        assert!(!entry_names(&full).contains(&"stale.py".to_string()));
    }

    #[test]
    fn invalid_payload_touches_nothing() {
        let store = RecordingStore::new(Vec::new());
        let mut request = sample_request(false);
        request.base64_encoded_zip_file_bytes = String::new();

        let error =
            handle_update_request(request, &store).expect_err("payload should be rejected");

        assert_eq!(error.message, "base64EncodedZipFileBytes cannot be empty");
        assert!(store.put_order().is_empty());
        assert_eq!(store.list_calls(), 0);
    }

    #[test]
    fn failed_update_store_is_reported() {
        let mut store = RecordingStore::new(vec![NEWEST_DEPLOYMENT.to_string()]);
        store.fail_put_keys = vec![update_package_key("widget-api", "dev")];

        let error = handle_update_request(sample_request(false), &store)
            .expect_err("update should fail");

        assert!(error.message.starts_with("failed to store update package"));
    }
}
