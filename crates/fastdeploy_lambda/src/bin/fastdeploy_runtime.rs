use aws_sdk_s3::primitives::ByteStream;
use lambda_runtime::{service_fn, Error, LambdaEvent};

use fastdeploy_core::contract::{UpdateRequest, UpdateResponse};
use fastdeploy_lambda::adapters::object_store::DeploymentStore;
use fastdeploy_lambda::handlers::update::handle_update_request;

struct S3DeploymentStore {
    s3_client: aws_sdk_s3::Client,
}

impl DeploymentStore for S3DeploymentStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(object_key)
                    .body(ByteStream::from(body_bytes))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to write object to s3: {error}"))
            })
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, String> {
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = match client
                    .get_object()
                    .bucket(bucket)
                    .key(object_key)
                    .send()
                    .await
                {
                    Ok(response) => response,
                    Err(error) => {
                        if error
                            .as_service_error()
                            .map(|service_error| service_error.is_no_such_key())
                            .unwrap_or(false)
                        {
                            return Ok(None);
                        }
                        return Err(format!("failed to read object from s3: {error}"));
                    }
                };

                let body = response
                    .body
                    .collect()
                    .await
                    .map_err(|error| format!("failed to read object body from s3: {error}"))?;
                Ok(Some(body.into_bytes().to_vec()))
            })
        })
    }

    fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, String> {
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                match client
                    .head_object()
                    .bucket(bucket)
                    .key(object_key)
                    .send()
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(error) => {
                        if error
                            .as_service_error()
                            .map(|service_error| service_error.is_not_found())
                            .unwrap_or(false)
                        {
                            Ok(false)
                        } else {
                            Err(format!("failed to check object in s3: {error}"))
                        }
                    }
                }
            })
        })
    }

    fn list_child_prefixes(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, String> {
        let bucket = bucket.to_string();
        let scan_prefix = prefix.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let mut prefixes = Vec::new();
                let mut continuation_token: Option<String> = None;

                loop {
                    let response = client
                        .list_objects_v2()
                        .bucket(bucket.clone())
                        .prefix(scan_prefix.clone())
                        .delimiter("/")
                        .set_continuation_token(continuation_token.take())
                        .send()
                        .await
                        .map_err(|error| format!("failed to list deployments in s3: {error}"))?;

                    for common_prefix in response.common_prefixes() {
                        if let Some(child) = common_prefix.prefix() {
                            prefixes.push(child.to_string());
                        }
                    }

                    match response.next_continuation_token() {
                        Some(token) => continuation_token = Some(token.to_string()),
                        None => break,
                    }
                }

                Ok(prefixes)
            })
        })
    }
}

async fn handle_request(event: LambdaEvent<serde_json::Value>) -> Result<UpdateResponse, Error> {
    let payload: UpdateRequest = serde_json::from_value(event.payload)
        .map_err(|error| Error::from(format!("invalid update payload: {error}")))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3DeploymentStore {
        s3_client: aws_sdk_s3::Client::new(&aws_config),
    };

    handle_update_request(payload, &store).map_err(|error| Error::from(error.message))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
