/// Storage operations the update handler needs from the deployment bucket.
pub trait DeploymentStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String>;

    /// Returns `None` when the object does not exist.
    fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, String>;

    fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, String>;

    /// Immediate child prefixes under `prefix` with a `/` delimiter, each
    /// ending in `/`.
    fn list_child_prefixes(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, String>;
}
