//! Concurrent `UpdateFunctionCode` fan-out.
//!
//! Every function gets its own call; nothing is rolled back and no failure
//! aborts a sibling. The report keeps outcomes in the input order so the
//! command output reads like the configuration.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use fastdeploy_core::config::DeployedFunction;

use crate::adapters::code_update::FunctionCodeUpdater;

pub const MAX_CONCURRENT_CODE_UPDATES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionUpdateOutcome {
    pub logical_name: String,
    pub remote_name: String,
    pub error: Option<String>,
}

impl FunctionUpdateOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeUpdateReport {
    pub outcomes: Vec<FunctionUpdateOutcome>,
}

impl CodeUpdateReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(FunctionUpdateOutcome::succeeded)
    }

    pub fn failures(&self) -> Vec<&FunctionUpdateOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.succeeded())
            .collect()
    }
}

/// Points every function at `bucket`/`object_key`. All calls settle before
/// the report is returned, one outcome per function.
pub async fn update_all<U>(
    updater: Arc<U>,
    functions: &[DeployedFunction],
    bucket: &str,
    object_key: &str,
) -> CodeUpdateReport
where
    U: FunctionCodeUpdater + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_CODE_UPDATES));
    let mut tasks = JoinSet::new();

    for (index, function) in functions.iter().enumerate() {
        let updater = Arc::clone(&updater);
        let semaphore = Arc::clone(&semaphore);
        let logical_name = function.logical_name.clone();
        let remote_name = function.remote_name.clone();
        let bucket = bucket.to_string();
        let object_key = object_key.to_string();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("code update semaphore should never close");
            let result = updater.update_function_code(&remote_name, &bucket, &object_key);
            (index, logical_name, remote_name, result)
        });
    }

    let mut slots: Vec<Option<FunctionUpdateOutcome>> = vec![None; functions.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, logical_name, remote_name, result) =
            joined.expect("code update task should not panic");
        slots[index] = Some(FunctionUpdateOutcome {
            logical_name,
            remote_name,
            error: result.err(),
        });
    }

    CodeUpdateReport {
        outcomes: slots.into_iter().flatten().collect(),
    }
}
