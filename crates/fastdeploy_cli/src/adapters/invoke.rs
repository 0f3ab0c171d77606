/// Result surface of one synchronous Lambda invoke: the function-error
/// marker (set when the invoked code raised) and the raw response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOutcome {
    pub function_error: Option<String>,
    pub payload: Vec<u8>,
}

/// Synchronous invoke of the updater function. Errors are transport-level
/// failures; a function error travels inside the outcome.
pub trait UpdaterInvoker {
    fn invoke_updater(
        &self,
        function_name: &str,
        qualifier: &str,
        payload: &[u8],
    ) -> Result<InvokeOutcome, String>;
}
