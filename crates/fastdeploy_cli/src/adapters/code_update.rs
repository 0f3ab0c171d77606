/// One `UpdateFunctionCode` call pointing a function at the published
/// package. Implementations must be safe to call from concurrent tasks.
pub trait FunctionCodeUpdater {
    fn update_function_code(
        &self,
        function_name: &str,
        bucket: &str,
        object_key: &str,
    ) -> Result<(), String>;
}
