pub mod code_update;
pub mod invoke;
