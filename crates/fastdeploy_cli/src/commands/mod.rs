pub mod clean;
pub mod prepare;
pub mod run;
pub mod validate;
