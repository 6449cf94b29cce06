//! Aggregates module
pub mod import_run;

pub use import_run::ImportRun;
