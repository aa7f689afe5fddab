pub mod config;
pub mod types;

pub use config::WorkerConfig;
pub use types::{HookKind, ParseStatusError, TestResult, TestStatus};
