//! Outcome and hook vocabulary exchanged with the runner process.
//!
//! The suite model stores these values and hands them back to the execution
//! and reporting layers; it never interprets them beyond equality against
//! [`TestStatus::Failed`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a single test attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    Passed,
    Failed,
    TimedOut,
    Skipped,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::TimedOut => "timedOut",
            TestStatus::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// Error returned when parsing an unrecognized status string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown test status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for TestStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(TestStatus::Passed),
            "failed" => Ok(TestStatus::Failed),
            "timedOut" => Ok(TestStatus::TimedOut),
            "skipped" => Ok(TestStatus::Skipped),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Record of one execution attempt of a test.
///
/// The execution layer appends one of these to the test's result list per
/// attempt; retries append further records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub status: TestStatus,
    pub duration: Duration,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl TestResult {
    pub fn passed(duration: Duration) -> Self {
        Self {
            status: TestStatus::Passed,
            duration,
            error: None,
            started_at: Utc::now(),
        }
    }

    pub fn failed(duration: Duration, error: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Failed,
            duration,
            error: Some(error.into()),
            started_at: Utc::now(),
        }
    }
}

/// Lifecycle hook registration points.
///
/// The suite model stores hooks in registration order; running them (and
/// ordering them across nested suites) is the execution layer's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::AfterAll => "afterAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
        };
        write!(f, "{}", name)
    }
}
