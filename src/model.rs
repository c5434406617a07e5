//! Data model for the evaluation pipeline.
//!
//! Semantic types only — field ordering here is design-level, not a schema
//! definition for any particular storage engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::ErrorKind;

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
/// Hard cap on per-request timeout, in seconds.
pub const MAX_TIMEOUT_SECONDS: u64 = 300;
/// Default container memory limit, in MB.
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 256;
/// Hard cap on per-request memory limit, in MB.
pub const MAX_MEMORY_LIMIT_MB: u64 = 2048;
/// Default CPU allotment, in vCPUs.
pub const DEFAULT_CPU_LIMIT: f64 = 0.5;
/// Maximum accepted size of submitted source, in bytes.
pub const MAX_CODE_BYTES: usize = 10 * 1024 * 1024;

/// Environment variable names (or substrings) rejected by [`ExecutionConfig::validate`].
const ENV_DENY_EXACT: &[&str] = &["PATH", "LD_LIBRARY_PATH", "HOME", "USER", "SHELL"];
const ENV_DENY_SUBSTRING: &[&str] = &["PASSWORD", "SECRET"];
const ENV_DENY_CLOUD_CREDENTIALS: &[&str] = &[
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "GOOGLE_APPLICATION_CREDENTIALS",
    "AZURE_CLIENT_SECRET",
];

/// Per-request overrides for sandbox resource limits and behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default)]
    pub enable_network: bool,
    #[serde(default)]
    pub environment_variables: HashMap<String, String>,
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_memory_limit_mb() -> u64 {
    DEFAULT_MEMORY_LIMIT_MB
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            enable_network: false,
            environment_variables: HashMap::new(),
            debug_mode: false,
        }
    }
}

impl ExecutionConfig {
    /// Validates caps and the environment-variable deny list.
    ///
    /// Returns a human-readable reason on the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(format!(
                "timeout_seconds must be in 1..={MAX_TIMEOUT_SECONDS}, got {}",
                self.timeout_seconds
            ));
        }
        if self.memory_limit_mb == 0 || self.memory_limit_mb > MAX_MEMORY_LIMIT_MB {
            return Err(format!(
                "memory_limit_mb must be in 1..={MAX_MEMORY_LIMIT_MB}, got {}",
                self.memory_limit_mb
            ));
        }
        for name in self.environment_variables.keys() {
            if is_denied_env_var(name) {
                return Err(format!("environment variable '{name}' is not permitted"));
            }
        }
        Ok(())
    }
}

fn is_denied_env_var(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    ENV_DENY_EXACT.contains(&upper.as_str())
        || ENV_DENY_CLOUD_CREDENTIALS.contains(&upper.as_str())
        || ENV_DENY_SUBSTRING.iter().any(|needle| upper.contains(needle))
}

/// An input/expected-output pair or a block of custom validation code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub custom_validation_code: Option<String>,
}

impl TestCase {
    /// A case is valid iff it has (input ∧ expected_output) or custom validation code.
    pub fn is_valid(&self) -> bool {
        self.custom_validation_code
            .as_ref()
            .is_some_and(|c| !c.trim().is_empty())
            || (self.input.is_some() && self.expected_output.is_some())
    }
}

/// An evaluation request for one submission against a set of test cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub solution_id: String,
    pub challenge_id: String,
    pub code_version_id: String,
    pub student_id: String,
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub config: Option<ExecutionConfig>,
}

/// `(name, return_type)` derived from the submitted code by the Function Parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub return_type: String,
}

/// The synthesized harness source, persisted once per execution, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedHarness {
    pub id: String,
    pub execution_id: String,
    pub language: String,
    pub generator_kind: String,
    pub source_text: String,
    pub challenge_id: String,
    pub test_case_count: usize,
    pub has_custom_validation: bool,
    pub generation_time_ms: u64,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
}

/// The execution state machine. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Completed | Status::Failed | Status::Timeout | Status::Cancelled
        )
    }
}

/// The record of record for one evaluation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub solution_id: String,
    pub challenge_id: String,
    pub student_id: String,
    pub language: String,
    pub status: Status,
    pub code: String,
    pub execution_time_ms: u64,
    pub memory_used_mb: Option<u64>,
    pub success: bool,
    pub message: String,
    pub approved_test_ids: Vec<String>,
    pub failed_test_ids: Vec<String>,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub compilation_error: Option<String>,
    pub runtime_error: Option<String>,
    pub server_instance: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    /// `success ⇔ (total_tests > 0) ∧ (failed_tests = 0) ∧ (status = COMPLETED)`.
    pub fn recompute_success(&mut self) {
        self.success = self.total_tests > 0
            && self.failed_test_ids.is_empty()
            && self.status == Status::Completed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One step of the pipeline's per-execution timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub id: String,
    pub execution_id: String,
    pub step_name: String,
    pub step_order: u32,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    /// Always valid JSON; `{}` when the producer has nothing to say.
    pub metadata: Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: String,
    pub execution_id: String,
    pub level: LogLevel,
    pub message: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-test outcome, both persisted and returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub passed: bool,
    pub expected_output: Option<String>,
    pub actual_output: Option<String>,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
}

/// De-normalized view of a completed (or failed) Execution, published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetricsEvent {
    pub execution_id: String,
    pub success: bool,
    pub status: Status,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub error_kind: Option<ErrorKind>,
    pub test_results: Vec<TestResult>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Execution> for ExecutionMetricsEvent {
    fn from(e: &Execution) -> Self {
        Self {
            execution_id: e.id.clone(),
            success: e.success,
            status: e.status,
            total_tests: e.total_tests,
            passed_tests: e.passed_tests,
            error_kind: e.error_kind,
            test_results: Vec::new(),
            message: e.message.clone(),
            created_at: e.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_requires_io_pair_or_custom_validation() {
        let valid_io = TestCase {
            test_id: "t1".into(),
            input: Some("1".into()),
            expected_output: Some("2".into()),
            custom_validation_code: None,
        };
        assert!(valid_io.is_valid());

        let valid_custom = TestCase {
            test_id: "t2".into(),
            input: None,
            expected_output: None,
            custom_validation_code: Some("CHECK(true);".into()),
        };
        assert!(valid_custom.is_valid());

        let invalid = TestCase {
            test_id: "t3".into(),
            input: Some("1".into()),
            expected_output: None,
            custom_validation_code: None,
        };
        assert!(!invalid.is_valid());
    }

    #[test]
    fn config_validate_rejects_timeout_over_cap() {
        let cfg = ExecutionConfig {
            timeout_seconds: 301,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_validate_rejects_memory_over_cap() {
        let cfg = ExecutionConfig {
            memory_limit_mb: 4096,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_validate_rejects_denylisted_env_vars() {
        for name in ["PATH", "AWS_SECRET_ACCESS_KEY", "MY_PASSWORD", "db_secret"] {
            let mut cfg = ExecutionConfig::default();
            cfg.environment_variables.insert(name.to_string(), "x".into());
            assert!(cfg.validate().is_err(), "{name} should be denied");
        }
    }

    #[test]
    fn config_validate_accepts_ordinary_env_vars() {
        let mut cfg = ExecutionConfig::default();
        cfg.environment_variables
            .insert("DEBUG_LEVEL".to_string(), "1".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn recompute_success_requires_completed_and_no_failures() {
        let mut exec = sample_execution();
        exec.status = Status::Completed;
        exec.total_tests = 2;
        exec.failed_test_ids = vec![];
        exec.recompute_success();
        assert!(exec.success);

        exec.failed_test_ids = vec!["t2".into()];
        exec.recompute_success();
        assert!(!exec.success);
    }

    #[test]
    fn recompute_success_false_when_zero_tests() {
        let mut exec = sample_execution();
        exec.status = Status::Completed;
        exec.total_tests = 0;
        exec.recompute_success();
        assert!(!exec.success);
    }

    fn sample_execution() -> Execution {
        let now = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        Execution {
            id: "e1".into(),
            solution_id: "s1".into(),
            challenge_id: "c1".into(),
            student_id: "u1".into(),
            language: "cpp".into(),
            status: Status::Pending,
            code: String::new(),
            execution_time_ms: 0,
            memory_used_mb: None,
            success: false,
            message: String::new(),
            approved_test_ids: vec![],
            failed_test_ids: vec![],
            total_tests: 0,
            passed_tests: 0,
            error_message: None,
            error_kind: None,
            compilation_error: None,
            runtime_error: None,
            server_instance: "test".into(),
            created_at: now,
            updated_at: now,
        }
    }
}
