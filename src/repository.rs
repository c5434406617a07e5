//! Persistence through narrow repositories.
//!
//! Each entity gets a single-purpose async trait rather than one fat "store"
//! interface — one seam per concern, `Send + Sync`, swappable. The
//! in-memory implementations hold their rows behind a `Mutex<HashMap<..>>`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::model::{Execution, ExecutionStep, GeneratedHarness, TestResult};

#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn insert(&self, execution: &Execution) -> CoreResult<()>;
    async fn update(&self, execution: &Execution) -> CoreResult<()>;
    async fn get(&self, execution_id: &str) -> CoreResult<Option<Execution>>;
    async fn insert_step(&self, step: &ExecutionStep) -> CoreResult<()>;
    async fn steps_for(&self, execution_id: &str) -> CoreResult<Vec<ExecutionStep>>;
}

#[async_trait]
pub trait GeneratedHarnessRepository: Send + Sync {
    async fn insert(&self, harness: &GeneratedHarness) -> CoreResult<()>;
    async fn get_for_execution(&self, execution_id: &str) -> CoreResult<Option<GeneratedHarness>>;
}

#[async_trait]
pub trait TestResultRepository: Send + Sync {
    async fn insert_all(&self, execution_id: &str, results: &[TestResult]) -> CoreResult<()>;
    async fn get_for_execution(&self, execution_id: &str) -> CoreResult<Vec<TestResult>>;
}

#[derive(Default)]
pub struct InMemoryExecutionRepository {
    executions: Mutex<HashMap<String, Execution>>,
    steps: Mutex<HashMap<String, Vec<ExecutionStep>>>,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn insert(&self, execution: &Execution) -> CoreResult<()> {
        self.executions
            .lock()
            .expect("execution repository mutex poisoned")
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn update(&self, execution: &Execution) -> CoreResult<()> {
        self.executions
            .lock()
            .expect("execution repository mutex poisoned")
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> CoreResult<Option<Execution>> {
        Ok(self
            .executions
            .lock()
            .expect("execution repository mutex poisoned")
            .get(execution_id)
            .cloned())
    }

    async fn insert_step(&self, step: &ExecutionStep) -> CoreResult<()> {
        self.steps
            .lock()
            .expect("execution repository mutex poisoned")
            .entry(step.execution_id.clone())
            .or_default()
            .push(step.clone());
        Ok(())
    }

    async fn steps_for(&self, execution_id: &str) -> CoreResult<Vec<ExecutionStep>> {
        Ok(self
            .steps
            .lock()
            .expect("execution repository mutex poisoned")
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryHarnessRepository {
    harnesses: Mutex<HashMap<String, GeneratedHarness>>,
}

impl InMemoryHarnessRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeneratedHarnessRepository for InMemoryHarnessRepository {
    async fn insert(&self, harness: &GeneratedHarness) -> CoreResult<()> {
        self.harnesses
            .lock()
            .expect("harness repository mutex poisoned")
            .insert(harness.execution_id.clone(), harness.clone());
        Ok(())
    }

    async fn get_for_execution(&self, execution_id: &str) -> CoreResult<Option<GeneratedHarness>> {
        Ok(self
            .harnesses
            .lock()
            .expect("harness repository mutex poisoned")
            .get(execution_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTestResultRepository {
    results: Mutex<HashMap<String, Vec<TestResult>>>,
}

impl InMemoryTestResultRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TestResultRepository for InMemoryTestResultRepository {
    async fn insert_all(&self, execution_id: &str, results: &[TestResult]) -> CoreResult<()> {
        self.results
            .lock()
            .expect("test result repository mutex poisoned")
            .insert(execution_id.to_string(), results.to_vec());
        Ok(())
    }

    async fn get_for_execution(&self, execution_id: &str) -> CoreResult<Vec<TestResult>> {
        Ok(self
            .results
            .lock()
            .expect("test result repository mutex poisoned")
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepStatus;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    fn sample_execution(id: &str) -> Execution {
        Execution {
            id: id.to_string(),
            solution_id: "s1".into(),
            challenge_id: "c1".into(),
            student_id: "u1".into(),
            language: "cpp".into(),
            status: crate::model::Status::Pending,
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
            created_at: now(),
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let repo = InMemoryExecutionRepository::new();
        let exec = sample_execution("e1");
        repo.insert(&exec).await.unwrap();
        let fetched = repo.get("e1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "e1");
    }

    #[tokio::test]
    async fn get_missing_execution_is_none() {
        let repo = InMemoryExecutionRepository::new();
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn steps_accumulate_in_insertion_order() {
        let repo = InMemoryExecutionRepository::new();
        for (i, name) in ["validate", "generate"].iter().enumerate() {
            let step = ExecutionStep {
                id: format!("step{i}"),
                execution_id: "e1".into(),
                step_name: (*name).to_string(),
                step_order: i as u32,
                status: StepStatus::Completed,
                started_at: Some(now()),
                completed_at: Some(now()),
                duration_ms: Some(1),
                error_message: None,
                metadata: json!({}),
            };
            repo.insert_step(&step).await.unwrap();
        }
        let steps = repo.steps_for("e1").await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_name, "validate");
        assert_eq!(steps[1].step_name, "generate");
    }

    #[tokio::test]
    async fn harness_repository_round_trips() {
        let repo = InMemoryHarnessRepository::new();
        let harness = GeneratedHarness {
            id: "h1".into(),
            execution_id: "e1".into(),
            language: "cpp".into(),
            generator_kind: "cpp_doctest".into(),
            source_text: "// ...".into(),
            challenge_id: "c1".into(),
            test_case_count: 1,
            has_custom_validation: false,
            generation_time_ms: 1,
            size_bytes: 10,
            created_at: now(),
        };
        repo.insert(&harness).await.unwrap();
        assert!(repo.get_for_execution("e1").await.unwrap().is_some());
        assert!(repo.get_for_execution("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_result_repository_round_trips() {
        let repo = InMemoryTestResultRepository::new();
        let results = vec![TestResult {
            test_id: "t1".into(),
            passed: true,
            expected_output: None,
            actual_output: None,
            error_message: None,
            execution_time_ms: 1,
        }];
        repo.insert_all("e1", &results).await.unwrap();
        assert_eq!(repo.get_for_execution("e1").await.unwrap().len(), 1);
    }
}
