//! Pipeline Coordinator: the state machine that drives one execution
//! through validate → generate → run → parse → complete → publish, passing
//! the caller's `CancellationToken` through to the sandbox step.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{Value as Json, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::doctest_parser::parse_doctest_output;
use crate::error::{CoreError, ErrorKind};
use crate::event::EventPublisher;
use crate::harness::HarnessGenerator;
use crate::json::{sanitize_array, sanitize_object, step_metadata};
use crate::model::{
    Execution, ExecutionMetricsEvent, ExecutionRequest, ExecutionStep, GeneratedHarness, Status,
    StepStatus, TestCase, TestResult,
};
use crate::parser::parse_function;
use crate::repository::{ExecutionRepository, GeneratedHarnessRepository, TestResultRepository};
use crate::sandbox::{Sandbox, SandboxProvider, SandboxRequest, SandboxResources};

/// Final, user-facing outcome of one execution (minus the wire-only
/// `metadata`/`pipeline_steps` fields, which a thin API layer can derive
/// from the repositories).
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub execution_id: String,
    pub success: bool,
    pub message: String,
    pub approved_test_ids: Vec<String>,
}

/// Tracks one step's identity and start time from `start_step` through
/// whichever of `complete_step`/`fail_step` closes it out, so the row
/// written to the repository is the same row the whole way and its
/// `duration_ms` reflects real elapsed time rather than a zero placeholder.
struct StepTimer {
    id: String,
    name: &'static str,
    order: u32,
    started_at: DateTime<Utc>,
    instant: Instant,
}

fn start_step(name: &'static str, order: u32) -> StepTimer {
    StepTimer {
        id: Uuid::new_v4().to_string(),
        name,
        order,
        started_at: Utc::now(),
        instant: Instant::now(),
    }
}

pub struct Coordinator<P: SandboxProvider> {
    executions: Arc<dyn ExecutionRepository>,
    harnesses: Arc<dyn GeneratedHarnessRepository>,
    test_results: Arc<dyn TestResultRepository>,
    events: Arc<dyn EventPublisher>,
    harness_generator: Arc<dyn HarnessGenerator + Send + Sync>,
    sandbox_provider: P,
    server_instance: String,
}

impl<P: SandboxProvider> Coordinator<P> {
    pub fn new(
        executions: Arc<dyn ExecutionRepository>,
        harnesses: Arc<dyn GeneratedHarnessRepository>,
        test_results: Arc<dyn TestResultRepository>,
        events: Arc<dyn EventPublisher>,
        harness_generator: Arc<dyn HarnessGenerator + Send + Sync>,
        sandbox_provider: P,
        server_instance: impl Into<String>,
    ) -> Self {
        Self {
            executions,
            harnesses,
            test_results,
            events,
            harness_generator,
            sandbox_provider,
            server_instance: server_instance.into(),
        }
    }

    /// Drives one request through all six steps: validate, generate harness,
    /// run sandbox, parse results, complete execution, publish event.
    pub async fn run(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<PipelineOutcome, CoreError> {
        let execution_id = Uuid::new_v4().to_string();

        // Step 1: validate. Rejected requests write no row at all.
        let validate_timer = start_step("validate", 0);
        if let Err(reason) = validate_request(&request) {
            return Ok(PipelineOutcome {
                execution_id,
                success: false,
                message: reason,
                approved_test_ids: Vec::new(),
            });
        }

        let valid_cases: Vec<TestCase> = request
            .test_cases
            .iter()
            .filter(|tc| tc.is_valid())
            .cloned()
            .collect();
        let skipped = request.test_cases.len() - valid_cases.len();
        if skipped > 0 {
            tracing::warn!(execution_id = %execution_id, skipped, "dropped invalid test cases");
        }

        // The execution row is inserted PENDING before any work, then flipped
        // to RUNNING once validation (step 1) is recorded.
        let mut execution = new_execution(&execution_id, &request, &self.server_instance);
        self.executions.insert(&execution).await?;
        self.complete_step(
            &execution_id,
            validate_timer,
            step_metadata(&[
                ("valid_test_case_count", json!(valid_cases.len())),
                ("skipped_test_case_count", json!(skipped)),
            ]),
        )
        .await?;

        execution.status = Status::Running;
        execution.updated_at = Utc::now();
        self.executions.update(&execution).await?;

        let mut step_order = 1u32;

        // Step 2: generate harness.
        let generate_timer = start_step("generate_harness", step_order);
        step_order += 1;
        let gen_started = Instant::now();
        let generation = parse_function(&request.code).and_then(|function_info| {
            self.harness_generator
                .generate(&request.code, &valid_cases, &function_info)
        });
        match generation {
            Err(e) => {
                self.fail_step(&execution_id, generate_timer, &e.to_string())
                    .await?;
                return self
                    .complete_with_failure(
                        &mut execution,
                        Status::Failed,
                        ErrorKind::GenerationError,
                        &e.to_string(),
                        &valid_cases,
                    )
                    .await;
            }
            Ok((source_text, case_count)) => {
                let generation_time_ms = gen_started.elapsed().as_millis() as u64;
                let size_bytes = source_text.len();
                let harness = GeneratedHarness {
                    id: Uuid::new_v4().to_string(),
                    execution_id: execution_id.clone(),
                    language: request.language.clone(),
                    generator_kind: self.harness_generator.kind().to_string(),
                    source_text,
                    challenge_id: request.challenge_id.clone(),
                    test_case_count: case_count,
                    has_custom_validation: self.harness_generator.has_custom_validation(&valid_cases),
                    generation_time_ms,
                    size_bytes,
                    created_at: Utc::now(),
                };
                self.harnesses.insert(&harness).await?;
                self.complete_step(
                    &execution_id,
                    generate_timer,
                    step_metadata(&[
                        ("test_case_count", json!(harness.test_case_count)),
                        ("has_custom_validation", json!(harness.has_custom_validation)),
                    ]),
                )
                .await?;

                // Step 3: run sandbox.
                let run_timer = start_step("run_sandbox", step_order);
                step_order += 1;
                let sandbox_outcome = self
                    .run_sandbox(&execution_id, &request, &harness, cancel.clone())
                    .await;

                let sandbox_result = match sandbox_outcome {
                    Err(e) => {
                        self.fail_step(&execution_id, run_timer, &e.to_string())
                            .await?;
                        let kind = e.kind();
                        return self
                            .complete_with_failure(
                                &mut execution,
                                status_for_kind(kind),
                                kind,
                                &e.to_string(),
                                &valid_cases,
                            )
                            .await;
                    }
                    Ok(r) => r,
                };

                if sandbox_result.timed_out {
                    self.complete_step(
                        &execution_id,
                        run_timer,
                        step_metadata(&[("timed_out", json!(true))]),
                    )
                    .await?;
                    return self
                        .complete_with_failure(
                            &mut execution,
                            Status::Timeout,
                            ErrorKind::Timeout,
                            "sandbox execution exceeded the configured timeout",
                            &valid_cases,
                        )
                        .await;
                }

                if sandbox_result.exit_code != 0 && sandbox_result.stdout.trim().is_empty() {
                    self.complete_step(
                        &execution_id,
                        run_timer,
                        step_metadata(&[("exit_code", json!(sandbox_result.exit_code))]),
                    )
                    .await?;
                    execution.runtime_error = Some(sandbox_result.stderr.clone());
                    return self
                        .complete_with_failure(
                            &mut execution,
                            Status::Failed,
                            ErrorKind::RuntimeError,
                            &sandbox_result.stderr,
                            &valid_cases,
                        )
                        .await;
                }

                self.complete_step(
                    &execution_id,
                    run_timer,
                    step_metadata(&[
                        ("exit_code", json!(sandbox_result.exit_code)),
                        ("wall_time_ms", json!(sandbox_result.wall_time_ms)),
                    ]),
                )
                .await?;

                // Step 4: parse results.
                let parse_timer = start_step("parse_results", step_order);
                step_order += 1;
                let requested_ids: Vec<String> =
                    valid_cases.iter().map(|tc| tc.test_id.clone()).collect();
                let combined_output = format!("{}\n{}", sandbox_result.stdout, sandbox_result.stderr);
                let parsed = parse_doctest_output(
                    &combined_output,
                    &requested_ids,
                    sandbox_result.wall_time_ms,
                );

                let test_results = match parsed {
                    Err(e) => {
                        self.fail_step(&execution_id, parse_timer, &e.to_string())
                            .await?;
                        execution.runtime_error = Some(combined_output);
                        return self
                            .complete_with_failure(
                                &mut execution,
                                Status::Failed,
                                ErrorKind::ParseError,
                                &e.to_string(),
                                &valid_cases,
                            )
                            .await;
                    }
                    Ok(results) => results,
                };

                self.complete_step(
                    &execution_id,
                    parse_timer,
                    step_metadata(&[("parsed_count", json!(test_results.len()))]),
                )
                .await?;

                // Step 5: complete execution.
                let complete_timer = start_step("complete_execution", step_order);
                step_order += 1;
                let mut approved_test_ids = Vec::new();
                let mut failed_test_ids = Vec::new();
                for r in &test_results {
                    if r.passed {
                        approved_test_ids.push(r.test_id.clone());
                    } else {
                        failed_test_ids.push(r.test_id.clone());
                    }
                }

                execution.status = Status::Completed;
                execution.total_tests = test_results.len();
                execution.passed_tests = approved_test_ids.len();
                execution.approved_test_ids = approved_test_ids.clone();
                execution.failed_test_ids = failed_test_ids;
                execution.execution_time_ms = sandbox_result.wall_time_ms;
                execution.memory_used_mb = sandbox_result.memory_peak_mb;
                execution.message = summary_message(&execution);
                execution.recompute_success();
                execution.updated_at = Utc::now();

                self.executions.update(&execution).await?;
                self.test_results.insert_all(&execution_id, &test_results).await?;
                self.complete_step(
                    &execution_id,
                    complete_timer,
                    step_metadata(&[
                        ("success", json!(execution.success)),
                        ("approved_test_ids", sanitize_array(Some(&execution.approved_test_ids))),
                        ("failed_test_ids", sanitize_array(Some(&execution.failed_test_ids))),
                    ]),
                )
                .await?;

                // Step 6: publish event.
                let publish_timer = start_step("publish_event", step_order);
                let mut event = ExecutionMetricsEvent::from(&execution);
                event.test_results = test_results;
                if let Err(e) = self.events.publish(&event).await {
                    tracing::warn!(execution_id = %execution_id, error = %e, "event publish failed");
                    self.fail_step(&execution_id, publish_timer, &e.to_string())
                        .await?;
                } else {
                    self.complete_step(&execution_id, publish_timer, json!({}))
                        .await?;
                }

                Ok(PipelineOutcome {
                    execution_id,
                    success: execution.success,
                    message: execution.message,
                    approved_test_ids: execution.approved_test_ids,
                })
            }
        }
    }

    async fn run_sandbox(
        &self,
        execution_id: &str,
        request: &ExecutionRequest,
        harness: &GeneratedHarness,
        cancel: CancellationToken,
    ) -> Result<crate::sandbox::SandboxResult, CoreError> {
        let config = request.config.clone().unwrap_or_default();
        let sandbox = self.sandbox_provider.create_sandbox(execution_id).await?;
        let sandbox_request = SandboxRequest {
            execution_id: execution_id.to_string(),
            file_name: self.harness_generator.file_name().to_string(),
            source_text: harness.source_text.clone(),
            build_command: self.harness_generator.build_command().to_string(),
            resources: SandboxResources {
                memory_limit_mb: config.memory_limit_mb,
                cpu_limit: crate::model::DEFAULT_CPU_LIMIT,
                timeout_seconds: config.timeout_seconds,
                enable_network: config.enable_network,
                environment_variables: config.environment_variables,
            },
        };
        sandbox.run(&sandbox_request, cancel).await
    }

    async fn complete_step(
        &self,
        execution_id: &str,
        timer: StepTimer,
        metadata: Json,
    ) -> Result<(), CoreError> {
        let duration_ms = timer.instant.elapsed().as_millis() as u64;
        let step = ExecutionStep {
            id: timer.id,
            execution_id: execution_id.to_string(),
            step_name: timer.name.to_string(),
            step_order: timer.order,
            status: StepStatus::Completed,
            started_at: Some(timer.started_at),
            completed_at: Some(Utc::now()),
            duration_ms: Some(duration_ms),
            error_message: None,
            metadata,
        };
        self.executions.insert_step(&step).await
    }

    async fn fail_step(
        &self,
        execution_id: &str,
        timer: StepTimer,
        error_message: &str,
    ) -> Result<(), CoreError> {
        let duration_ms = timer.instant.elapsed().as_millis() as u64;
        let step = ExecutionStep {
            id: timer.id,
            execution_id: execution_id.to_string(),
            step_name: timer.name.to_string(),
            step_order: timer.order,
            status: StepStatus::Failed,
            started_at: Some(timer.started_at),
            completed_at: Some(Utc::now()),
            duration_ms: Some(duration_ms),
            error_message: Some(error_message.to_string()),
            metadata: sanitize_object(Some(error_message)),
        };
        self.executions.insert_step(&step).await
    }

    async fn complete_with_failure(
        &self,
        execution: &mut Execution,
        status: Status,
        error_kind: ErrorKind,
        message: &str,
        valid_cases: &[TestCase],
    ) -> Result<PipelineOutcome, CoreError> {
        execution.status = status;
        execution.error_kind = Some(error_kind);
        execution.error_message = Some(message.to_string());
        execution.message = message.to_string();
        execution.total_tests = valid_cases.len();
        execution.failed_test_ids = valid_cases.iter().map(|tc| tc.test_id.clone()).collect();
        execution.approved_test_ids = Vec::new();
        execution.passed_tests = 0;
        execution.recompute_success();
        execution.updated_at = Utc::now();

        self.executions.update(execution).await?;

        let results: Vec<TestResult> = valid_cases
            .iter()
            .map(|tc| TestResult {
                test_id: tc.test_id.clone(),
                passed: false,
                expected_output: tc.expected_output.clone(),
                actual_output: None,
                error_message: Some(message.to_string()),
                execution_time_ms: execution.execution_time_ms,
            })
            .collect();
        self.test_results.insert_all(&execution.id, &results).await?;

        let mut event = ExecutionMetricsEvent::from(&*execution);
        event.test_results = results;
        if let Err(e) = self.events.publish(&event).await {
            tracing::warn!(execution_id = %execution.id, error = %e, "event publish failed");
        }

        Ok(PipelineOutcome {
            execution_id: execution.id.clone(),
            success: false,
            message: execution.message.clone(),
            approved_test_ids: Vec::new(),
        })
    }
}

fn validate_request(request: &ExecutionRequest) -> Result<(), String> {
    if request.language != "cpp" {
        return Err(format!("unsupported language '{}'", request.language));
    }
    if request.code.trim().is_empty() {
        return Err("submitted code is empty".to_string());
    }
    if request.code.len() > crate::model::MAX_CODE_BYTES {
        return Err("submitted code exceeds the maximum allowed size".to_string());
    }
    if let Some(config) = &request.config {
        config.validate()?;
    }
    Ok(())
}

fn new_execution(execution_id: &str, request: &ExecutionRequest, server_instance: &str) -> Execution {
    let now = Utc::now();
    Execution {
        id: execution_id.to_string(),
        solution_id: request.solution_id.clone(),
        challenge_id: request.challenge_id.clone(),
        student_id: request.student_id.clone(),
        language: request.language.clone(),
        status: Status::Pending,
        code: request.code.clone(),
        execution_time_ms: 0,
        memory_used_mb: None,
        success: false,
        message: String::new(),
        approved_test_ids: Vec::new(),
        failed_test_ids: Vec::new(),
        total_tests: 0,
        passed_tests: 0,
        error_message: None,
        error_kind: None,
        compilation_error: None,
        runtime_error: None,
        server_instance: server_instance.to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn status_for_kind(kind: ErrorKind) -> Status {
    match kind {
        ErrorKind::Timeout => Status::Timeout,
        ErrorKind::Cancelled => Status::Cancelled,
        _ => Status::Failed,
    }
}

fn summary_message(execution: &Execution) -> String {
    if execution.success {
        format!("all {} test case(s) passed", execution.total_tests)
    } else if execution.total_tests == 0 {
        "no valid test cases were submitted".to_string()
    } else {
        format!(
            "{} of {} test case(s) passed",
            execution.passed_tests, execution.total_tests
        )
    }
}
