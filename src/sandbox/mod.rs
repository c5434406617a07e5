//! Sandbox Runner: executes one generated harness in an isolated,
//! resource-bounded container.
//!
//! The contract is split into two traits, mirroring the provider/sandbox
//! split used elsewhere for pluggable execution backends: [`SandboxProvider`]
//! provisions a per-execution [`Sandbox`] bound to a working directory;
//! [`Sandbox::run`] builds and runs the harness exactly once and tears the
//! container down before returning. There is no reuse across calls — two
//! calls sharing an execution ID are a programming error.

pub mod docker;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CoreResult;

/// Per-request resource and environment overrides, derived from `ExecutionConfig`.
#[derive(Debug, Clone)]
pub struct SandboxResources {
    pub memory_limit_mb: u64,
    pub cpu_limit: f64,
    pub timeout_seconds: u64,
    pub enable_network: bool,
    pub environment_variables: HashMap<String, String>,
}

/// Everything the sandbox needs to build and run one harness.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub execution_id: String,
    pub file_name: String,
    pub source_text: String,
    pub build_command: String,
    pub resources: SandboxResources,
}

/// `{ exit_code, stdout, stderr, wall_time_ms, memory_peak_mb?, timed_out }`.
#[derive(Debug, Clone)]
pub struct SandboxResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub wall_time_ms: u64,
    /// Always `None`: measuring this would need a second long-lived polling
    /// task per execution against the container's cgroup stats, which isn't
    /// worth it for a single numeric field nothing downstream consumes yet.
    pub memory_peak_mb: Option<u64>,
    pub timed_out: bool,
}

/// A provisioned, single-use sandbox bound to one execution's working directory.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Writes the source, ensures the image exists, creates and starts the
    /// container, waits for completion/timeout/cancellation, then removes
    /// the container (best-effort) before returning.
    async fn run(
        &self,
        request: &SandboxRequest,
        cancel: CancellationToken,
    ) -> CoreResult<SandboxResult>;
}

/// Factory that provisions a [`Sandbox`] for a single execution.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    type Sandbox: Sandbox;

    /// Computes the per-execution working directory and binds a sandbox to it.
    /// Does not start a container; [`Sandbox::run`] does that.
    async fn create_sandbox(&self, execution_id: &str) -> CoreResult<Self::Sandbox>;
}
