//! # codecheck
//!
//! A sandboxed code-evaluation engine: given a submitted function and a set
//! of test cases, it generates a C++/doctest harness, runs it in an
//! isolated, resource-bounded container, and reconciles the framework's
//! textual output back into per-test results.
//!
//! ## Architecture
//!
//! ```text
//! ExecutionRequest
//!      │
//!      ▼
//! parser::parse_function ──► harness::HarnessGenerator ──► sandbox::Sandbox
//!
//!                                                                 │
//!                                                                 ▼
//!                                                    doctest_parser
//!                                                                 │
//!                                                                 ▼
//!                                                repository + event
//! ```
//!
//! [`pipeline::Coordinator`] ties all of the above together into the
//! validate → generate → run → parse → complete → publish state machine.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use codecheck::event::LoggingPublisher;
//! use codecheck::harness::cpp::CppDoctestGenerator;
//! use codecheck::pipeline::Coordinator;
//! use codecheck::repository::{
//!     InMemoryExecutionRepository, InMemoryHarnessRepository, InMemoryTestResultRepository,
//! };
//! use codecheck::sandbox::docker::DockerProvider;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(request: codecheck::model::ExecutionRequest) -> anyhow::Result<()> {
//! let coordinator = Coordinator::new(
//!     Arc::new(InMemoryExecutionRepository::new()),
//!     Arc::new(InMemoryHarnessRepository::new()),
//!     Arc::new(InMemoryTestResultRepository::new()),
//!     Arc::new(LoggingPublisher),
//!     Arc::new(CppDoctestGenerator),
//!     DockerProvider::connect_local()?,
//!     "codecheck-0",
//! );
//! let outcome = coordinator.run(request, CancellationToken::new()).await?;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod doctest_parser;
pub mod error;
pub mod event;
pub mod harness;
pub mod json;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod repository;
pub mod sandbox;

pub use error::{CoreError, CoreResult, ErrorKind};
pub use model::{Execution, ExecutionRequest, Status, TestCase, TestResult};
pub use pipeline::{Coordinator, PipelineOutcome};
