//! Docker-backed [`Sandbox`]/[`SandboxProvider`].
//!
//! One container per call, never reused: a container is created, started,
//! waited on (racing the configured timeout and the caller's cancellation
//! token), and removed — in that order, every time.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::BuildImageOptions;
use bollard::models::HostConfig;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

use super::{Sandbox, SandboxProvider, SandboxRequest, SandboxResult};

/// Docker image tag and on-disk build context per supported language.
/// Only C++ is wired up; a second language adds an entry here and a
/// matching [`super::super::harness::HarnessGenerator`].
fn image_for(file_name: &str) -> &'static str {
    if file_name.ends_with(".cpp") {
        "codecheck-cpp:latest"
    } else {
        "codecheck-cpp:latest"
    }
}

fn build_context_for(file_name: &str) -> PathBuf {
    let _ = file_name;
    PathBuf::from("docker/cpp")
}

/// Root directory under which per-execution working directories are created.
/// Not deleted after execution — cleanup is an
/// external, operational concern, not this runner's.
const WORKING_DIR_ROOT: &str = "compiled_test_codes";

pub struct DockerProvider {
    docker: Docker,
}

impl DockerProvider {
    pub fn connect_local() -> Result<Self, CoreError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| CoreError::Infrastructure(format!("docker connect failed: {e}")))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl SandboxProvider for DockerProvider {
    type Sandbox = DockerSandbox;

    async fn create_sandbox(&self, execution_id: &str) -> crate::error::CoreResult<DockerSandbox> {
        let working_dir = PathBuf::from(WORKING_DIR_ROOT).join(execution_id);
        tokio::fs::create_dir_all(&working_dir)
            .await
            .map_err(|e| CoreError::Infrastructure(format!("create working dir: {e}")))?;

        Ok(DockerSandbox {
            docker: self.docker.clone(),
            execution_id: execution_id.to_string(),
            working_dir,
        })
    }
}

pub struct DockerSandbox {
    docker: Docker,
    execution_id: String,
    working_dir: PathBuf,
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn run(
        &self,
        request: &SandboxRequest,
        cancel: CancellationToken,
    ) -> crate::error::CoreResult<SandboxResult> {
        let source_path = self.working_dir.join(&request.file_name);
        tokio::fs::write(&source_path, &request.source_text)
            .await
            .map_err(|e| CoreError::Infrastructure(format!("write source: {e}")))?;

        let image = image_for(&request.file_name);
        self.ensure_image(image).await?;

        let container_name = format!("codecheck-{}", self.execution_id);
        let container_id = self
            .create_container(&container_name, image, request)
            .await?;

        let run_result = self
            .wait_for_completion(&container_id, request.resources.timeout_seconds, cancel)
            .await;

        self.remove_container(&container_id).await;

        run_result
    }
}

impl DockerSandbox {
    async fn ensure_image(&self, image: &str) -> crate::error::CoreResult<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        let context = build_context_for(image);
        let tar_data = build_context_tar(&context)
            .map_err(|e| CoreError::Infrastructure(format!("read build context: {e}")))?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: image.to_string(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(tar_data.into()));
        while let Some(chunk) = stream.next().await {
            chunk.map_err(|e| CoreError::Infrastructure(format!("image build failed: {e}")))?;
        }
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        image: &str,
        request: &SandboxRequest,
    ) -> crate::error::CoreResult<String> {
        let env: Vec<String> = request
            .resources
            .environment_variables
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let bind = format!(
            "{}:/workspace:rw",
            self.working_dir
                .canonicalize()
                .unwrap_or_else(|_| self.working_dir.clone())
                .to_string_lossy()
        );

        let host_config = HostConfig {
            binds: Some(vec![bind]),
            network_mode: Some(if request.resources.enable_network {
                "bridge".to_string()
            } else {
                "none".to_string()
            }),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            memory: Some((request.resources.memory_limit_mb * 1024 * 1024) as i64),
            memory_swap: Some((request.resources.memory_limit_mb * 1024 * 1024) as i64),
            cpu_period: Some(100_000),
            cpu_quota: Some((request.resources.cpu_limit * 100_000.0) as i64),
            ..Default::default()
        };

        let config = ContainerConfig {
            image: Some(image.to_string()),
            env: Some(env),
            working_dir: Some("/workspace".to_string()),
            host_config: Some(host_config),
            cmd: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                request.build_command.clone(),
            ]),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name,
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| CoreError::Infrastructure(format!("create container: {e}")))?;

        self.docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| CoreError::Infrastructure(format!("start container: {e}")))?;

        Ok(response.id)
    }

    async fn wait_for_completion(
        &self,
        container_id: &str,
        timeout_seconds: u64,
        cancel: CancellationToken,
    ) -> crate::error::CoreResult<SandboxResult> {
        let started = Instant::now();
        let mut wait_stream = self.docker.wait_container(
            container_id,
            None::<WaitContainerOptions<String>>,
        );

        tokio::select! {
            outcome = wait_stream.next() => {
                let exit_code = match outcome {
                    Some(Ok(response)) => response.status_code as i32,
                    Some(Err(e)) => {
                        return Err(CoreError::Infrastructure(format!("wait container: {e}")));
                    }
                    None => 0,
                };
                let (stdout, stderr) = self.collect_logs(container_id).await?;
                Ok(SandboxResult {
                    exit_code,
                    stdout,
                    stderr,
                    wall_time_ms: started.elapsed().as_millis() as u64,
                    memory_peak_mb: None,
                    timed_out: false,
                })
            }
            _ = tokio::time::sleep(std::time::Duration::from_secs(timeout_seconds)) => {
                let (stdout, stderr) = self.collect_logs(container_id).await.unwrap_or_default();
                Ok(SandboxResult {
                    exit_code: -1,
                    stdout,
                    stderr,
                    wall_time_ms: started.elapsed().as_millis() as u64,
                    memory_peak_mb: None,
                    timed_out: true,
                })
            }
            _ = cancel.cancelled() => {
                Err(CoreError::Cancelled)
            }
        }
    }

    async fn collect_logs(&self, container_id: &str) -> crate::error::CoreResult<(String, String)> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(container_id, Some(options));
        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(CoreError::Infrastructure(format!("read logs: {e}")));
                }
            }
        }
        Ok((stdout, stderr))
    }

    async fn remove_container(&self, container_id: &str) {
        let _ = self
            .docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;
    }
}

fn build_context_tar(dir: &std::path::Path) -> std::io::Result<Vec<u8>> {
    let mut archive = tar::Builder::new(Vec::new());
    if dir.is_dir() {
        archive.append_dir_all(".", dir)?;
    }
    archive.into_inner()
}
