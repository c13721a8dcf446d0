//! Docker tool for container lifecycle control
//!
//! Drives the `docker` CLI. Container ids and image names are validated
//! before they reach the command line.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

use super::bash::truncate_output;
use super::tool::{Tool, ToolResult};
use crate::llm::ToolInputSchema;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const MAX_OUTPUT_LENGTH: usize = 50000;
/// Default number of log lines returned by `logs`
const DEFAULT_LOG_TAIL: u32 = 200;

fn container_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("valid regex"))
}

fn image_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_.-]+(:[0-9]+)?(/[a-zA-Z0-9_.-]+)*(:[a-zA-Z0-9_.-]+)?$")
            .expect("valid regex")
    })
}

/// Whether `id` looks like a container id or name
pub fn is_valid_container_id(id: &str) -> bool {
    container_id_regex().is_match(id)
}

/// Whether `image` looks like `[registry/]name[:tag]`
pub fn is_valid_image_name(image: &str) -> bool {
    image_name_regex().is_match(image)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum DockerAction {
    ListContainers,
    ListImages,
    ListVolumes,
    RunContainer {
        image: String,
        #[serde(default)]
        command: Option<String>,
        #[serde(default)]
        volumes: Vec<String>,
        #[serde(default)]
        ports: Vec<String>,
        #[serde(default)]
        environment: BTreeMap<String, String>,
        #[serde(default)]
        detach: bool,
        #[serde(default)]
        network: Option<String>,
    },
    StopContainer {
        container_id: String,
    },
    RemoveContainer {
        container_id: String,
        #[serde(default)]
        force: bool,
    },
    PullImage {
        image: String,
    },
    RemoveImage {
        image: String,
        #[serde(default)]
        force: bool,
    },
    Inspect {
        #[serde(default)]
        container_id: Option<String>,
        #[serde(default)]
        image: Option<String>,
    },
    Logs {
        container_id: String,
        #[serde(default)]
        tail: Option<u32>,
    },
    Exec {
        container_id: String,
        command: String,
    },
}

/// Container lifecycle tool
pub struct DockerTool {
    docker_path: String,
    timeout: Duration,
}

impl DockerTool {
    pub fn new(docker_path: impl Into<String>) -> Self {
        Self {
            docker_path: docker_path.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the CLI arguments for an action, validating identifiers
    fn build_args(action: &DockerAction) -> Result<Vec<String>, String> {
        let check_container = |id: &str| {
            if is_valid_container_id(id) {
                Ok(())
            } else {
                Err(format!("Invalid container ID: {}", id))
            }
        };
        let check_image = |image: &str| {
            if is_valid_image_name(image) {
                Ok(())
            } else {
                Err(format!("Invalid image name: {}", image))
            }
        };
        let args = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Ok(match action {
            DockerAction::ListContainers => args(&["ps", "--all", "--format", "{{json .}}"]),
            DockerAction::ListImages => args(&["images", "--format", "{{json .}}"]),
            DockerAction::ListVolumes => args(&["volume", "ls", "--format", "{{json .}}"]),
            DockerAction::RunContainer {
                image,
                command,
                volumes,
                ports,
                environment,
                detach,
                network,
            } => {
                check_image(image)?;
                let mut out = args(&["run"]);
                if *detach {
                    out.push("--detach".into());
                }
                if let Some(network) = network {
                    out.extend(["--network".to_string(), network.clone()]);
                }
                for volume in volumes {
                    out.extend(["-v".to_string(), volume.clone()]);
                }
                for port in ports {
                    out.extend(["-p".to_string(), port.clone()]);
                }
                for (key, value) in environment {
                    out.extend(["-e".to_string(), format!("{}={}", key, value)]);
                }
                out.push(image.clone());
                if let Some(command) = command {
                    out.extend(command.split_whitespace().map(String::from));
                }
                out
            }
            DockerAction::StopContainer { container_id } => {
                check_container(container_id)?;
                args(&["stop", container_id.as_str()])
            }
            DockerAction::RemoveContainer { container_id, force } => {
                check_container(container_id)?;
                let mut out = args(&["rm"]);
                if *force {
                    out.push("--force".into());
                }
                out.push(container_id.clone());
                out
            }
            DockerAction::PullImage { image } => {
                check_image(image)?;
                args(&["pull", image.as_str()])
            }
            DockerAction::RemoveImage { image, force } => {
                check_image(image)?;
                let mut out = args(&["rmi"]);
                if *force {
                    out.push("--force".into());
                }
                out.push(image.clone());
                out
            }
            DockerAction::Inspect { container_id, image } => match (container_id, image) {
                (Some(id), _) => {
                    check_container(id)?;
                    args(&["inspect", "--type", "container", id.as_str()])
                }
                (None, Some(image)) => {
                    check_image(image)?;
                    args(&["inspect", "--type", "image", image.as_str()])
                }
                (None, None) => {
                    return Err("container_id or image is required for inspect".to_string())
                }
            },
            DockerAction::Logs { container_id, tail } => {
                check_container(container_id)?;
                let tail = tail.unwrap_or(DEFAULT_LOG_TAIL).to_string();
                args(&["logs", "--tail", tail.as_str(), container_id.as_str()])
            }
            DockerAction::Exec { container_id, command } => {
                check_container(container_id)?;
                let mut out = args(&["exec", container_id.as_str()]);
                out.extend(command.split_whitespace().map(String::from));
                out
            }
        })
    }

    async fn run_docker(&self, args: &[String]) -> ToolResult {
        tracing::info!("Running: {} {}", self.docker_path, args.join(" "));

        let child = Command::new(&self.docker_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolResult::error(format!(
                    "Failed to execute {}: {}",
                    self.docker_path, e
                ))
            }
            Err(_) => {
                return ToolResult::error(format!(
                    "docker {} timed out after {:?}",
                    args.first().map(String::as_str).unwrap_or(""),
                    self.timeout
                ))
            }
        };

        let mut stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        truncate_output(&mut stdout, MAX_OUTPUT_LENGTH);

        if output.status.success() {
            if stdout.trim().is_empty() {
                ToolResult::success("Command completed successfully (no output)")
            } else {
                ToolResult::success(stdout)
            }
        } else {
            tracing::warn!("docker exited with {}: {}", output.status, stderr.trim());
            ToolResult::error(format!(
                "docker exited with {}\n{}{}",
                output.status,
                stdout,
                stderr.trim()
            ))
        }
    }
}

impl Default for DockerTool {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl Tool for DockerTool {
    fn name(&self) -> &str {
        "docker"
    }

    fn description(&self) -> &str {
        "Manage Docker containers and images: list, run, stop, remove, pull, inspect, read logs, and exec commands."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            json!({
                "action": {
                    "type": "string",
                    "enum": [
                        "list_containers", "list_images", "list_volumes", "run_container",
                        "stop_container", "remove_container", "pull_image", "remove_image",
                        "inspect", "logs", "exec"
                    ],
                    "description": "Docker action to perform"
                },
                "container_id": {
                    "type": "string",
                    "description": "Container ID or name"
                },
                "image": {
                    "type": "string",
                    "description": "Image name"
                },
                "command": {
                    "type": "string",
                    "description": "Command for run_container or exec"
                },
                "volumes": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Volume mappings (e.g. ['host_path:container_path'])"
                },
                "ports": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Port mappings (e.g. ['8080:80'])"
                },
                "environment": {
                    "type": "object",
                    "description": "Environment variables for the container"
                },
                "detach": {
                    "type": "boolean",
                    "description": "Run the container in the background"
                },
                "network": {
                    "type": "string",
                    "description": "Network to connect the container to"
                },
                "force": {
                    "type": "boolean",
                    "description": "Force removal"
                },
                "tail": {
                    "type": "integer",
                    "description": "Number of log lines for logs (default 200)"
                }
            }),
            &["action"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let action: DockerAction = match serde_json::from_value(input.clone()) {
            Ok(action) => action,
            Err(e) => return Ok(ToolResult::error(format!("Invalid docker input: {}", e))),
        };

        match Self::build_args(&action) {
            Ok(args) => Ok(self.run_docker(&args).await),
            Err(message) => Ok(ToolResult::error(message)),
        }
    }
}
