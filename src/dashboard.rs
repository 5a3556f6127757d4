//! Lifecycle of the external analytics dashboard process.

use std::process::Stdio;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::error::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardStatus {
    NotStarted,
    Running { pid: Option<u32> },
    Exited { code: Option<i32> },
}

enum ProcessState {
    NotStarted,
    Running(Child),
    Exited(Option<i32>),
}

/// Owns the dashboard child process. Dropping it kills the child.
pub struct DashboardProcess {
    config: DashboardConfig,
    state: Mutex<ProcessState>,
    http: Client,
}

impl DashboardProcess {
    pub fn new(config: DashboardConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.health_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            state: Mutex::new(ProcessState::NotStarted),
            http,
        })
    }

    /// Dashboard address as seen from a browser that reached us via `host`.
    pub fn url_for_host(&self, host: &str) -> String {
        format!("http://{}:{}", host, self.config.port)
    }

    pub fn args(&self) -> Vec<String> {
        if !self.config.args.is_empty() {
            return self.config.args.clone();
        }

        let port = self.config.port.to_string();
        [
            "run",
            self.config.script.as_str(),
            "--server.port",
            port.as_str(),
            "--server.headless",
            "true",
            "--server.enableCORS",
            "false",
            "--server.enableXsrfProtection",
            "false",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Spawn the process. A no-op while a previous child is still alive.
    pub async fn start(&self) -> Result<(), DashboardError> {
        let mut state = self.state.lock().await;

        if let ProcessState::Running(child) = &mut *state {
            if matches!(child.try_wait(), Ok(None)) {
                info!("Dashboard already running");
                return Ok(());
            }
        }

        info!("Starting dashboard: {} {}", self.config.command, self.args().join(" "));
        let mut child = Command::new(&self.config.command)
            .args(self.args())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DashboardError::Spawn)?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, "stderr"));
        }

        *state = ProcessState::Running(child);
        Ok(())
    }

    pub async fn status(&self) -> DashboardStatus {
        let mut state = self.state.lock().await;

        let exited = match &mut *state {
            ProcessState::NotStarted => return DashboardStatus::NotStarted,
            ProcessState::Exited(code) => return DashboardStatus::Exited { code: *code },
            ProcessState::Running(child) => match child.try_wait() {
                Ok(Some(status)) => status.code(),
                Ok(None) | Err(_) => return DashboardStatus::Running { pid: child.id() },
            },
        };

        info!("Dashboard process exited with code {:?}", exited);
        *state = ProcessState::Exited(exited);
        DashboardStatus::Exited { code: exited }
    }

    /// Running, and its HTTP port answers with a success status.
    pub async fn health_check(&self) -> bool {
        if !matches!(self.status().await, DashboardStatus::Running { .. }) {
            return false;
        }

        let url = self.url_for_host("127.0.0.1");
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Dashboard health check failed: {}", e);
                false
            }
        }
    }

    /// Kill and reap the child. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), DashboardError> {
        let mut state = self.state.lock().await;

        if let ProcessState::Running(child) = &mut *state {
            info!("Stopping dashboard");
            if matches!(child.try_wait(), Ok(None)) {
                child.kill().await.map_err(DashboardError::Shutdown)?;
            }
            let code = child.wait().await.map_err(DashboardError::Shutdown)?.code();
            *state = ProcessState::Exited(code);
        }

        Ok(())
    }
}

async fn forward_output<R: AsyncRead + Unpin>(stream: R, name: &'static str) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(target: "dashboard", stream = name, "{}", line);
    }
}
