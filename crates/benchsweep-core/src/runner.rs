//! Benchmark process execution.
//!
//! The runner never fails: launch errors, non-zero exits and timeouts all come
//! back as a [`RunOutcome`] so the harness can record them as report data.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::ScriptSpec;
use crate::expand::SweepPoint;

/// Everything needed to launch one sweep point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable or script path.
    pub program: PathBuf,

    /// Optional launcher placed in front of `program`.
    pub interpreter: Option<String>,

    /// Argument vector passed after the program.
    pub arguments: Vec<String>,

    /// Variables set on the child only, on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(spec: &ScriptSpec, point: &SweepPoint) -> Self {
        Self {
            program: spec.path.clone(),
            interpreter: spec.interpreter.clone(),
            arguments: point.arguments.clone(),
            env: spec.env.clone(),
        }
    }

    /// Human-readable command line for logs.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.arguments.len() + 2);
        if let Some(interpreter) = &self.interpreter {
            parts.push(interpreter.clone());
        }
        parts.push(self.program.display().to_string());
        parts.extend(self.arguments.iter().cloned());
        parts.join(" ")
    }
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Exit status zero.
    Succeeded,
    /// The program ran and exited with a failure status (or a signal).
    NonZeroExit,
    /// The program could not be started.
    LaunchFailed,
    /// The optional per-execution timeout elapsed; the child was killed.
    TimedOut,
}

/// Captured result of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,

    /// Exit code, when the child exited normally.
    pub exit_code: Option<i32>,

    /// Captured stdout. Only read for successful runs.
    pub stdout: String,

    /// Captured stderr, or the launch/timeout message the runner produced.
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl RunOutcome {
    pub fn succeeded(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Succeeded,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    pub fn failed(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            status: RunStatus::NonZeroExit,
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    pub fn launch_failed(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::LaunchFailed,
            exit_code: None,
            stdout: String::new(),
            stderr: message.into(),
            duration_ms: 0,
        }
    }

    pub fn timed_out(limit: Duration) -> Self {
        Self {
            status: RunStatus::TimedOut,
            exit_code: None,
            stdout: String::new(),
            stderr: format!("timed out after {} seconds", limit.as_secs_f64()),
            duration_ms: limit.as_millis() as u64,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Whether the program ran and exited with status zero.
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

/// Executes one invocation and captures its output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> RunOutcome;
}

/// Runs benchmarks as real child processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner {
    timeout: Option<Duration>,
}

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill and report any execution still running after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn command(invocation: &Invocation) -> Command {
        let mut command = match &invocation.interpreter {
            Some(interpreter) => {
                let mut c = Command::new(interpreter);
                c.arg(&invocation.program);
                c
            }
            None => Command::new(&invocation.program),
        };
        command
            .args(&invocation.arguments)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, invocation: &Invocation) -> RunOutcome {
        let start = Instant::now();
        debug!(command = %invocation.command_line(), "Launching benchmark");

        let child = match Self::command(invocation).spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::launch_failed(format!(
                    "failed to launch {}: {}",
                    invocation.program.display(),
                    e
                ))
                .with_duration(start.elapsed().as_millis() as u64);
            }
        };

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => return RunOutcome::timed_out(limit),
            },
            None => child.wait_with_output().await,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return RunOutcome::launch_failed(format!(
                    "failed to collect output of {}: {}",
                    invocation.program.display(),
                    e
                ))
                .with_duration(duration_ms);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            RunOutcome::succeeded(stdout, stderr).with_duration(duration_ms)
        } else {
            RunOutcome::failed(output.status.code(), stderr).with_duration(duration_ms)
        }
    }
}
