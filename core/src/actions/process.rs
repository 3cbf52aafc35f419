//! External process collaborator

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

pub type ExitFuture = Pin<Box<dyn Future<Output = Result<i32>> + Send>>;

/// Runs a command to completion and reports its exit code
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: Vec<String>) -> ExitFuture;
}

/// Spawns real processes with `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    working_dir: Option<PathBuf>,
}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl ProcessRunner for TokioProcessRunner {
    fn run(&self, command: Vec<String>) -> ExitFuture {
        let working_dir = self.working_dir.clone();
        Box::pin(async move {
            let (program, args) = command
                .split_first()
                .context("empty command")?;

            let mut cmd = Command::new(program);
            cmd.args(args).stdin(Stdio::null());
            if let Some(dir) = &working_dir {
                cmd.current_dir(dir);
            }

            let status = cmd
                .status()
                .await
                .with_context(|| format!("failed to spawn '{}'", program))?;
            debug!(program = %program, status = ?status.code(), "process exited");

            // Killed by a signal
            Ok(status.code().unwrap_or(-1))
        })
    }
}
