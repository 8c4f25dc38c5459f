//! External converter execution.
//!
//! The converter runs to completion with its working directory set
//! explicitly on the child process; the parent's current directory is never
//! touched. There is no timeout. Output is captured only so it can be
//! logged.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::error::ConversionError;

/// How a converter process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalCommandResult {
    /// The process could not be started.
    LaunchFailed(String),
    /// Terminated by a signal.
    KilledBySignal { signal: i32, core_dumped: bool },
    /// Exited normally.
    ExitedWithCode(i32),
}

impl ExternalCommandResult {
    /// Classify a wait status.
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::ExitedWithCode(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::KilledBySignal {
                    signal,
                    core_dumped: status.core_dumped(),
                };
            }
        }

        Self::LaunchFailed(format!("unrecognised exit status: {}", status))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::ExitedWithCode(0))
    }

    /// Only a zero exit code is success.
    pub fn into_result(self, program: &str) -> Result<(), ConversionError> {
        match self {
            Self::ExitedWithCode(0) => Ok(()),
            Self::ExitedWithCode(code) => Err(ConversionError::NonZeroExit { code }),
            Self::KilledBySignal {
                signal,
                core_dumped,
            } => Err(ConversionError::KilledBySignal {
                signal,
                core_dumped,
            }),
            Self::LaunchFailed(reason) => Err(ConversionError::LaunchFailed {
                program: program.to_string(),
                reason,
            }),
        }
    }
}

/// A fully specified converter invocation.
#[derive(Debug, Clone)]
pub struct ConverterCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    working_dir: PathBuf,
}

impl ConverterCommand {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append `--name value`.
    pub fn flag(self, name: &str, value: impl Into<String>) -> Self {
        self.arg(format!("--{}", name)).arg(value)
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run to completion and classify how the process ended.
    pub async fn run(&self) -> ExternalCommandResult {
        tracing::info!(
            program = %self.program,
            args = ?self.args,
            cwd = %self.working_dir.display(),
            "Running converter"
        );

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(program = %self.program, "Failed to start converter: {}", e);
                return ExternalCommandResult::LaunchFailed(e.to_string());
            }
        };

        let result = ExternalCommandResult::from_status(output.status);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if result.is_success() {
            tracing::debug!(program = %self.program, %stdout, %stderr, "Converter finished");
        } else {
            tracing::warn!(
                program = %self.program,
                result = ?result,
                %stdout,
                %stderr,
                "Converter failed"
            );
        }

        result
    }
}
