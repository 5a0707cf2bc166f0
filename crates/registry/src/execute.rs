//! The host's "load and run this file" primitive.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// Boxed cause carried by execution failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by an [`Executor`].
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Ordinary failure; the registry wraps it with the logical name.
    #[error("{0}")]
    Failed(BoxError),

    /// Process-termination-class failure; the registry passes it through untouched.
    #[error("fatal: {0}")]
    Fatal(BoxError),
}

impl ExecError {
    pub fn failed(cause: impl Into<BoxError>) -> Self {
        Self::Failed(cause.into())
    }

    pub fn fatal(cause: impl Into<BoxError>) -> Self {
        Self::Fatal(cause.into())
    }
}

/// Executes a resolved unit in the host.
///
/// `wrap` asks the host to sandbox the execution.
pub trait Executor: Send + Sync {
    fn execute(&self, path: &Path, wrap: bool) -> Result<(), ExecError>;
}

impl<F> Executor for F
where
    F: Fn(&Path, bool) -> Result<(), ExecError> + Send + Sync,
{
    fn execute(&self, path: &Path, wrap: bool) -> Result<(), ExecError> {
        self(path, wrap)
    }
}

/// Runs each unit through an external interpreter: `<program> [args..] <path>`.
///
/// Wrapped executions start the child with an empty environment.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument placed before the unit path.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Executor for CommandExecutor {
    fn execute(&self, path: &Path, wrap: bool) -> Result<(), ExecError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(path);
        if wrap {
            command.env_clear();
        }

        debug!(program = %self.program.display(), path = %path.display(), wrap, "executing unit");
        let status = command.status().map_err(|e| {
            ExecError::failed(format!(
                "failed to start {}: {}",
                self.program.display(),
                e
            ))
        })?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(ExecError::failed(format!(
                "{} exited with status {}",
                self.program.display(),
                code
            ))),
            None => Err(ExecError::fatal(format!(
                "{} terminated by signal",
                self.program.display()
            ))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn closure_is_an_executor() {
        let exec = |path: &Path, wrap: bool| {
            if wrap && path.ends_with("bad.plugin") {
                Err(ExecError::failed("boom"))
            } else {
                Ok(())
            }
        };
        assert!(exec.execute(Path::new("good.plugin"), true).is_ok());
        assert!(matches!(
            exec.execute(Path::new("bad.plugin"), true),
            Err(ExecError::Failed(_))
        ));
    }

    #[test]
    fn command_success_and_failure() {
        let ok = CommandExecutor::new("/bin/sh").arg("-c").arg("exit 0");
        assert!(ok.execute(Path::new("unit.plugin"), false).is_ok());

        let failing = CommandExecutor::new("/bin/sh").arg("-c").arg("exit 3");
        let err = failing.execute(Path::new("unit.plugin"), false).unwrap_err();
        assert!(matches!(err, ExecError::Failed(_)));
        assert!(err.to_string().contains("status 3"));
    }

    #[test]
    fn command_killed_by_signal_is_fatal() {
        let killed = CommandExecutor::new("/bin/sh").arg("-c").arg("kill -9 $$");
        let err = killed.execute(Path::new("unit.plugin"), false).unwrap_err();
        assert!(matches!(err, ExecError::Fatal(_)));
    }

    #[test]
    fn command_missing_program_fails() {
        let missing = CommandExecutor::new("/nonexistent/interpreter");
        assert!(matches!(
            missing.execute(Path::new("unit.plugin"), true),
            Err(ExecError::Failed(_))
        ));
    }
}
