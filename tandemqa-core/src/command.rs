//! Synchronous external command execution
//!
//! External tools (the mapper, the polisher, stage implementations) are run
//! through [`CommandRunner`] so tests can substitute recording stubs.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_if<S: Into<OsString>>(self, cond: bool, arg: S) -> Self {
        if cond {
            self.arg(arg)
        } else {
            self
        }
    }

    /// Arguments as lossy strings, mostly for assertions and logging
    pub fn args_lossy(&self) -> Vec<String> {
        self.args.iter().map(|a| a.to_string_lossy().to_string()).collect()
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn with_status(status: i32) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Short diagnostic for failure reports: status plus the tail of stderr
    pub fn diagnostic(&self) -> String {
        let status = match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = String::from_utf8_lossy(&self.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        if tail.is_empty() {
            status
        } else {
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            format!("{}: {}", status, tail.join(" | "))
        }
    }
}

/// Runs commands to completion. No timeouts, no retries.
pub trait CommandRunner {
    fn run(&self, command: &ExternalCommand) -> std::io::Result<CommandOutcome>;
}

/// Runs commands with `std::process`, blocking until they exit
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ExternalCommand) -> std::io::Result<CommandOutcome> {
        log::debug!("Running: {}", command);
        let output = Command::new(&command.program).args(&command.args).output()?;
        Ok(CommandOutcome {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Resolve a program through `PATH`, falling back to the name itself
pub fn resolve_program<P: AsRef<Path>>(program: P) -> PathBuf {
    let program = program.as_ref();
    which::which(program).unwrap_or_else(|_| program.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let cmd = ExternalCommand::new("mapper")
            .arg("-t")
            .arg("4")
            .arg_if(false, "--skip")
            .args(["a.fa", "b.fa"]);
        assert_eq!(cmd.args_lossy(), vec!["-t", "4", "a.fa", "b.fa"]);
        assert_eq!(cmd.to_string(), "mapper -t 4 a.fa b.fa");
    }

    #[test]
    fn test_diagnostic_includes_stderr_tail() {
        let outcome = CommandOutcome {
            status: Some(2),
            stdout: Vec::new(),
            stderr: b"loading\nbad read file\n".to_vec(),
        };
        assert!(!outcome.success());
        assert_eq!(outcome.diagnostic(), "exit status 2: loading | bad read file");
    }

    #[test]
    fn test_unresolvable_program_is_kept() {
        let path = resolve_program("definitely-not-a-real-tool-xyz");
        assert_eq!(path, PathBuf::from("definitely-not-a-real-tool-xyz"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reports_status() {
        let outcome = SystemRunner
            .run(&ExternalCommand::new("sh").args(["-c", "echo oops >&2; exit 3"]))
            .unwrap();
        assert_eq!(outcome.status, Some(3));
        assert!(String::from_utf8_lossy(&outcome.stderr).contains("oops"));
    }
}
