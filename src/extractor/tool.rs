//! External metadata-tool abstraction (spec.md section 6 "Consumed").
//!
//! `ExternalTool` is constructor-injected so tests can swap in a fake
//! implementation; `SubprocessTool` shells out to a real executable with a
//! poll-based timeout, matching the teacher's preference for plain
//! `std::process` over a process-control crate.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{RenamerError, Result};

/// Result of one external-tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub exit_code: i32,
}

/// Abstracts the subprocess that reads extended metadata out of a file, so
/// the extractor never hardcodes a specific binary.
pub trait ExternalTool: Send + Sync {
    fn run(&self, path: &Path, timeout: Duration) -> Result<ToolOutput>;
}

/// Invokes a configured executable as `<program> <extra_args...> <path>`,
/// polling `try_wait` against `timeout` and killing the child on expiry.
pub struct SubprocessTool {
    program: String,
    extra_args: Vec<String>,
}

impl SubprocessTool {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }
}

impl ExternalTool for SubprocessTool {
    fn run(&self, path: &Path, timeout: Duration) -> Result<ToolOutput> {
        let mut child = Command::new(&self.program)
            .args(&self.extra_args)
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| RenamerError::ToolError {
                path: path.to_path_buf(),
                reason: source.to_string(),
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait().map_err(|source| RenamerError::ToolError {
                path: path.to_path_buf(),
                reason: source.to_string(),
            })? {
                break status;
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenamerError::ToolTimeout(path.to_path_buf()));
            }
            std::thread::sleep(Duration::from_millis(10));
        };

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            use std::io::Read;
            let _ = out.read_to_string(&mut stdout);
        }

        Ok(ToolOutput {
            stdout,
            exit_code: status.code().unwrap_or(-1),
        })
    }
}
