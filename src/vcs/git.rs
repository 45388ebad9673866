//! Git subprocess execution
//!
//! Every git interaction goes through the `GitRunner` trait so caches can
//! be exercised without a network or a git binary.

use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs git commands
pub trait GitRunner: Send + Sync {
    /// Run `git <args>` in `cwd` and return its stdout.
    ///
    /// A non-zero exit is an error carrying git's stderr.
    fn run(&self, args: &[&str], cwd: Option<&Path>, deadline: &Deadline) -> MorphResult<String>;
}

/// Runs the git binary as a subprocess
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: PathBuf,
}

impl SystemGit {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRunner for SystemGit {
    fn run(&self, args: &[&str], cwd: Option<&Path>, deadline: &Deadline) -> MorphResult<String> {
        let command = args.join(" ");
        let activity = format!("running git {}", command);
        deadline.check(&activity)?;

        debug!("Executing: git {:?} in {:?}", args, cwd);

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| MorphError::command_failed(format!("git {}", command), e))?;

        // Drain both pipes concurrently so a chatty git cannot block on a
        // full pipe while we poll for exit
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(MorphError::command_failed(format!("git {}", command), e)),
            }

            if let Err(e) = deadline.check(&activity) {
                debug!("Killing git {}: {}", command, e);
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }

            thread::sleep(POLL_INTERVAL);
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if status.success() {
            Ok(stdout)
        } else {
            let stderr = stderr.trim();
            let reason = if stderr.is_empty() {
                status.to_string()
            } else {
                stderr.to_string()
            };
            Err(MorphError::git(command, reason))
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
