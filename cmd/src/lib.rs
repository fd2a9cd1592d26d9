// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Synchronous command execution, the single OS touchpoint of the agent.
//!
//! Drivers shell out to inspect or mutate kernel state (kernel version
//! probe, tunnel and bridge manipulation). Everything goes through the
//! [`CommandRunner`] trait so tests can substitute a canned runner.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

use std::process::Command;

use tracing::debug;

/// Output of a successfully executed command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    /// Stdout, split into lines with trailing newlines stripped.
    pub stdout: Vec<String>,
    /// Stderr, same shape as stdout.
    pub stderr: Vec<String>,
}

impl CommandOutput {
    /// First line of stdout, if any.
    #[must_use]
    pub fn first_line(&self) -> Option<&str> {
        self.stdout.first().map(String::as_str)
    }
}

/// Errors that can occur when running a command.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },
    #[error("'{command}' exited with status {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("'{command}' was killed by a signal")]
    Killed { command: String },
}

/// Run a command and return its structured output, or fail on non-zero exit.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError>;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
///
/// Calls block until the child exits; callers are expected to invoke this
/// only from within their own critical section (see the engine's locking
/// contract).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(ToOwned::to_owned)
        .collect()
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        debug!("running command: {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| CommandError::Spawn {
                command: program.to_owned(),
                reason: e.to_string(),
            })?;
        let stderr = split_lines(&output.stderr);
        match output.status.code() {
            Some(0) => Ok(CommandOutput {
                stdout: split_lines(&output.stdout),
                stderr,
            }),
            Some(status) => Err(CommandError::NonZeroExit {
                command: program.to_owned(),
                status,
                stderr: stderr.join("\n"),
            }),
            None => Err(CommandError::Killed {
                command: program.to_owned(),
            }),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! Canned command runner for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{CommandError, CommandOutput, CommandRunner};

    /// A runner that replays queued responses and records every invocation.
    #[derive(Debug, Default)]
    pub struct CannedRunner {
        responses: Mutex<VecDeque<Result<CommandOutput, CommandError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedRunner {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful response whose stdout is `lines`.
        pub fn expect_stdout(&self, lines: &[&str]) {
            let output = CommandOutput {
                stdout: lines.iter().map(|l| (*l).to_owned()).collect(),
                stderr: vec![],
            };
            self.responses
                .lock()
                .expect("lock poisoned")
                .push_back(Ok(output));
        }

        /// Queue a failure response.
        pub fn expect_failure(&self, error: CommandError) {
            self.responses
                .lock()
                .expect("lock poisoned")
                .push_back(Err(error));
        }

        /// The commands run so far, formatted as "program arg ...".
        #[must_use]
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock poisoned").clone()
        }
    }

    impl CommandRunner for CannedRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
            let mut line = program.to_owned();
            for arg in args {
                line.push(' ');
                line.push_str(arg);
            }
            self.calls.lock().expect("lock poisoned").push(line);
            self.responses
                .lock()
                .expect("lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput::default()))
        }
    }
}
