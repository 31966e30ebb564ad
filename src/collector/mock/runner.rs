//! Canned command outputs for testing collectors that shell out.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::collector::traits::{CommandOutput, CommandRunner};
use crate::error::CollectError;

#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    Missing,
    Timeout,
}

/// Command runner that answers from a table keyed by the full command line.
///
/// Commands without a registered response fail as if the program were not
/// installed. Every invocation is recorded and can be inspected with
/// [`MockRunner::calls`].
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: HashMap<String, Response>,
    calls: Mutex<Vec<String>>,
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a successful run printing `stdout`.
    pub fn on(&mut self, program: &str, args: &[&str], stdout: impl Into<String>) -> &mut Self {
        self.respond(program, args, CommandOutput::ok(stdout))
    }

    /// Registers a run exiting with `code` and printing `stderr`.
    pub fn on_failure(
        &mut self,
        program: &str,
        args: &[&str],
        code: i32,
        stderr: impl Into<String>,
    ) -> &mut Self {
        self.respond(program, args, CommandOutput::failed(code, stderr))
    }

    /// Registers a run that never finishes.
    pub fn on_timeout(&mut self, program: &str, args: &[&str]) -> &mut Self {
        self.responses
            .insert(command_line(program, args), Response::Timeout);
        self
    }

    /// Registers a program that cannot be started, overriding any output.
    pub fn on_missing(&mut self, program: &str, args: &[&str]) -> &mut Self {
        self.responses
            .insert(command_line(program, args), Response::Missing);
        self
    }

    fn respond(&mut self, program: &str, args: &[&str], output: CommandOutput) -> &mut Self {
        self.responses
            .insert(command_line(program, args), Response::Output(output));
        self
    }

    /// Command lines run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CollectError> {
        let line = command_line(program, args);
        match self.calls.lock() {
            Ok(mut calls) => calls.push(line.clone()),
            Err(poisoned) => poisoned.into_inner().push(line.clone()),
        }

        match self.responses.get(&line) {
            Some(Response::Output(out)) => Ok(out.clone()),
            Some(Response::Timeout) => Err(CollectError::Timeout {
                program: program.to_string(),
                timeout: std::time::Duration::from_secs(10),
            }),
            Some(Response::Missing) | None => Err(CollectError::Command {
                program: program.to_string(),
                reason: "cannot start: No such file or directory (os error 2)".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_output() {
        let mut runner = MockRunner::new();
        runner.on("lastlog", &["-u", "root"], "Username Port From Latest\n");

        let out = runner.run("lastlog", &["-u", "root"]).unwrap();
        assert!(out.success);
        assert!(out.stdout.starts_with("Username"));
        assert_eq!(runner.calls(), vec!["lastlog -u root"]);
    }

    #[test]
    fn test_unregistered_command_fails_to_start() {
        let runner = MockRunner::new();
        let err = runner.run("docker", &["ps"]).unwrap_err();
        assert!(matches!(err, CollectError::Command { .. }));
    }

    #[test]
    fn test_failure_and_timeout() {
        let mut runner = MockRunner::new();
        runner
            .on_failure("docker", &["inspect", "x"], 1, "Error: No such object: x")
            .on_timeout("docker", &["ps"]);

        let out = runner.run("docker", &["inspect", "x"]).unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(1));

        assert!(matches!(
            runner.run("docker", &["ps"]),
            Err(CollectError::Timeout { .. })
        ));
    }
}
