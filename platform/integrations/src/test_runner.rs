//! Local test command, run once per task

use crate::TestRunner;
use agent_runtime::env_or;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Placeholder replaced by the task id in each command argument
pub const TASK_PLACEHOLDER: &str = "{task_id}";

pub const DEFAULT_TEST_COMMAND: &str = "yarn jest --testPathPattern={task_id}";

/// Runs a command template without a shell; the task id only ever lands
/// inside a single argument
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    template: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandTestRunner {
    pub fn new(command: &str) -> Self {
        CommandTestRunner {
            template: command.split_whitespace().map(str::to_string).collect(),
            workdir: None,
        }
    }

    /// `TEST_COMMAND` (default `yarn jest --testPathPattern={task_id}`), optional `TEST_WORKDIR`
    pub fn from_env() -> Self {
        let mut runner = Self::new(&env_or("TEST_COMMAND", DEFAULT_TEST_COMMAND));
        runner.workdir = std::env::var("TEST_WORKDIR").ok().map(PathBuf::from);
        runner
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Program and arguments for one task
    pub fn command_for(&self, task_id: &str) -> Vec<String> {
        self.template
            .iter()
            .map(|part| part.replace(TASK_PLACEHOLDER, task_id))
            .collect()
    }
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    /// A command that cannot be started counts as a failed run
    async fn run_tests(&self, task_id: &str) -> bool {
        let argv = self.command_for(task_id);
        let Some((program, args)) = argv.split_first() else {
            tracing::error!(task_id = %task_id, "Empty test command");
            return false;
        };

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        match command.output().await {
            Ok(output) if output.status.success() => {
                tracing::info!(task_id = %task_id, "Tests passed");
                true
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let lines: Vec<&str> = stderr.lines().collect();
                let tail = lines[lines.len().saturating_sub(20)..].join("\n");
                tracing::warn!(
                    task_id = %task_id,
                    code = ?output.status.code(),
                    stderr = %tail,
                    "Tests failed"
                );
                false
            }
            Err(e) => {
                tracing::error!(task_id = %task_id, program = %program, error = %e, "Test command could not start");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_for_substitutes_task_id() {
        let runner = CommandTestRunner::new(DEFAULT_TEST_COMMAND);
        assert_eq!(
            runner.command_for("task-001"),
            vec!["yarn", "jest", "--testPathPattern=task-001"]
        );
    }

    #[test]
    fn test_task_id_stays_one_argument() {
        let runner = CommandTestRunner::new("echo {task_id}");
        assert_eq!(runner.command_for("a; rm -rf /"), vec!["echo", "a; rm -rf /"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides_outcome() {
        assert!(CommandTestRunner::new("true").run_tests("task-1").await);
        assert!(!CommandTestRunner::new("false").run_tests("task-1").await);
        assert!(!CommandTestRunner::new("definitely-not-a-binary-9f2c").run_tests("task-1").await);
        assert!(!CommandTestRunner::new("").run_tests("task-1").await);
    }
}
