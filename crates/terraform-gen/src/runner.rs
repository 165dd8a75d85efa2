//! Script Runner Agent
//!
//! Optional last stage: runs the shell commands the generator proposed (or
//! a default `terraform init` / `terraform validate` pair) inside the
//! generated tree and reports the outcome as a single message.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use agent_core::{Agent, AgentId, Message, Result, Transcript};

use crate::prompts::EXECUTION_ERROR;

/// Commands run when the generator did not propose any
pub const DEFAULT_COMMANDS: [&str; 2] = [
    "terraform init -backend=false -input=false",
    "terraform validate",
];

/// Exit code reported for a command that ran past its timeout
const TIMEOUT_EXIT_CODE: i32 = 124;

static SHELL_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:sh|bash|shell)[ \t]*\r?\n(.*?)```").expect("valid shell block regex")
});

/// Outcome of one command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: String,
    pub exit_code: i32,
    pub output: String,
}

pub struct ScriptRunnerAgent {
    id: AgentId,
    work_dir: PathBuf,
    timeout: Duration,
}

impl ScriptRunnerAgent {
    pub fn new(id: impl Into<AgentId>, work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            work_dir: work_dir.into(),
            timeout,
        }
    }
    
    /// Run commands in order, stopping at the first failure
    pub async fn run_all(&self, commands: &[String]) -> Vec<CommandOutcome> {
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            let outcome = self.run_one(command).await;
            let failed = outcome.exit_code != 0;
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        outcomes
    }
    
    async fn run_one(&self, command: &str) -> CommandOutcome {
        tracing::info!(command, dir = %self.work_dir.display(), "Running script");
        
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return CommandOutcome {
                    command: command.to_string(),
                    exit_code: 127,
                    output: format!("failed to start: {}", e),
                };
            }
        };
        
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                CommandOutcome {
                    command: command.to_string(),
                    // killed by a signal
                    exit_code: output.status.code().unwrap_or(-1),
                    output: text,
                }
            }
            Ok(Err(e)) => CommandOutcome {
                command: command.to_string(),
                exit_code: -1,
                output: e.to_string(),
            },
            Err(_) => {
                tracing::warn!(command, timeout_secs = self.timeout.as_secs(), "Script timed out");
                CommandOutcome {
                    command: command.to_string(),
                    exit_code: TIMEOUT_EXIT_CODE,
                    output: format!("Timeout after {} seconds", self.timeout.as_secs()),
                }
            }
        }
    }
}

/// Shell commands from ```sh / ```bash / ```shell blocks, one per line.
/// Blank lines and `#` comments are skipped.
pub fn extract_commands(text: &str) -> Vec<String> {
    SHELL_BLOCK
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .flat_map(|block| block.as_str().lines())
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_start_matches("$ ").to_string())
        .collect()
}

/// Single report for a batch. The exit code is the first failure's, or 0.
pub fn report(outcomes: &[CommandOutcome]) -> String {
    let exit_code = outcomes
        .iter()
        .map(|o| o.exit_code)
        .find(|code| *code != 0)
        .unwrap_or(0);
    let verdict = if exit_code == 0 { "execution succeeded" } else { "execution failed" };
    
    let mut text = format!("exitcode: {} ({})\nCode output:", exit_code, verdict);
    for outcome in outcomes {
        text.push_str(&format!("\n$ {}\n{}", outcome.command, outcome.output.trim_end()));
    }
    if exit_code != 0 {
        text.push('\n');
        text.push_str(EXECUTION_ERROR);
    }
    text
}

#[async_trait]
impl Agent for ScriptRunnerAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }
    
    async fn step(&self, transcript: &Transcript) -> Result<Message> {
        let request = transcript.last();
        let mut commands = request
            .map(|m| extract_commands(&m.content))
            .unwrap_or_default();
        if commands.is_empty() {
            commands = DEFAULT_COMMANDS.iter().map(|c| c.to_string()).collect();
        }
        
        if !self.work_dir.is_dir() {
            let outcome = CommandOutcome {
                command: commands.join(" && "),
                exit_code: 1,
                output: format!("{} does not exist", self.work_dir.display()),
            };
            return Ok(self.reply(request, report(&[outcome])));
        }
        
        let outcomes = self.run_all(&commands).await;
        Ok(self.reply(request, report(&outcomes)))
    }
}

impl ScriptRunnerAgent {
    fn reply(&self, request: Option<&Message>, text: String) -> Message {
        let message = Message::new(self.id.clone(), text);
        match request {
            Some(request) => message.reply_to(request.sender.clone()),
            None => message,
        }
    }
}
