//! Terraform Workflow
//!
//! Wires the agents, tools and transition table for one generation run:
//!
//! ```text
//! InitAgent ──► RequirementsAnalyzer ◄──► ToolExecutor
//!                      │ ANALYSIS_COMPLETE
//!                      ▼
//!               ScriptGenerator ◄──► ToolExecutor
//!                      │ SCRIPTS_GENERATED   ▲ EXECUTION_ERROR
//!                      ▼                     │
//!               TerraformScriptExecutor ─────┘   (optional)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agent_core::transition::when;
use agent_core::{
    GenerativeAgent, Initiator, LlmProvider, Orchestrator, RunResult, TerminationReason,
    ToolExecutionAgent, ToolRegistry, TransitionRule,
};

use crate::config::{GeneratorConfig, ResolvedDirs};
use crate::error::Result;
use crate::gateway::ToolGateway;
use crate::layout::{check_layout, LayoutReport};
use crate::prompts::{self, ANALYSIS_COMPLETE, EXECUTION_ERROR, SCRIPTS_GENERATED};
use crate::runner::ScriptRunnerAgent;
use crate::tools::{
    ExtractInfrastructureTool, GetFileContentTool, ReadFolderStructureTool, WriteFileContentTool,
    EXTRACT_INFRASTRUCTURE_FROM_IMAGE, GET_FILE_CONTENT, READ_FOLDER_STRUCTURE, WRITE_FILE_CONTENT,
};

pub const INIT_AGENT: &str = "InitAgent";
pub const REQUIREMENTS_ANALYZER: &str = "RequirementsAnalyzer";
pub const SCRIPT_GENERATOR: &str = "ScriptGenerator";
pub const TOOL_EXECUTOR: &str = "ToolExecutor";
pub const SCRIPT_EXECUTOR: &str = "TerraformScriptExecutor";

/// Text that marks a successful script run
pub const EXECUTION_SUCCEEDED: &str = "exitcode: 0";

const ANALYZER_TOOLS: [&str; 3] = [READ_FOLDER_STRUCTURE, GET_FILE_CONTENT, EXTRACT_INFRASTRUCTURE_FROM_IMAGE];
const GENERATOR_TOOLS: [&str; 1] = [WRITE_FILE_CONTENT];

/// Outcome of [`generate`]
#[derive(Debug)]
pub struct GenerationReport {
    pub result: RunResult,
    pub dirs: ResolvedDirs,
    /// Folder that received the Terraform tree
    pub terraform_dir: PathBuf,
    pub layout: LayoutReport,
}

impl GenerationReport {
    pub fn termination(&self) -> TerminationReason {
        self.result.termination()
    }
}

/// The four filesystem and vision tools over one gateway
pub fn build_tools(
    gateway: Arc<ToolGateway>,
    provider: Arc<dyn LlmProvider>,
    config: &GeneratorConfig,
) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(ReadFolderStructureTool::new(gateway.clone()));
    tools.register(GetFileContentTool::new(gateway.clone()));
    tools.register(WriteFileContentTool::new(gateway.clone()));
    tools.register(ExtractInfrastructureTool::new(
        gateway,
        provider,
        config.generation_options(),
    ));
    tools
}

/// Agents and transition table for a run seeded with `message`
pub fn build_orchestrator(
    config: &GeneratorConfig,
    dirs: &ResolvedDirs,
    provider: Arc<dyn LlmProvider>,
    message: String,
) -> Result<Orchestrator> {
    let gateway = Arc::new(ToolGateway::new(&dirs.source, &dirs.dest)?);
    let tools = build_tools(gateway, provider.clone(), config);
    
    let analyzer_prompt = format!(
        "{}\n\n{}",
        prompts::requirements_analyzer(),
        tools.generate_prompt_section(&ANALYZER_TOOLS)
    );
    let generator_prompt = format!(
        "{}\n\n{}",
        prompts::script_generator(&config.output_subdir),
        tools.generate_prompt_section(&GENERATOR_TOOLS)
    );
    
    let generative = |id: &str, prompt: String, offered: &[&str]| {
        let options = config.generation_options().with_tools(tools.schemas_for(offered));
        let agent = GenerativeAgent::new(id, prompt, provider.clone(), options);
        match config.max_context_tokens {
            Some(limit) => agent.with_context_limit(limit),
            None => agent,
        }
    };
    
    let mut builder = Orchestrator::builder(INIT_AGENT)
        .agent(Initiator::new(INIT_AGENT, message))
        .agent(generative(REQUIREMENTS_ANALYZER, analyzer_prompt, &ANALYZER_TOOLS))
        .agent(generative(SCRIPT_GENERATOR, generator_prompt, &GENERATOR_TOOLS))
        .agent(ToolExecutionAgent::new(TOOL_EXECUTOR, Arc::new(tools)))
        .rule(TransitionRule::always(INIT_AGENT, REQUIREMENTS_ANALYZER).label("seed"))
        .rule(
            TransitionRule::new(REQUIREMENTS_ANALYZER, TOOL_EXECUTOR, when::tool_request([ANALYSIS_COMPLETE]))
                .label("analyzer-tool-request"),
        )
        .rule(
            TransitionRule::new(TOOL_EXECUTOR, REQUIREMENTS_ANALYZER, when::tool_result_for(REQUIREMENTS_ANALYZER))
                .label("analyzer-tool-result"),
        )
        .rule(
            TransitionRule::new(REQUIREMENTS_ANALYZER, SCRIPT_GENERATOR, when::completed(ANALYSIS_COMPLETE))
                .label("analysis-complete"),
        )
        .rule(
            TransitionRule::new(SCRIPT_GENERATOR, TOOL_EXECUTOR, when::tool_request([SCRIPTS_GENERATED]))
                .label("generator-tool-request"),
        )
        .rule(
            TransitionRule::new(TOOL_EXECUTOR, SCRIPT_GENERATOR, when::tool_result_for(SCRIPT_GENERATOR))
                .label("generator-tool-result"),
        )
        .sentinel(REQUIREMENTS_ANALYZER, ANALYSIS_COMPLETE)
        .terminal_sentinel(SCRIPT_GENERATOR, SCRIPTS_GENERATED);
    
    if config.execute_scripts {
        let work_dir = dirs.dest.join(&config.output_subdir);
        builder = builder
            .agent(ScriptRunnerAgent::new(
                SCRIPT_EXECUTOR,
                work_dir,
                Duration::from_secs(config.script_timeout_secs),
            ))
            .rule(
                TransitionRule::new(SCRIPT_GENERATOR, SCRIPT_EXECUTOR, when::completed(SCRIPTS_GENERATED))
                    .label("scripts-generated"),
            )
            .rule(
                TransitionRule::new(SCRIPT_EXECUTOR, SCRIPT_GENERATOR, when::contains(EXECUTION_ERROR))
                    .max_repeats(config.execution_retries)
                    .label("execution-error"),
            )
            .sentinel(SCRIPT_EXECUTOR, EXECUTION_ERROR)
            .terminal_sentinel(SCRIPT_EXECUTOR, EXECUTION_SUCCEEDED);
    }
    
    Ok(builder.build()?)
}

/// Analyze `config.source_dir` and write Terraform under the destination.
///
/// Directories are checked before any agent runs. `message` replaces the
/// default seed message.
pub async fn generate(
    config: &GeneratorConfig,
    provider: Arc<dyn LlmProvider>,
    message: Option<&str>,
) -> Result<GenerationReport> {
    let dirs = config.resolve_dirs()?;
    let message = match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(message) => message.to_string(),
        None => prompts::default_message(&dirs.source, &dirs.dest, config.layout, &config.output_subdir),
    };
    
    tracing::info!(
        source = %dirs.source.display(),
        dest = %dirs.dest.display(),
        layout = ?config.layout,
        model = %config.model,
        execute_scripts = config.execute_scripts,
        "Starting Terraform generation"
    );
    
    let orchestrator = build_orchestrator(config, &dirs, provider, message)?;
    let result = orchestrator.start(config.max_rounds).await?;
    
    let terraform_dir = dirs.dest.join(&config.output_subdir);
    let layout = check_layout(&terraform_dir);
    
    tracing::info!(
        termination = %result.termination(),
        messages = result.transcript.len(),
        modules = layout.modules.len(),
        missing_files = layout.missing.len(),
        "Terraform generation finished"
    );
    
    Ok(GenerationReport { result, dirs, terraform_dir, layout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneratorError;
    use agent_core::provider::{Completion, FinishReason, ModelInfo, ProviderInfo};
    use agent_core::{AgentError, ChatMessage, GenerationOptions, Result as CoreResult, ToolCall};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers with queued completions in call order
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Completion>>,
        calls: Mutex<usize>,
        offered: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Arc<Self> {
            Self::with_completions(replies.iter().map(|r| Completion::text(*r, "scripted")).collect())
        }

        fn with_completions(replies: Vec<Completion>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
                offered: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> CoreResult<ProviderInfo> {
            Ok(ProviderInfo { name: "scripted".into(), models: vec![], supports_vision: true, supports_tools: false })
        }

        async fn health_check(&self) -> CoreResult<bool> {
            Ok(true)
        }

        async fn complete(&self, _messages: &[ChatMessage], options: &GenerationOptions) -> CoreResult<Completion> {
            *self.calls.lock().unwrap() += 1;
            self.offered
                .lock()
                .unwrap()
                .push(options.tools.iter().map(|t| t.name.clone()).collect());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Provider("script exhausted".into()))
        }

        async fn list_models(&self) -> CoreResult<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    fn project() -> (tempfile::TempDir, tempfile::TempDir) {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("README.md"), "A Flask app backed by Postgres on GCP.").unwrap();
        (source, dest)
    }

    #[tokio::test]
    async fn test_out_of_scope_write_then_corrected_write() {
        let (source, dest) = project();
        let provider = ScriptedProvider::new(&[
            "NEED_TOOL\nTool: {read_folder_structure}\n{\"path\": \"/\"}",
            "Requirements: one VM, one Postgres instance, a private network.\nANALYSIS_COMPLETE",
            "NEED_TOOL\nTool: {write_file_content}\n{\"path\": \"/etc/tfgen-test/main.tf\", \"content\": \"x\"}",
            "NEED_TOOL\nTool: {write_file_content}\n{\"path\": \"terraform/main.tf\", \"content\": \"module \\\"network\\\" {}\"}",
            "All files written.\nSCRIPTS_GENERATED",
        ]);

        let config = GeneratorConfig::new(source.path(), dest.path());
        let report = generate(&config, provider.clone(), None).await.unwrap();

        assert_eq!(report.termination(), TerminationReason::Completed);
        assert!(report.result.protocol_violation().is_none());

        let messages = report.result.transcript.messages();
        assert_eq!(messages.len(), 9);
        assert_eq!(messages[0].sender.as_str(), INIT_AGENT);
        assert!(messages[0].content.contains("terraform"));
        assert!(messages[2].content.contains("README.md"));

        let rejected = &messages[5];
        assert_eq!(rejected.sender.as_str(), TOOL_EXECUTOR);
        assert!(rejected.content.starts_with("TOOL_RESULT\nTool: write_file_content\nStatus: error"));
        assert!(!std::path::Path::new("/etc/tfgen-test").exists());

        let accepted = &messages[7];
        assert!(accepted.content.contains("Status: ok"));
        assert_eq!(
            std::fs::read_to_string(dest.path().join("terraform/main.tf")).unwrap(),
            "module \"network\" {}"
        );

        assert!(report.layout.missing.iter().any(|p| p.ends_with("variables.tf")));
        assert_eq!(*provider.calls.lock().unwrap(), 5);
    }

    fn structured(call: ToolCall) -> Completion {
        let mut completion = Completion::text("", "scripted");
        completion.finish_reason = Some(FinishReason::ToolUse);
        completion.tool_calls = vec![call];
        completion
    }

    #[tokio::test]
    async fn test_structured_tool_calls_drive_the_run() {
        let (source, dest) = project();
        let provider = ScriptedProvider::with_completions(vec![
            Completion::text("Requirements: a bucket.\nANALYSIS_COMPLETE", "scripted"),
            structured(ToolCall {
                argument_error: Some("EOF while parsing an object at line 1 column 28".into()),
                ..ToolCall::new(WRITE_FILE_CONTENT)
            }),
            structured(
                ToolCall::new(WRITE_FILE_CONTENT)
                    .with_arg("path", "terraform/main.tf")
                    .with_arg("content", "# bucket"),
            ),
            Completion::text("SCRIPTS_GENERATED", "scripted"),
        ]);

        let config = GeneratorConfig::new(source.path(), dest.path());
        let report = generate(&config, provider.clone(), None).await.unwrap();

        assert_eq!(report.termination(), TerminationReason::Completed);
        let messages = report.result.transcript.messages();
        assert_eq!(messages.len(), 7);

        let garbled = &messages[3];
        assert_eq!(garbled.sender.as_str(), TOOL_EXECUTOR);
        assert!(garbled.content.contains("Status: error"));
        assert!(garbled.content.contains("Invalid arguments for write_file_content"));

        assert!(messages[5].content.contains("Status: ok"));
        assert_eq!(
            std::fs::read_to_string(dest.path().join("terraform/main.tf")).unwrap(),
            "# bucket"
        );

        let offered = provider.offered.lock().unwrap();
        assert!(offered[0].contains(&"read_folder_structure".to_string()));
        assert!(!offered[0].contains(&"write_file_content".to_string()));
        assert!(offered[1].contains(&"write_file_content".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execution_error_goes_back_to_generator() {
        let (source, dest) = project();
        let provider = ScriptedProvider::new(&[
            "Requirements: a bucket.\nANALYSIS_COMPLETE",
            "NEED_TOOL\nTool: write_file_content\n{\"path\": \"terraform/main.tf\", \"content\": \"\"}",
            "Done.\n```sh\nexit 1\n```\nSCRIPTS_GENERATED",
            "Fixed.\n```sh\ntrue\n```\nSCRIPTS_GENERATED",
        ]);

        let mut config = GeneratorConfig::new(source.path(), dest.path());
        config.execute_scripts = true;
        let report = generate(&config, provider, Some("Generate a bucket")).await.unwrap();

        let senders: Vec<&str> = report.result.transcript.iter().map(|m| m.sender.as_str()).collect();
        assert_eq!(
            senders,
            vec![
                INIT_AGENT,
                REQUIREMENTS_ANALYZER,
                SCRIPT_GENERATOR,
                TOOL_EXECUTOR,
                SCRIPT_GENERATOR,
                SCRIPT_EXECUTOR,
                SCRIPT_GENERATOR,
                SCRIPT_EXECUTOR,
            ]
        );
        assert_eq!(report.result.transcript.messages()[0].content, "Generate a bucket");
        assert!(report.result.transcript.messages()[5].content.contains(EXECUTION_ERROR));
        assert_eq!(report.termination(), TerminationReason::Completed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execution_retries_are_capped() {
        let (source, dest) = project();
        std::fs::create_dir_all(dest.path().join("terraform")).unwrap();
        let provider = ScriptedProvider::new(&[
            "ANALYSIS_COMPLETE",
            "```sh\nexit 2\n```\nSCRIPTS_GENERATED",
            "```sh\nexit 2\n```\nSCRIPTS_GENERATED",
        ]);

        let mut config = GeneratorConfig::new(source.path(), dest.path());
        config.execute_scripts = true;
        config.execution_retries = 1;
        let report = generate(&config, provider, None).await.unwrap();

        assert_eq!(report.result.transcript.len(), 6);
        assert_eq!(report.termination(), TerminationReason::NoTransitionMatched);
        assert!(report.result.protocol_violation().is_none());
    }

    #[tokio::test]
    async fn test_ambiguous_analyzer_reply_is_reported() {
        let (source, dest) = project();
        let provider = ScriptedProvider::new(&[
            "NEED_TOOL\nTool: read_folder_structure\n{\"path\": \"/\"}\nANALYSIS_COMPLETE",
        ]);

        let report = generate(&GeneratorConfig::new(source.path(), dest.path()), provider, None)
            .await
            .unwrap();

        assert_eq!(report.result.transcript.len(), 2);
        assert_eq!(report.termination(), TerminationReason::NoTransitionMatched);
        assert!(report.result.protocol_violation().is_some());
    }

    #[tokio::test]
    async fn test_missing_directory_fails_before_any_agent_runs() {
        let (source, dest) = project();
        let provider = ScriptedProvider::new(&[]);
        let config = GeneratorConfig::new(source.path(), dest.path().join("missing"));

        let err = generate(&config, provider.clone(), None).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(_)));
        assert_eq!(*provider.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_fatal() {
        let (source, dest) = project();
        let provider = ScriptedProvider::new(&[]);

        let err = generate(&GeneratorConfig::new(source.path(), dest.path()), provider, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Agent(AgentError::Provider(_))));
    }

    #[test]
    fn test_runner_rules_only_with_execution_enabled() {
        let (source, dest) = project();
        let provider = ScriptedProvider::new(&[]);
        let mut config = GeneratorConfig::new(source.path(), dest.path());
        let dirs = config.resolve_dirs().unwrap();

        let plain = build_orchestrator(&config, &dirs, provider.clone(), "go".into()).unwrap();
        assert_eq!(plain.table().len(), 6);

        config.execute_scripts = true;
        let full = build_orchestrator(&config, &dirs, provider, "go".into()).unwrap();
        assert_eq!(full.table().len(), 8);
        assert_eq!(full.table().rules()[7].max_repeats, Some(3));
    }
}
