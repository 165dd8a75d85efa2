//! Application State

use std::sync::Arc;

use agent_core::LlmProvider;
use terraform_gen::GeneratorConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (Ollama or OpenAI-compatible)
    pub provider: Arc<dyn LlmProvider>,
    
    /// Settings each request starts from; requests supply the directories
    pub defaults: Arc<GeneratorConfig>,
}
