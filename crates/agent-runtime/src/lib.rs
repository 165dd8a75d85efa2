//! # agent-runtime
//!
//! Concrete [`LlmProvider`] backends for generative agents.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//! - **OpenAI-compatible** (default): any `/chat/completions` endpoint
//!   (OpenAI, vLLM, LiteLLM, Ollama's compatibility API, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::ollama::OllamaProvider;
//!
//! let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::from_env());
//! let analyzer = GenerativeAgent::new("RequirementsAnalyzer", prompt, provider, options);
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;

#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;

// Re-export core types for convenience
pub use agent_core::{AgentError, ChatMessage, GenerationOptions, LlmProvider, Result, Role};
