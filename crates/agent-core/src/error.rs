//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),
    
    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    
    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    
    /// Tool arguments missing or malformed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),
    
    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),
    
    /// Path does not exist under the tool's root
    #[error("Not found: {0}")]
    NotFound(String),
    
    /// Path resolves outside the directory a tool is allowed to touch
    #[error("Out of scope: {0}")]
    OutOfScope(String),
    
    /// Parse error (e.g., tool call parsing)
    #[error("Parse error: {0}")]
    Parse(String),
    
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    
    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),
    
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),
    
    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    
    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    
    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether a generative agent can recover by re-issuing a corrected tool request
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            AgentError::ToolNotFound(_)
                | AgentError::ToolValidation(_)
                | AgentError::ToolExecution(_)
                | AgentError::NotFound(_)
                | AgentError::OutOfScope(_)
                | AgentError::Parse(_)
        )
    }
    
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {}", msg),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::NotFound(path) => format!("'{}' does not exist.", path),
            AgentError::OutOfScope(path) => format!("'{}' is outside the allowed directory.", path),
            AgentError::Config(msg) => format!("Invalid configuration: {}", msg),
            AgentError::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            AgentError::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AgentError::OutOfScope("/etc".into()).is_tool_error());
        assert!(!AgentError::Provider("boom".into()).is_tool_error());
    }
}
