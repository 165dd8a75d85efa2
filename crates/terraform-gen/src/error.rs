//! Error Types for Terraform generation

use thiserror::Error;

use agent_core::AgentError;

pub type Result<T> = std::result::Result<T, GeneratorError>;

#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Invalid setup detected before any agent runs
    #[error("Configuration error: {0}")]
    Configuration(String),
    
    /// An agent step failed unrecoverably
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
    
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GeneratorError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GeneratorError::Configuration(_)
                | GeneratorError::Toml(_)
                | GeneratorError::Agent(AgentError::Config(_))
        )
    }
}
