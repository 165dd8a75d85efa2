//! Write File Tool

use std::sync::Arc;
use async_trait::async_trait;

use agent_core::{
    Tool, ToolSchema, ToolCall, ToolResult,
    tool::ParameterSchema,
    Result as CoreResult,
};

use super::WRITE_FILE_CONTENT;
use crate::gateway::ToolGateway;

/// Creates or overwrites a file in the destination repository
pub struct WriteFileContentTool {
    gateway: Arc<ToolGateway>,
}

impl WriteFileContentTool {
    pub fn new(gateway: Arc<ToolGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for WriteFileContentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: WRITE_FILE_CONTENT.into(),
            description: "Write content to a file in the destination repository, creating parent directories. Overwrites existing files.".into(),
            parameters: vec![
                ParameterSchema::string("path", "File to write, relative to the destination repository root", true)
                    .alias("file_path"),
                ParameterSchema::string("content", "Full file content", true),
            ],
            has_side_effects: true,
        }
    }
    
    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = call.required_str(&["path", "file_path"])?;
        let content = call.required_str(&["content"])?;
        
        let written = self.gateway.write_file(path, content).await?;
        tracing::info!(path = %written.display(), "Terraform file written");
        
        Ok(ToolResult::success(
            WRITE_FILE_CONTENT,
            format!("Successfully wrote content to {}", written.display()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::AgentError;

    #[tokio::test]
    async fn test_writes_only_inside_destination() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let tool = WriteFileContentTool::new(Arc::new(ToolGateway::new(source.path(), dest.path()).unwrap()));

        let ok = tool
            .execute(&ToolCall::new(WRITE_FILE_CONTENT).with_arg("path", "terraform/main.tf").with_arg("content", "terraform {}"))
            .await
            .unwrap();
        assert!(ok.render().starts_with("Successfully wrote content to"));
        assert_eq!(std::fs::read_to_string(dest.path().join("terraform/main.tf")).unwrap(), "terraform {}");

        let escaped = tool
            .execute(&ToolCall::new(WRITE_FILE_CONTENT).with_arg("path", "/etc/main.tf").with_arg("content", ""))
            .await;
        assert!(matches!(escaped, Err(AgentError::OutOfScope(_))));
    }
}
