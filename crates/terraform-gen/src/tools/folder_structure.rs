//! Folder Structure Tool

use std::sync::Arc;
use async_trait::async_trait;

use agent_core::{
    Tool, ToolSchema, ToolCall, ToolResult,
    tool::ParameterSchema,
    Result as CoreResult,
};

use super::READ_FOLDER_STRUCTURE;
use crate::gateway::ToolGateway;

/// Renders the source tree, one entry per line
pub struct ReadFolderStructureTool {
    gateway: Arc<ToolGateway>,
}

impl ReadFolderStructureTool {
    pub fn new(gateway: Arc<ToolGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for ReadFolderStructureTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: READ_FOLDER_STRUCTURE.into(),
            description: "Read the folder structure of a directory in the source repository, recursively, as an indented tree.".into(),
            parameters: vec![
                ParameterSchema::string("path", "Directory to list, relative to the source repository root", true),
            ],
            has_side_effects: false,
        }
    }
    
    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = call.required_str(&["path"])?;
        let tree = self.gateway.list_tree(path)?;
        Ok(ToolResult::success(READ_FOLDER_STRUCTURE, tree.trim_end()))
    }
}
