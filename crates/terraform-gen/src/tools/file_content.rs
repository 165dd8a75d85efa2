//! File Content Tool

use std::sync::Arc;
use async_trait::async_trait;

use agent_core::{
    ContentBlock, Tool, ToolSchema, ToolCall, ToolResult,
    tool::ParameterSchema,
    Result as CoreResult,
};

use super::GET_FILE_CONTENT;
use crate::gateway::{FileContent, ToolGateway};

/// Reads a source file. Images come back as an image block so a
/// vision-capable model can look at them directly.
pub struct GetFileContentTool {
    gateway: Arc<ToolGateway>,
}

impl GetFileContentTool {
    pub fn new(gateway: Arc<ToolGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for GetFileContentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: GET_FILE_CONTENT.into(),
            description: "Get the content of a file in the source repository. Image files are returned as images.".into(),
            parameters: vec![
                ParameterSchema::string("path", "File to read, relative to the source repository root", true)
                    .alias("file_path"),
            ],
            has_side_effects: false,
        }
    }
    
    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = call.required_str(&["path", "file_path"])?;
        
        match self.gateway.read_file(path).await? {
            FileContent::Text(text) => Ok(ToolResult::success(GET_FILE_CONTENT, text)),
            FileContent::Image { media_type, data } => Ok(ToolResult::blocks(
                GET_FILE_CONTENT,
                vec![
                    ContentBlock::Text { text: format!("Image file {}", path) },
                    ContentBlock::Image { media_type, data },
                ],
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_and_image_files() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("app.py"), "import flask").unwrap();
        std::fs::write(source.path().join("arch.jpg"), [0xff, 0xd8, 0xff]).unwrap();
        let tool = GetFileContentTool::new(Arc::new(ToolGateway::new(source.path(), dest.path()).unwrap()));

        let text = tool.execute(&ToolCall::new(GET_FILE_CONTENT).with_arg("file_path", "app.py")).await.unwrap();
        assert_eq!(text.render(), "import flask");

        let image = tool.execute(&ToolCall::new(GET_FILE_CONTENT).with_arg("path", "arch.jpg")).await.unwrap();
        assert_eq!(image.images().len(), 1);
        assert_eq!(image.images()[0].data_url().unwrap(), "data:image/jpeg;base64,/9j/");
    }
}
