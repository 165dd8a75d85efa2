//! Image Extraction Tool
//!
//! Sends an architecture diagram to a vision-capable model and returns its
//! textual description of the infrastructure.

use std::sync::Arc;
use async_trait::async_trait;

use agent_core::{
    ChatMessage, GenerationOptions, LlmProvider, Tool, ToolSchema, ToolCall, ToolResult,
    provider::ImageInput,
    tool::ParameterSchema,
    AgentError,
    Result as CoreResult,
};

use super::EXTRACT_INFRASTRUCTURE_FROM_IMAGE;
use crate::gateway::ToolGateway;
use crate::prompts;

pub struct ExtractInfrastructureTool {
    gateway: Arc<ToolGateway>,
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
}

impl ExtractInfrastructureTool {
    pub fn new(
        gateway: Arc<ToolGateway>,
        provider: Arc<dyn LlmProvider>,
        options: GenerationOptions,
    ) -> Self {
        Self { gateway, provider, options }
    }
}

#[async_trait]
impl Tool for ExtractInfrastructureTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: EXTRACT_INFRASTRUCTURE_FROM_IMAGE.into(),
            description: "Describe the cloud infrastructure shown in an architecture diagram image from the source repository.".into(),
            parameters: vec![
                ParameterSchema::string("image_path", "Image file, relative to the source repository root", true)
                    .alias("path"),
                ParameterSchema::string("text_content", "Optional context to focus the description", false),
            ],
            has_side_effects: false,
        }
    }
    
    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = call.required_str(&["image_path", "path"])?;
        let hint = call.str_arg(&["text_content"]);
        
        let (media_type, data) = self.gateway.read_image(path).await?;
        
        let messages = [
            ChatMessage::system(prompts::IMAGE_DESCRIBER),
            ChatMessage::user(prompts::image_request(hint))
                .with_image(ImageInput { media_type, data }),
        ];
        
        tracing::debug!(path, model = %self.options.model, "Describing architecture diagram");
        
        let completion = self.provider.complete(&messages, &self.options).await?;
        if completion.content.trim().is_empty() {
            return Err(AgentError::ToolExecution(format!(
                "No description returned for {}",
                path
            )));
        }
        
        Ok(ToolResult::success(EXTRACT_INFRASTRUCTURE_FROM_IMAGE, completion.content))
    }
}
