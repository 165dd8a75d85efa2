//! Tool System
//!
//! Named, side-effecting operations that agents request by name with
//! structured arguments. Tools are registered once per run and executed
//! only by the tool-execution agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from an agent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,
    
    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
    
    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
    
    /// Set when the backend sent arguments that could not be decoded; the
    /// call is still routed so the requester sees an error result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_error: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: HashMap::new(),
            id: None,
            argument_error: None,
        }
    }
    
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
    
    /// First string argument found under any of `keys`
    pub fn str_arg(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|k| self.arguments.get(*k))
            .and_then(|v| v.as_str())
    }
    
    /// Like [`ToolCall::str_arg`] but fails with a validation error naming the first key
    pub fn required_str(&self, keys: &[&str]) -> Result<&str> {
        self.str_arg(keys).ok_or_else(|| {
            AgentError::ToolValidation(format!(
                "Missing required string parameter: {}",
                keys.first().copied().unwrap_or("?")
            ))
        })
    }
}

/// A typed piece of tool output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    /// Base64 encoded image, suitable for a vision-capable model
    Image { media_type: String, data: String },
}

impl ContentBlock {
    /// `data:` URL form of an image block
    pub fn data_url(&self) -> Option<String> {
        match self {
            ContentBlock::Image { media_type, data } => {
                Some(format!("data:{};base64,{}", media_type, data))
            }
            ContentBlock::Text { .. } => None,
        }
    }
}

/// Value returned by a tool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Error(String),
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,
    
    /// Call ID (if provided in request)
    pub id: Option<String>,
    
    /// Output (text, content blocks or error)
    pub output: ToolOutput,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            output: ToolOutput::Text(output.into()),
        }
    }
    
    pub fn blocks(name: impl Into<String>, blocks: Vec<ContentBlock>) -> Self {
        Self {
            name: name.into(),
            id: None,
            output: ToolOutput::Blocks(blocks),
        }
    }
    
    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            output: ToolOutput::Error(error.into()),
        }
    }
    
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
    
    pub fn is_success(&self) -> bool {
        !matches!(self.output, ToolOutput::Error(_))
    }
    
    /// Image blocks carried by this result
    pub fn images(&self) -> Vec<&ContentBlock> {
        match &self.output {
            ToolOutput::Blocks(blocks) => blocks
                .iter()
                .filter(|b| matches!(b, ContentBlock::Image { .. }))
                .collect(),
            _ => Vec::new(),
        }
    }
    
    /// Text form of the output. Text is passed through untouched; images are
    /// summarized because their bytes travel separately.
    pub fn render(&self) -> String {
        match &self.output {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Error(error) => error.clone(),
            ToolOutput::Blocks(blocks) => blocks
                .iter()
                .map(|b| match b {
                    ContentBlock::Text { text } => text.clone(),
                    ContentBlock::Image { media_type, data } => {
                        format!("[image {} ({} base64 chars)]", media_type, data.len())
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,
    
    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,
    
    /// Human-readable description
    pub description: String,
    
    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
    
    /// Alternative names accepted for this parameter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl ParameterSchema {
    pub fn string(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required,
            aliases: Vec::new(),
        }
    }
    
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// Tool definition schema (shown to the model in its instructions)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,
    
    /// Human-readable description
    pub description: String,
    
    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
    
    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;
    
    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
    
    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();
        
        for param in schema.parameters.iter().filter(|p| p.required) {
            let present = call.arguments.contains_key(&param.name)
                || param.aliases.iter().any(|a| call.arguments.contains_key(a));
            if !present {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }
        
        Ok(())
    }
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }
    
    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let schema = tool.schema();
        self.tools.insert(schema.name.clone(), Arc::new(tool));
    }
    
    /// Register a shared tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name.clone(), tool);
    }
    
    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
    
    /// Execute a tool call
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self.get(&call.name).ok_or_else(|| {
            AgentError::ToolNotFound(call.name.clone())
        })?;
        
        if let Some(error) = &call.argument_error {
            return Err(AgentError::ToolValidation(format!(
                "Invalid arguments for {}: {}",
                call.name, error
            )));
        }
        
        tool.validate(call)?;
        
        tool.execute(call).await
    }
    
    /// All tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }
    
    /// Schemas of the named tools, sorted by name. Unknown names are skipped.
    pub fn schemas_for(&self, only: &[&str]) -> Vec<ToolSchema> {
        self.schemas()
            .into_iter()
            .filter(|s| only.contains(&s.name.as_str()))
            .collect()
    }
    
    /// Tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
    
    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }
    
    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
    
    /// Prompt section describing the named tools and how to request them.
    /// Unknown names are skipped.
    pub fn generate_prompt_section(&self, only: &[&str]) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str(&format!(
            "To request a tool, start your response with \"{}\", followed by the tool name and a JSON object of arguments:\n\n",
            crate::protocol::TOOL_MARKER
        ));
        prompt.push_str(&format!(
            "{}\nTool: {{tool_name}}\n{{\"arg\": \"value\"}}\n\n",
            crate::protocol::TOOL_MARKER
        ));
        
        for schema in self.schemas_for(only) {
            prompt.push_str(&format!("### {}\n", schema.name));
            prompt.push_str(&format!("{}\n", schema.description));
            
            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    prompt.push_str(&format!(
                        "- `{}` ({}){}: {}\n",
                        param.name, param.param_type, required, param.description
                    ));
                }
            }
            prompt.push('\n');
        }
        
        prompt
    }
}
