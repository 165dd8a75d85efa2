//! OpenAI-compatible Provider
//!
//! Talks to any `/chat/completions` endpoint. Images are sent as
//! `image_url` content parts; native tool calls in the response are mapped
//! onto [`ToolCall`]s.

use std::collections::HashMap;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    provider::{
        ChatMessage, Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo,
        ProviderInfo, TokenUsage,
    },
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

/// OpenAI-compatible endpoint configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    
    /// Bearer token; empty for local gateways that need none
    pub api_key: String,
    
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            timeout_secs: 300,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OPENAI_API_BASE").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            ..defaults
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        
        // Only add auth header if an API key is provided
        if !config.api_key.is_empty() {
            let auth = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| AgentError::Config(format!("Invalid API key format: {}", e)))?;
            headers.insert(header::AUTHORIZATION, auth);
        }
        
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to create HTTP client: {}", e)))?;
        
        Ok(Self { client, config })
    }
    
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiConfig::from_env())
    }
    
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
    
    /// Serialize one chat message; images turn the content into parts
    fn convert_message(message: &ChatMessage) -> Value {
        if message.images.is_empty() {
            return json!({ "role": message.role.to_string(), "content": message.content });
        }
        
        let mut parts = vec![json!({ "type": "text", "text": message.content })];
        parts.extend(message.images.iter().map(|image| {
            json!({
                "type": "image_url",
                "image_url": { "url": image.data_url(), "detail": "auto" }
            })
        }));
        json!({ "role": message.role.to_string(), "content": parts })
    }
    
    fn build_request(messages: &[ChatMessage], options: &GenerationOptions) -> Value {
        let mut body = json!({
            "model": options.model,
            "messages": messages.iter().map(Self::convert_message).collect::<Vec<_>>(),
            "temperature": options.temperature,
            "top_p": options.top_p,
            "max_tokens": options.max_tokens,
        });
        if !options.stop_sequences.is_empty() {
            body["stop"] = json!(options.stop_sequences);
        }
        if !options.tools.is_empty() {
            body["tools"] = json!(options.tools.iter().map(Self::convert_tool_schema).collect::<Vec<_>>());
        }
        body
    }
    
    fn convert_tool_schema(schema: &ToolSchema) -> Value {
        let properties: serde_json::Map<String, Value> = schema
            .parameters
            .iter()
            .map(|p| (p.name.clone(), json!({ "type": p.param_type, "description": p.description })))
            .collect();
        let required: Vec<&str> = schema
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        
        json!({
            "type": "function",
            "function": {
                "name": schema.name,
                "description": schema.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                },
            },
        })
    }
    
    /// Arguments that are not a JSON object are kept on the call as an
    /// argument error so the executor answers with a failed result.
    fn convert_tool_call(call: ResponseToolCall) -> ToolCall {
        let raw = call.function.arguments.trim();
        let parsed = if raw.is_empty() {
            Ok(HashMap::new())
        } else {
            serde_json::from_str::<HashMap<String, Value>>(raw)
        };
        
        let mut tool_call = ToolCall::new(call.function.name);
        tool_call.id = call.id;
        match parsed {
            Ok(arguments) => tool_call.arguments = arguments,
            Err(e) => {
                tracing::warn!(tool = %tool_call.name, "Provider returned unparseable tool arguments: {}", e);
                tool_call.argument_error = Some(e.to_string());
            }
        }
        tool_call
    }
    
    fn convert_completion(response: CompletionResponse, requested_model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("Response contained no choices".into()))?;
        
        let finish_reason = choice.finish_reason.as_deref().map(|r| match r {
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolUse,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        });
        
        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(Self::convert_tool_call)
            .collect();
        
        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or_else(|| requested_model.to_string()),
            tool_calls,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason,
        })
    }
}

fn status_error(status: StatusCode, body: String) -> AgentError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(body),
        s if s.is_server_error() => AgentError::ProviderUnavailable(format!("{}: {}", s, body)),
        s => AgentError::Provider(format!("{}: {}", s, body)),
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();
        
        Ok(ProviderInfo {
            name: "OpenAI-compatible".into(),
            models,
            supports_vision: true,
            supports_tools: true,
        })
    }
    
    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("models")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("OpenAI-compatible health check failed: {}", e);
                Ok(false)
            }
        }
    }
    
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(messages, options);
        
        let response = self.client
            .post(self.url("chat/completions"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;
        
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }
        
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Malformed completion response: {}", e)))?;
        
        Self::convert_completion(parsed, &options.model)
    }
    
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self.client
            .get(self.url("models"))
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;
        
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }
        
        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;
        
        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                name: m.id.clone(),
                id: m.id,
                context_length: None,
            })
            .collect())
    }
}
