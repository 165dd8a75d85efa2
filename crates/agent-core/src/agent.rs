//! Agents
//!
//! One capability, `step`: read the transcript, produce exactly one message.
//! Implementations are picked at construction time:
//!
//! - [`Initiator`] replays a fixed seed message
//! - [`GenerativeAgent`] asks an [`LlmProvider`] for the next message
//! - [`ToolExecutionAgent`] runs the tool the previous message asked for

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{AgentId, Message, Transcript};
use crate::protocol;
use crate::provider::{ChatMessage, GenerationOptions, ImageInput, LlmProvider, Role};
use crate::tool::{ContentBlock, ToolRegistry, ToolResult};

/// A participant in an orchestrated run
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identity used by transition rules
    fn id(&self) -> &AgentId;
    
    /// Produce the next message. The transcript is read-only.
    async fn step(&self, transcript: &Transcript) -> Result<Message>;
}

/// Emits the fixed message it was built with
pub struct Initiator {
    id: AgentId,
    message: String,
}

impl Initiator {
    pub fn new(id: impl Into<AgentId>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Agent for Initiator {
    fn id(&self) -> &AgentId {
        &self.id
    }
    
    async fn step(&self, _transcript: &Transcript) -> Result<Message> {
        Ok(Message::new(self.id.clone(), self.message.clone()))
    }
}

/// Agent backed by a language model with a fixed role instruction
pub struct GenerativeAgent {
    id: AgentId,
    instruction: String,
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    max_context_tokens: Option<u32>,
}

impl GenerativeAgent {
    pub fn new(
        id: impl Into<AgentId>,
        instruction: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            id: id.into(),
            instruction: instruction.into(),
            provider,
            options,
            max_context_tokens: None,
        }
    }
    
    /// Drop the oldest turns (never the seed or the latest) once the rendered
    /// prompt exceeds this estimate
    pub fn with_context_limit(mut self, max_tokens: u32) -> Self {
        self.max_context_tokens = Some(max_tokens);
        self
    }
    
    pub fn instruction(&self) -> &str {
        &self.instruction
    }
    
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }
    
    /// Render the transcript from this agent's point of view
    fn render(&self, transcript: &Transcript) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatMessage::system(self.instruction.clone()));
        
        for message in transcript {
            let mut chat = match role_for(message, &self.id) {
                Role::Assistant => ChatMessage::assistant(message.content.clone()),
                _ => ChatMessage::user(format!("[{}]\n{}", message.sender, message.content)),
            };
            if message.reply_to.as_ref() == Some(&self.id) {
                if let Some(result) = &message.tool_result {
                    chat.images.extend(images_of(result));
                }
            }
            messages.push(chat);
        }
        
        if let Some(limit) = self.max_context_tokens {
            truncate_to_fit(&mut messages, limit, |text| self.provider.estimate_tokens(text));
        }
        
        messages
    }
}

fn images_of(result: &ToolResult) -> impl Iterator<Item = ImageInput> + '_ {
    result.images().into_iter().filter_map(|block| match block {
        ContentBlock::Image { media_type, data } => Some(ImageInput {
            media_type: media_type.clone(),
            data: data.clone(),
        }),
        ContentBlock::Text { .. } => None,
    })
}

/// Remove turns after the system prompt and seed until the estimate fits,
/// always keeping the most recent turn
fn truncate_to_fit(messages: &mut Vec<ChatMessage>, max_tokens: u32, estimate: impl Fn(&str) -> u32) {
    const KEEP_HEAD: usize = 2;
    let total = |msgs: &[ChatMessage]| msgs.iter().map(|m| estimate(&m.content) + 4).sum::<u32>();
    
    while total(messages) > max_tokens && messages.len() > KEEP_HEAD + 1 {
        messages.remove(KEEP_HEAD);
    }
}

#[async_trait]
impl Agent for GenerativeAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }
    
    async fn step(&self, transcript: &Transcript) -> Result<Message> {
        let prompt = self.render(transcript);
        tracing::debug!(agent = %self.id, messages = prompt.len(), model = %self.options.model, "Requesting completion");
        
        let completion = self.provider.complete(&prompt, &self.options).await?;
        
        if let Some(usage) = &completion.usage {
            tracing::debug!(agent = %self.id, total_tokens = usage.total_tokens, "Completion received");
        }
        
        let mut message = Message::new(self.id.clone(), completion.content);
        let mut tool_calls = completion.tool_calls.into_iter();
        if let Some(mut call) = tool_calls.next() {
            if call.id.is_none() {
                call.id = Some(uuid::Uuid::new_v4().to_string());
            }
            message = message.with_tool_call(call);
        }
        if tool_calls.len() > 0 {
            tracing::warn!(agent = %self.id, ignored = tool_calls.len(), "Only the first tool call of a completion is executed");
        }
        
        Ok(message)
    }
}

/// Runs tool requests found in the previous message
pub struct ToolExecutionAgent {
    id: AgentId,
    tools: Arc<ToolRegistry>,
}

impl ToolExecutionAgent {
    pub fn new(id: impl Into<AgentId>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            id: id.into(),
            tools,
        }
    }
    
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
    
    fn reply(&self, requester: Option<AgentId>, result: ToolResult) -> Message {
        let message = Message::new(self.id.clone(), protocol::envelope(&result));
        let message = message.with_tool_result(result);
        match requester {
            Some(agent) => message.reply_to(agent),
            None => message,
        }
    }
}

#[async_trait]
impl Agent for ToolExecutionAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }
    
    async fn step(&self, transcript: &Transcript) -> Result<Message> {
        let Some(request) = transcript.last() else {
            return Ok(self.reply(None, ToolResult::failure("unknown", "No tool request to execute")));
        };
        let requester = Some(request.sender.clone());
        
        let parsed = match &request.tool_call {
            Some(call) => Ok(call.clone()),
            None => protocol::parse_tool_request(&request.content),
        };
        let mut call = match parsed {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(requester = %request.sender, error = %e, "Unparsable tool request");
                return Ok(self.reply(requester, ToolResult::failure("unknown", e.to_string())));
            }
        };
        let id = call.id.get_or_insert_with(|| uuid::Uuid::new_v4().to_string()).clone();
        
        tracing::debug!(tool = %call.name, requester = %request.sender, "Executing tool");
        
        let result = match self.tools.execute(&call).await {
            Ok(result) => result.with_id(id),
            Err(e) => {
                if !e.is_tool_error() {
                    tracing::warn!(tool = %call.name, error = %e, "Tool failed");
                }
                ToolResult::failure(call.name.clone(), e.to_string()).with_id(id)
            }
        };
        
        Ok(self.reply(requester, result))
    }
}

/// Role the model sees for a transcript message, given the reading agent
pub fn role_for(message: &Message, reader: &AgentId) -> Role {
    if message.is_from(reader) {
        Role::Assistant
    } else {
        Role::User
    }
}
