//! Transcript Messages
//!
//! The append-only history every agent reads from. Each agent step
//! contributes exactly one [`Message`].

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::tool::{ToolCall, ToolResult};

/// Name of a participant in a run
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
    
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single message in a transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Agent that produced the message
    pub sender: AgentId,
    
    /// Text content
    pub content: String,
    
    /// Structured tool request, when the backend supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    
    /// Structured tool result (tool executor messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    
    /// Agent this message answers (tool and script results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<AgentId>,
    
    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: impl Into<AgentId>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            tool_call: None,
            tool_result: None,
            reply_to: None,
            timestamp: Utc::now(),
        }
    }
    
    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_call = Some(call);
        self
    }
    
    pub fn with_tool_result(mut self, result: ToolResult) -> Self {
        self.tool_result = Some(result);
        self
    }
    
    pub fn reply_to(mut self, agent: impl Into<AgentId>) -> Self {
        self.reply_to = Some(agent.into());
        self
    }
    
    pub fn is_from(&self, agent: &AgentId) -> bool {
        &self.sender == agent
    }
}

/// Ordered, append-only message history of one run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Append a message; recorded messages are never edited or removed
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
    
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
    
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
    
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
    
    pub fn len(&self) -> usize {
        self.messages.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::new("InitAgent", "Hello").reply_to("RequirementsAnalyzer");
        assert_eq!(msg.sender.as_str(), "InitAgent");
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.reply_to, Some(AgentId::from("RequirementsAnalyzer")));
    }

    #[test]
    fn test_transcript() {
        let analyzer = AgentId::from("RequirementsAnalyzer");
        let mut transcript = Transcript::new();
        transcript.push(Message::new("InitAgent", "Hi"));
        transcript.push(Message::new(analyzer.clone(), "first"));
        transcript.push(Message::new("ToolExecutor", "TOOL_RESULT"));

        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.last().unwrap().sender.as_str(), "ToolExecutor");
        assert_eq!(transcript.iter().filter(|m| m.is_from(&analyzer)).count(), 1);
    }
}
