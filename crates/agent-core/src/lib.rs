//! # agent-core
//!
//! Turn-taking orchestration for a small set of cooperating LLM agents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                           │
//! │  ┌──────────────┐  ┌─────────────────┐  ┌─────────────────┐   │
//! │  │  Transition  │  │     Agents      │  │   Transcript    │   │
//! │  │    Table     │──│ (Initiator,     │──│  (append-only)  │   │
//! │  │ (first match)│  │  Generative,    │  │                 │   │
//! │  └──────────────┘  │  ToolExecution) │  └─────────────────┘   │
//! │                    └───────┬─────────┘                        │
//! │                  LlmProvider │ ToolRegistry                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exactly one agent is active at a time. After each step the transition
//! table decides who runs next, based only on the message just produced.

pub mod agent;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod protocol;
pub mod provider;
pub mod tool;
pub mod transition;

pub use agent::{Agent, GenerativeAgent, Initiator, ToolExecutionAgent};
pub use error::{AgentError, Result};
pub use message::{AgentId, Message, Transcript};
pub use orchestrator::{
    Orchestrator, OrchestratorBuilder, ProtocolViolation, RunResult, RunState, TerminationReason,
};
pub use provider::{ChatMessage, GenerationOptions, LlmProvider, Role};
pub use tool::{ContentBlock, Tool, ToolCall, ToolOutput, ToolRegistry, ToolResult, ToolSchema};
pub use transition::{TransitionRule, TransitionTable};
