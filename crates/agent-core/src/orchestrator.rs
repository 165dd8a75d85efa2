//! Turn-taking Orchestrator
//!
//! Drives one run: ask the active agent for a message, append it, pick the
//! next agent from the [`TransitionTable`], repeat until no rule fires or
//! the round budget is spent.
//!
//! ```text
//!   seed ──► table ──► agent.step(transcript) ──► append ──► table ──► ...
//!                                                              │
//!                                      no eligible rule ◄──────┘ ──► stop
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::message::{AgentId, Message, Transcript};
use crate::protocol::{self, Reply};
use crate::transition::{Selection, TransitionRule, TransitionTable};

/// Why a run stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Still running
    None,
    /// No rule fired and the last message carried its sender's terminal sentinel
    Completed,
    /// The round budget ran out before a natural stop
    MaxRoundsExceeded,
    /// No rule fired and the run did not reach a terminal sentinel
    NoTransitionMatched,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::None => write!(f, "none"),
            TerminationReason::Completed => write!(f, "completed"),
            TerminationReason::MaxRoundsExceeded => write!(f, "max-rounds-exceeded"),
            TerminationReason::NoTransitionMatched => write!(f, "no-transition-matched"),
        }
    }
}

/// Last message broke the tool/sentinel convention
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtocolViolation {
    /// Tool request and completion sentinel in one message
    ToolRequestWithSentinel { agent: AgentId, sentinel: String },
    /// Neither a tool request nor a known sentinel
    Unrecognized { agent: AgentId },
}

/// Mutable bookkeeping of one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunState {
    /// Agent that runs next (or ran last, once terminated)
    pub active: AgentId,
    /// How often each rule fired, indexed like the transition table
    pub rule_counts: Vec<u32>,
    /// Completed agent steps, the seed excluded
    pub rounds: usize,
    pub termination: TerminationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation: Option<ProtocolViolation>,
}

impl RunState {
    fn new(start: AgentId, rules: usize) -> Self {
        Self {
            active: start,
            rule_counts: vec![0; rules],
            rounds: 0,
            termination: TerminationReason::None,
            violation: None,
        }
    }
}

/// Transcript and final state of a finished run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub transcript: Transcript,
    pub state: RunState,
}

impl RunResult {
    pub fn termination(&self) -> TerminationReason {
        self.state.termination
    }
    
    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }
    
    /// Whether the run stopped on a terminal sentinel
    pub fn ended_with_sentinel(&self) -> bool {
        self.state.termination == TerminationReason::Completed
    }
    
    pub fn protocol_violation(&self) -> Option<&ProtocolViolation> {
        self.state.violation.as_ref()
    }
}

/// Runs agents one at a time according to a transition table
pub struct Orchestrator {
    agents: HashMap<AgentId, Arc<dyn Agent>>,
    table: TransitionTable,
    start: AgentId,
    sentinels: HashMap<AgentId, Vec<String>>,
    terminal: HashMap<AgentId, String>,
}

impl Orchestrator {
    pub fn builder(start: impl Into<AgentId>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(start)
    }
    
    pub fn table(&self) -> &TransitionTable {
        &self.table
    }
    
    pub fn start_agent(&self) -> &AgentId {
        &self.start
    }
    
    /// Run with `initial_message` as the seed from the starting agent
    pub async fn run(&self, initial_message: impl Into<String>, max_rounds: usize) -> Result<RunResult> {
        let seed = Message::new(self.start.clone(), initial_message);
        self.drive(seed, max_rounds).await
    }
    
    /// Run with the seed produced by the starting agent itself
    pub async fn start(&self, max_rounds: usize) -> Result<RunResult> {
        let seed = self.agent(&self.start)?.step(&Transcript::new()).await?;
        self.drive(seed, max_rounds).await
    }
    
    fn agent(&self, id: &AgentId) -> Result<&Arc<dyn Agent>> {
        self.agents
            .get(id)
            .ok_or_else(|| AgentError::Config(format!("Unknown agent: {}", id)))
    }
    
    async fn drive(&self, seed: Message, max_rounds: usize) -> Result<RunResult> {
        let mut transcript = Transcript::new();
        let mut state = RunState::new(self.start.clone(), self.table.len());
        
        tracing::info!(start = %self.start, max_rounds, rules = self.table.len(), "Starting run");
        
        transcript.push(seed);
        let mut running = self.advance(&mut state, &transcript);
        
        while running {
            if state.rounds >= max_rounds {
                state.termination = TerminationReason::MaxRoundsExceeded;
                tracing::warn!(rounds = state.rounds, next = %state.active, "Round budget exhausted");
                break;
            }
            
            let agent = self.agent(&state.active)?;
            let message = agent.step(&transcript).await?;
            state.rounds += 1;
            
            tracing::debug!(
                round = state.rounds,
                agent = %state.active,
                chars = message.content.len(),
                tool_call = message.tool_call.as_ref().map(|c| c.name.as_str()),
                "Step completed"
            );
            
            transcript.push(message);
            running = self.advance(&mut state, &transcript);
        }
        
        tracing::info!(
            termination = %state.termination,
            rounds = state.rounds,
            messages = transcript.len(),
            "Run finished"
        );
        
        Ok(RunResult { transcript, state })
    }
    
    /// Fire the next rule for the last message; false once the run stops
    fn advance(&self, state: &mut RunState, transcript: &Transcript) -> bool {
        let Some(message) = transcript.last() else {
            state.termination = TerminationReason::NoTransitionMatched;
            return false;
        };
        let from = state.active.clone();
        
        match self.table.select(&from, message, &state.rule_counts) {
            Selection::Fire(index) => {
                state.rule_counts[index] += 1;
                let rule: &TransitionRule = &self.table.rules()[index];
                tracing::debug!(rule = %rule.label, fired = state.rule_counts[index], "Transition");
                state.active = rule.to.clone();
                true
            }
            selection => {
                if selection == Selection::Exhausted {
                    tracing::info!(agent = %from, "Repeat budget exhausted for every matching rule");
                }
                self.stop(state, &from, message);
                false
            }
        }
    }
    
    fn stop(&self, state: &mut RunState, from: &AgentId, message: &Message) {
        let terminal = self
            .terminal
            .get(from)
            .is_some_and(|s| protocol::contains_sentinel(message, s) && !protocol::requests_tool(message));
        
        state.termination = if terminal {
            TerminationReason::Completed
        } else {
            TerminationReason::NoTransitionMatched
        };
        
        let Some(sentinels) = self.sentinels.get(from) else {
            return;
        };
        state.violation = match protocol::classify(message, sentinels) {
            Reply::Ambiguous(sentinel) => Some(ProtocolViolation::ToolRequestWithSentinel {
                agent: from.clone(),
                sentinel,
            }),
            Reply::Plain => Some(ProtocolViolation::Unrecognized { agent: from.clone() }),
            Reply::ToolRequest | Reply::Completion(_) => None,
        };
        
        if let Some(violation) = &state.violation {
            tracing::warn!(?violation, "Protocol violation, stopping run");
        }
    }
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    start: AgentId,
    agents: HashMap<AgentId, Arc<dyn Agent>>,
    table: TransitionTable,
    sentinels: HashMap<AgentId, Vec<String>>,
    terminal: HashMap<AgentId, String>,
}

impl OrchestratorBuilder {
    pub fn new(start: impl Into<AgentId>) -> Self {
        Self {
            start: start.into(),
            agents: HashMap::new(),
            table: TransitionTable::new(),
            sentinels: HashMap::new(),
            terminal: HashMap::new(),
        }
    }
    
    pub fn agent<A: Agent + 'static>(self, agent: A) -> Self {
        self.shared_agent(Arc::new(agent))
    }
    
    pub fn shared_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(agent.id().clone(), agent);
        self
    }
    
    pub fn rule(mut self, rule: TransitionRule) -> Self {
        self.table.push(rule);
        self
    }
    
    pub fn table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }
    
    /// Sentinel `agent` may emit to close a phase; used to report violations
    pub fn sentinel(mut self, agent: impl Into<AgentId>, sentinel: impl Into<String>) -> Self {
        self.sentinels.entry(agent.into()).or_default().push(sentinel.into());
        self
    }
    
    /// Sentinel after which a stop with no outgoing rule counts as completed
    pub fn terminal_sentinel(mut self, agent: impl Into<AgentId>, sentinel: impl Into<String>) -> Self {
        let agent = agent.into();
        let sentinel = sentinel.into();
        self.sentinels.entry(agent.clone()).or_default().push(sentinel.clone());
        self.terminal.insert(agent, sentinel);
        self
    }
    
    pub fn build(self) -> Result<Orchestrator> {
        if !self.agents.contains_key(&self.start) {
            return Err(AgentError::Config(format!("Start agent '{}' is not registered", self.start)));
        }
        
        for rule in self.table.rules() {
            for id in [&rule.from, &rule.to] {
                if !self.agents.contains_key(id) {
                    return Err(AgentError::Config(format!(
                        "Rule '{}' names unregistered agent '{}'",
                        rule.label, id
                    )));
                }
            }
        }
        
        Ok(Orchestrator {
            agents: self.agents,
            table: self.table,
            start: self.start,
            sentinels: self.sentinels,
            terminal: self.terminal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Initiator, ToolExecutionAgent};
    use crate::tool::{ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
    use crate::transition::when;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies with scripted messages, repeating the last one when exhausted
    struct Scripted {
        id: AgentId,
        replies: Mutex<VecDeque<String>>,
        last: String,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(id: &str, replies: &[&str]) -> Self {
            Self {
                id: id.into(),
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
                last: replies.last().map(|s| s.to_string()).unwrap_or_default(),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Agent for Scripted {
        fn id(&self) -> &AgentId {
            &self.id
        }

        async fn step(&self, _transcript: &Transcript) -> Result<Message> {
            *self.calls.lock().unwrap() += 1;
            let text = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| self.last.clone());
            Ok(Message::new(self.id.clone(), text))
        }
    }

    struct Failing;

    #[async_trait]
    impl Agent for Failing {
        fn id(&self) -> &AgentId {
            static ID: once_cell::sync::Lazy<AgentId> = once_cell::sync::Lazy::new(|| AgentId::from("broken"));
            &ID
        }

        async fn step(&self, _transcript: &Transcript) -> Result<Message> {
            Err(AgentError::Provider("connection refused".into()))
        }
    }

    struct ListTool;

    #[async_trait]
    impl Tool for ListTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "read_folder_structure".into(),
                description: "List".into(),
                parameters: vec![ParameterSchema::string("path", "Folder", true)],
                has_side_effects: false,
            }
        }

        async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
            Ok(ToolResult::success("read_folder_structure", "app/\n└── main.py\n"))
        }
    }

    fn tools() -> ToolExecutionAgent {
        let mut registry = ToolRegistry::new();
        registry.register(ListTool);
        ToolExecutionAgent::new("tools", Arc::new(registry))
    }

    fn pipeline(analyzer: Scripted, generator: Scripted) -> Orchestrator {
        Orchestrator::builder("init")
            .agent(Initiator::new("init", "analyze ./app"))
            .agent(analyzer)
            .agent(generator)
            .agent(tools())
            .rule(TransitionRule::always("init", "analyzer"))
            .rule(TransitionRule::new("analyzer", "tools", when::tool_request(["ANALYSIS_COMPLETE"])))
            .rule(TransitionRule::new("tools", "analyzer", when::tool_result_for("analyzer")))
            .rule(TransitionRule::new("analyzer", "generator", when::completed("ANALYSIS_COMPLETE")))
            .rule(TransitionRule::new("generator", "tools", when::tool_request(["SCRIPTS_GENERATED"])))
            .rule(TransitionRule::new("tools", "generator", when::tool_result_for("generator")))
            .sentinel("analyzer", "ANALYSIS_COMPLETE")
            .terminal_sentinel("generator", "SCRIPTS_GENERATED")
            .build()
            .unwrap()
    }

    const LIST: &str = "NEED_TOOL\nTool: {read_folder_structure}\n{\"path\": \"app\"}";

    #[tokio::test]
    async fn test_analysis_then_handoff_to_generator() {
        let orchestrator = pipeline(
            Scripted::new("analyzer", &[LIST, "Needs a VM.\nANALYSIS_COMPLETE"]),
            Scripted::new("generator", &[LIST]),
        );

        let result = orchestrator.run("analyze ./app", 4).await.unwrap();
        let senders: Vec<_> = result.transcript.iter().map(|m| m.sender.as_str()).collect();
        assert_eq!(senders, ["init", "analyzer", "tools", "analyzer", "generator"]);
        assert!(result.transcript.messages()[2].content.contains("└── main.py"));
        assert_eq!(result.state.rounds, 4);
        assert_eq!(result.termination(), TerminationReason::MaxRoundsExceeded);
        // the generator's tool request was routed but never served
        assert_eq!(result.state.active.as_str(), "tools");
        assert!(result.protocol_violation().is_none());
    }

    #[tokio::test]
    async fn test_terminal_sentinel_completes_run() {
        let orchestrator = pipeline(
            Scripted::new("analyzer", &["ANALYSIS_COMPLETE"]),
            Scripted::new("generator", &[LIST, "All files written. SCRIPTS_GENERATED"]),
        );

        let result = orchestrator.start(20).await.unwrap();
        assert_eq!(result.termination(), TerminationReason::Completed);
        assert!(result.ended_with_sentinel());
        assert!(result.protocol_violation().is_none());
        assert_eq!(result.transcript.messages()[0].content, "analyze ./app");
        // one message per step, plus the seed
        assert_eq!(result.transcript.len(), result.state.rounds + 1);
    }

    #[tokio::test]
    async fn test_round_budget() {
        let orchestrator = pipeline(
            Scripted::new("analyzer", &["ANALYSIS_COMPLETE"]),
            Scripted::new("generator", &[LIST]),
        );

        let result = orchestrator.run("go", 10).await.unwrap();
        assert_eq!(result.termination(), TerminationReason::MaxRoundsExceeded);
        assert_eq!(result.state.rounds, 10);
        assert_eq!(result.transcript.len(), 11);

        let none = orchestrator.run("go", 0).await.unwrap();
        assert_eq!(none.termination(), TerminationReason::MaxRoundsExceeded);
        assert_eq!(none.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_request_with_sentinel_is_a_violation() {
        let both = format!("{}\nANALYSIS_COMPLETE", LIST);
        let orchestrator = pipeline(
            Scripted::new("analyzer", &[both.as_str()]),
            Scripted::new("generator", &["unused"]),
        );

        let result = orchestrator.run("go", 10).await.unwrap();
        assert_eq!(result.termination(), TerminationReason::NoTransitionMatched);
        assert_eq!(result.transcript.len(), 2);
        assert_eq!(
            result.protocol_violation(),
            Some(&ProtocolViolation::ToolRequestWithSentinel {
                agent: "analyzer".into(),
                sentinel: "ANALYSIS_COMPLETE".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_plain_reply_stops_without_completion() {
        let orchestrator = pipeline(
            Scripted::new("analyzer", &["I am not sure what to do."]),
            Scripted::new("generator", &["unused"]),
        );

        let result = orchestrator.run("go", 10).await.unwrap();
        assert_eq!(result.termination(), TerminationReason::NoTransitionMatched);
        assert!(!result.ended_with_sentinel());
        assert!(matches!(result.protocol_violation(), Some(ProtocolViolation::Unrecognized { .. })));
    }

    #[tokio::test]
    async fn test_repeat_budget_caps_retries() {
        let runner = Scripted::new("runner", &["EXECUTION_ERROR"]);
        let generator = Scripted::new("generator", &["retrying SCRIPTS_GENERATED"]);
        let orchestrator = Orchestrator::builder("init")
            .agent(Initiator::new("init", "go"))
            .agent(generator)
            .agent(runner)
            .rule(TransitionRule::always("init", "generator"))
            .rule(TransitionRule::new("generator", "runner", when::completed("SCRIPTS_GENERATED")))
            .rule(TransitionRule::new("runner", "generator", when::contains("EXECUTION_ERROR")).max_repeats(3))
            .build()
            .unwrap();

        let result = orchestrator.run("go", 100).await.unwrap();
        assert_eq!(result.state.rule_counts, vec![1, 4, 3]);
        assert_eq!(result.termination(), TerminationReason::NoTransitionMatched);
        assert_eq!(result.last_message().unwrap().sender.as_str(), "runner");
    }

    #[tokio::test]
    async fn test_agent_failure_is_fatal() {
        let orchestrator = Orchestrator::builder("init")
            .agent(Initiator::new("init", "go"))
            .agent(Failing)
            .rule(TransitionRule::always("init", "broken"))
            .build()
            .unwrap();

        let err = orchestrator.run("go", 5).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[test]
    fn test_build_rejects_unknown_agents() {
        let missing_start = Orchestrator::builder("init").build();
        assert!(matches!(missing_start, Err(AgentError::Config(_))));

        let missing_target = Orchestrator::builder("init")
            .agent(Initiator::new("init", "go"))
            .rule(TransitionRule::always("init", "ghost"))
            .build();
        assert!(matches!(missing_target, Err(AgentError::Config(msg)) if msg.contains("ghost")));
    }
}
