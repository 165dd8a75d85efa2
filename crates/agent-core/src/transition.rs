//! Transition Table
//!
//! Ordered handoff rules. After each step the orchestrator asks the table
//! which agent runs next; the first eligible rule in declaration order wins.

use std::fmt;
use std::sync::Arc;

use crate::message::{AgentId, Message};

/// Pure predicate over the message that was just produced
pub type Predicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// A single edge: `from` hands off to `to` when `predicate` holds
#[derive(Clone)]
pub struct TransitionRule {
    pub from: AgentId,
    pub to: AgentId,
    predicate: Predicate,
    /// How many times this rule may fire in one run
    pub max_repeats: Option<u32>,
    pub label: String,
}

impl TransitionRule {
    pub fn new<F>(from: impl Into<AgentId>, to: impl Into<AgentId>, predicate: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        let from = from.into();
        let to = to.into();
        Self {
            label: format!("{} -> {}", from, to),
            from,
            to,
            predicate: Arc::new(predicate),
            max_repeats: None,
        }
    }
    
    /// Unconditional handoff
    pub fn always(from: impl Into<AgentId>, to: impl Into<AgentId>) -> Self {
        Self::new(from, to, |_| true)
    }
    
    pub fn max_repeats(mut self, max: u32) -> Self {
        self.max_repeats = Some(max);
        self
    }
    
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
    
    pub fn matches(&self, message: &Message) -> bool {
        (self.predicate)(message)
    }
    
    fn has_budget(&self, fired: u32) -> bool {
        self.max_repeats.is_none_or(|max| fired < max)
    }
}

impl fmt::Debug for TransitionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRule")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("max_repeats", &self.max_repeats)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Outcome of evaluating the table for one message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Index of the rule to fire
    Fire(usize),
    /// At least one rule matched but all matching rules are out of repeats
    Exhausted,
    /// No rule from this agent matched
    NoMatch,
}

/// Ordered rule list
#[derive(Clone, Debug, Default)]
pub struct TransitionTable {
    rules: Vec<TransitionRule>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn rule(mut self, rule: TransitionRule) -> Self {
        self.rules.push(rule);
        self
    }
    
    pub fn push(&mut self, rule: TransitionRule) {
        self.rules.push(rule);
    }
    
    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }
    
    pub fn len(&self) -> usize {
        self.rules.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
    
    /// Pick the rule to fire for `message` just produced by `from`.
    ///
    /// `fired[i]` is how often rule `i` has fired so far in this run.
    pub fn select(&self, from: &AgentId, message: &Message, fired: &[u32]) -> Selection {
        let mut exhausted = false;
        
        for (index, rule) in self.rules.iter().enumerate() {
            if &rule.from != from || !rule.matches(message) {
                continue;
            }
            if rule.has_budget(fired.get(index).copied().unwrap_or(0)) {
                return Selection::Fire(index);
            }
            exhausted = true;
        }
        
        if exhausted {
            Selection::Exhausted
        } else {
            Selection::NoMatch
        }
    }
}

/// Common predicates over the textual protocol
pub mod when {
    use crate::message::{AgentId, Message};
    use crate::protocol;

    /// Tool request without any of `sentinels`
    pub fn tool_request<S: Into<String>>(sentinels: impl IntoIterator<Item = S>) -> impl Fn(&Message) -> bool + Send + Sync + 'static {
        let sentinels: Vec<String> = sentinels.into_iter().map(Into::into).collect();
        move |m| protocol::requests_tool(m) && !sentinels.iter().any(|s| protocol::contains_sentinel(m, s))
    }

    /// `sentinel` present and no tool request
    pub fn completed(sentinel: impl Into<String>) -> impl Fn(&Message) -> bool + Send + Sync + 'static {
        let sentinel = sentinel.into();
        move |m| protocol::contains_sentinel(m, &sentinel) && !protocol::requests_tool(m)
    }

    /// `marker` present anywhere in the text
    pub fn contains(marker: impl Into<String>) -> impl Fn(&Message) -> bool + Send + Sync + 'static {
        let marker = marker.into();
        move |m| m.content.contains(&marker)
    }

    /// Tool executor reply addressed to `agent`
    pub fn tool_result_for(agent: impl Into<AgentId>) -> impl Fn(&Message) -> bool + Send + Sync + 'static {
        let agent = agent.into();
        move |m| protocol::is_tool_result_for(m, &agent)
    }
}
