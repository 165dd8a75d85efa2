//! Textual Agent Protocol
//!
//! Models signal "I need a tool" and "this phase is done" through plain
//! text: a leading `NEED_TOOL` marker followed by a tool name and a JSON
//! argument object, and phase sentinels such as `ANALYSIS_COMPLETE`.
//! Backends that return structured tool calls bypass the text parsing; the
//! textual form is kept for models that cannot.
//!
//! ```text
//! NEED_TOOL
//! Tool: {read_folder_structure}
//! {"path": "/path/to/folder"}
//! ```

use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::{AgentId, Message};
use crate::tool::{ToolCall, ToolResult};

/// Marker that opens a textual tool request
pub const TOOL_MARKER: &str = "NEED_TOOL";

/// Marker that opens every tool executor reply
pub const TOOL_RESULT: &str = "TOOL_RESULT";

const FENCED_TOOL: &str = "```tool";

static MARKER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t>*_`]*NEED_TOOL\b").expect("valid marker regex")
});

static TOOL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s:*`_]*(?:Tool\b[ \t*`_]*:?[ \t*`_]*)?\{?[ \t]*([A-Za-z_][A-Za-z0-9_\-]*)[ \t]*\}?")
        .expect("valid tool name regex")
});

/// How a message reads against the protocol
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Asks for a tool and carries no sentinel
    ToolRequest,
    /// Carries the given sentinel and no tool request
    Completion(String),
    /// Asks for a tool and also claims completion
    Ambiguous(String),
    /// Neither a tool request nor a known sentinel
    Plain,
}

/// Whether `text` contains a textual tool request
pub fn has_tool_marker(text: &str) -> bool {
    MARKER_LINE.is_match(text) || text.contains(FENCED_TOOL)
}

/// Whether the message asks for a tool, structurally or textually
pub fn requests_tool(message: &Message) -> bool {
    message.tool_call.is_some() || has_tool_marker(&message.content)
}

pub fn contains_sentinel(message: &Message, sentinel: &str) -> bool {
    message.content.contains(sentinel)
}

/// Classify a message against the sentinels its sender may emit
pub fn classify<S: AsRef<str>>(message: &Message, sentinels: &[S]) -> Reply {
    let sentinel = sentinels
        .iter()
        .map(AsRef::as_ref)
        .find(|s| contains_sentinel(message, s))
        .map(str::to_string);
    
    match (requests_tool(message), sentinel) {
        (true, None) => Reply::ToolRequest,
        (false, Some(s)) => Reply::Completion(s),
        (true, Some(s)) => Reply::Ambiguous(s),
        (false, None) => Reply::Plain,
    }
}

/// Whether the message is a tool executor reply
pub fn is_tool_result(message: &Message) -> bool {
    message.tool_result.is_some() || message.content.trim_start().starts_with(TOOL_RESULT)
}

/// Whether the message is a tool executor reply addressed to `agent`
pub fn is_tool_result_for(message: &Message, agent: &AgentId) -> bool {
    is_tool_result(message) && message.reply_to.as_ref() == Some(agent)
}

/// Extract a tool call from the textual convention.
///
/// Accepts the `NEED_TOOL` block and the fenced
/// ```` ```tool {"tool": ..., "arguments": {...}} ``` ```` form.
pub fn parse_tool_request(text: &str) -> Result<ToolCall> {
    if let Some(m) = MARKER_LINE.find(text) {
        return parse_marker_block(&text[m.end()..]);
    }
    
    if let Some(start) = text.find(FENCED_TOOL) {
        let body = &text[start + FENCED_TOOL.len()..];
        let body = body.find("```").map_or(body, |end| &body[..end]);
        return serde_json::from_str::<ToolCall>(&escape_control_chars(body.trim()))
            .map_err(|e| AgentError::Parse(format!("Invalid tool block: {}", e)));
    }
    
    Err(AgentError::Parse(format!("No {} marker found", TOOL_MARKER)))
}

fn parse_marker_block(rest: &str) -> Result<ToolCall> {
    // {"tool": "...", "arguments": {...}} directly after the marker; a bare
    // `{tool_name}` line is a name, not an object
    let head = rest.trim_start();
    if head.starts_with('{') && head[1..].trim_start().starts_with('"') {
        let object = first_json_object(rest)?
            .ok_or_else(|| AgentError::Parse("Missing tool name".into()))?;
        return serde_json::from_value::<ToolCall>(Value::Object(object.into_iter().collect()))
            .map_err(|e| AgentError::Parse(format!("Invalid tool request: {}", e)));
    }
    
    let caps = TOOL_NAME
        .captures(rest)
        .ok_or_else(|| AgentError::Parse("Missing tool name".into()))?;
    let name = caps[1].to_string();
    let after_name = &rest[caps.get(0).map_or(0, |m| m.end())..];
    let arguments = first_json_object(after_name)?.unwrap_or_default();
    
    Ok(ToolCall {
        arguments,
        ..ToolCall::new(name)
    })
}

fn first_json_object(text: &str) -> Result<Option<HashMap<String, Value>>> {
    let Some(start) = text.find('{') else {
        return Ok(None);
    };
    
    let cleaned = escape_control_chars(&text[start..]);
    let mut stream = serde_json::Deserializer::from_str(&cleaned)
        .into_iter::<HashMap<String, Value>>();
    match stream.next() {
        Some(Ok(object)) => Ok(Some(object)),
        Some(Err(e)) => Err(AgentError::Parse(format!("Invalid tool arguments: {}", e))),
        None => Ok(None),
    }
}

/// Escape raw control characters inside JSON string literals, so unescaped
/// multi-line values still decode
fn escape_control_chars(text: &str) -> Cow<'_, str> {
    if !text.chars().any(char::is_control) {
        return Cow::Borrowed(text);
    }
    
    let mut out = String::with_capacity(text.len() + 32);
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if !in_string {
            in_string = c == '"';
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Fixed envelope around a tool result so routing does not depend on which
/// tool ran. The result text itself is not reformatted.
pub fn envelope(result: &ToolResult) -> String {
    let status = if result.is_success() { "ok" } else { "error" };
    format!(
        "{}\nTool: {}\nStatus: {}\nResult: {}",
        TOOL_RESULT,
        result.name,
        status,
        result.render()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_braced_tool_name() {
        let text = "NEED_TOOL\nTool: {read_folder_structure}\n{\"path\": \"/src\"}";
        let call = parse_tool_request(text).unwrap();
        assert_eq!(call.name, "read_folder_structure");
        assert_eq!(call.arguments.get("path"), Some(&json!("/src")));
    }

    #[test]
    fn test_parse_variants() {
        let call = parse_tool_request("NEED_TOOL\nTool {get_file_content}\n{\"path\": \"a.md\"}").unwrap();
        assert_eq!(call.name, "get_file_content");

        let call = parse_tool_request("I will look.\nNEED_TOOL\nTool: write_file_content\n{\"path\": \"main.tf\", \"content\": \"x {}\"}").unwrap();
        assert_eq!(call.name, "write_file_content");
        assert_eq!(call.arguments.get("content"), Some(&json!("x {}")));

        let call = parse_tool_request("NEED_TOOL\n{\"tool\": \"get_file_content\", \"arguments\": {\"path\": \"b\"}}").unwrap();
        assert_eq!(call.name, "get_file_content");
        assert_eq!(call.arguments.get("path"), Some(&json!("b")));

        let fenced = "Let me check.\n```tool\n{\"tool\": \"read_folder_structure\", \"arguments\": {\"path\": \".\"}}\n```";
        assert_eq!(parse_tool_request(fenced).unwrap().name, "read_folder_structure");
    }

    #[test]
    fn test_parse_without_arguments_and_errors() {
        let call = parse_tool_request("NEED_TOOL\nTool: {read_folder_structure}").unwrap();
        assert!(call.arguments.is_empty());

        assert!(matches!(
            parse_tool_request("NEED_TOOL\nTool: {get_file_content}\n{\"path\": "),
            Err(AgentError::Parse(_))
        ));
        assert!(matches!(parse_tool_request("just text"), Err(AgentError::Parse(_))));
    }

    #[test]
    fn test_multiline_content_is_accepted() {
        let text = "NEED_TOOL\nTool: {write_file_content}\n{\"path\": \"terraform/main.tf\", \"content\": \"module \\\"network\\\" {\n\tsource = \\\"./modules/network\\\"\n}\n\"}";
        let call = parse_tool_request(text).unwrap();
        assert_eq!(
            call.arguments.get("content"),
            Some(&json!("module \"network\" {\n\tsource = \"./modules/network\"\n}\n"))
        );

        let fenced = "```tool\n{\"tool\": \"write_file_content\", \"arguments\": {\"path\": \"a.tf\", \"content\": \"a\nb\"}}\n```";
        let call = parse_tool_request(fenced).unwrap();
        assert_eq!(call.arguments.get("content"), Some(&json!("a\nb")));
    }

    #[test]
    fn test_markdown_label_and_bare_name() {
        let bold = parse_tool_request("NEED_TOOL\n**Tool:** {get_file_content}\n{\"path\": \"README.md\"}").unwrap();
        assert_eq!(bold.name, "get_file_content");
        assert_eq!(bold.arguments.get("path"), Some(&json!("README.md")));

        let bold_outside = parse_tool_request("NEED_TOOL\n**Tool**: read_folder_structure\n{\"path\": \"/\"}").unwrap();
        assert_eq!(bold_outside.name, "read_folder_structure");

        let bare = parse_tool_request("NEED_TOOL\n{read_folder_structure}\n{\"path\": \"/src\"}").unwrap();
        assert_eq!(bare.name, "read_folder_structure");
        assert_eq!(bare.arguments.get("path"), Some(&json!("/src")));
    }

    #[test]
    fn test_marker_must_lead_a_line() {
        assert!(has_tool_marker("NEED_TOOL\nTool: x"));
        assert!(has_tool_marker("Reading files now.\n  NEED_TOOL\nTool: x"));
        assert!(!has_tool_marker("I no longer NEED_TOOL calls."));
    }

    #[test]
    fn test_classify() {
        let sentinels = ["ANALYSIS_COMPLETE"];
        let tool = Message::new("a", "NEED_TOOL\nTool: {x}");
        let done = Message::new("a", "Summary...\nANALYSIS_COMPLETE");
        let both = Message::new("a", "NEED_TOOL\nTool: {x}\n{}\nANALYSIS_COMPLETE");
        let plain = Message::new("a", "Hmm.");
        let structured = Message::new("a", "").with_tool_call(ToolCall::new("x"));

        assert_eq!(classify(&tool, &sentinels), Reply::ToolRequest);
        assert_eq!(classify(&done, &sentinels), Reply::Completion("ANALYSIS_COMPLETE".into()));
        assert_eq!(classify(&both, &sentinels), Reply::Ambiguous("ANALYSIS_COMPLETE".into()));
        assert_eq!(classify(&plain, &sentinels), Reply::Plain);
        assert_eq!(classify(&structured, &sentinels), Reply::ToolRequest);
    }

    #[test]
    fn test_envelope_keeps_result_verbatim() {
        let ok = envelope(&ToolResult::success("read_folder_structure", "src/\n└── main.rs\n"));
        assert_eq!(ok, "TOOL_RESULT\nTool: read_folder_structure\nStatus: ok\nResult: src/\n└── main.rs\n");

        let err = envelope(&ToolResult::failure("nope", "Tool not found: nope"));
        assert!(err.starts_with("TOOL_RESULT\nTool: nope\nStatus: error"));
    }

    #[test]
    fn test_tool_result_addressing() {
        let analyzer = AgentId::from("RequirementsAnalyzer");
        let msg = Message::new("ToolExecutor", envelope(&ToolResult::success("t", "x")))
            .with_tool_result(ToolResult::success("t", "x"))
            .reply_to(analyzer.clone());
        assert!(is_tool_result(&msg));
        assert!(is_tool_result_for(&msg, &analyzer));
        assert!(!is_tool_result_for(&msg, &AgentId::from("ScriptGenerator")));
    }
}
