//! Model output parsing.
//!
//! A completion is interpreted as exactly one of: a structured tool-call
//! request, a final answer, or a parse failure the executor recovers from
//! with a corrective re-prompt. Backends with native tool calling pass
//! through directly; otherwise the assistant text is scanned for a JSON
//! invocation in the shapes smaller local models actually emit - a raw
//! object, a fenced block, or JSON embedded in prose.

use serde_json::Value;

use crate::error::{AiError, Result};
use crate::llm::{CompletionResponse, ToolCall};

/// Parsed shape of one model completion.
#[derive(Debug, Clone)]
pub enum ModelTurn {
    FinalAnswer(String),
    ToolCalls(Vec<ToolCall>),
}

/// Interpret a completion as a final answer or a tool-call request.
///
/// Text that attempts a tool invocation (it carries the `"tool"` marker)
/// but does not parse into the expected shape is a parse error; plain
/// prose without markers is a final answer.
pub fn parse_model_output(response: &CompletionResponse) -> Result<ModelTurn> {
    if !response.tool_calls.is_empty() {
        return Ok(ModelTurn::ToolCalls(response.tool_calls.clone()));
    }

    let content = response.content.as_deref().unwrap_or("").trim();
    if content.is_empty() {
        return Err(AiError::Parse(
            "Completion carried neither text nor tool calls".to_string(),
        ));
    }

    match extract_tool_call(content)? {
        Some(call) => Ok(ModelTurn::ToolCalls(vec![call])),
        None => Ok(ModelTurn::FinalAnswer(content.to_string())),
    }
}

/// Scan assistant text for a JSON tool invocation.
///
/// Returns `Ok(None)` when the text has no tool-call markers, and an error
/// when an attempted invocation is malformed.
fn extract_tool_call(content: &str) -> Result<Option<ToolCall>> {
    // Whole content is a JSON object
    if content.starts_with('{') {
        if let Some(call) = try_parse_invocation(content) {
            return Ok(Some(call));
        }
        if looks_like_invocation(content) {
            return Err(AiError::Parse(
                "Tool invocation JSON is malformed or missing arguments".to_string(),
            ));
        }
        return Ok(None);
    }

    // Fenced code block, possibly with surrounding prose
    if let Some(inner) = extract_fenced_block(content) {
        let inner = inner.trim();
        if let Some(call) = try_parse_invocation(inner) {
            return Ok(Some(call));
        }
        if looks_like_invocation(inner) {
            return Err(AiError::Parse(
                "Fenced tool invocation is malformed".to_string(),
            ));
        }
    }

    // JSON object embedded mid-prose
    if let Some(position) = content.find("{\"tool\"") {
        let candidate = &content[position..];
        if let Some(json_str) = extract_balanced_json(candidate)
            && let Some(call) = try_parse_invocation(json_str)
        {
            return Ok(Some(call));
        }
        return Err(AiError::Parse(
            "Embedded tool invocation is malformed".to_string(),
        ));
    }

    Ok(None)
}

/// Try to parse `{"tool": "...", "arguments": {...}}`.
fn try_parse_invocation(s: &str) -> Option<ToolCall> {
    let json: Value = serde_json::from_str(s).ok()?;
    let tool = json.get("tool")?.as_str()?;
    let arguments = json.get("arguments")?.clone();
    Some(ToolCall {
        id: format!("call_{}", uuid::Uuid::new_v4()),
        name: tool.to_string(),
        arguments,
    })
}

fn looks_like_invocation(s: &str) -> bool {
    s.contains("\"tool\"")
}

/// Extract the body of the first fenced code block, tolerating trailing
/// prose after the closing fence.
fn extract_fenced_block(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`, counting
/// brace depth while respecting string literals.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
