use crate::domains::agent::events::AgentEvent;
use serde_json::Value;
use std::collections::HashMap;

/// Converts the agent process's line-delimited JSON records into the minimal
/// typed event stream. The upstream framing is not a clean delta protocol:
/// assistant records may re-carry the entire accumulated message text on
/// every emission, tool results arrive on separate records, and a trailing
/// "result" record may hold the only copy of the message. The invariants
/// here: never re-deliver a character, never lose a message that only
/// appeared in the final record.
pub struct StreamTranscoder {
    accumulated: String,
    emitted_text: bool,
    pending_tools: HashMap<String, (String, Value)>,
    tool_counter: u64,
}

impl Default for StreamTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranscoder {
    pub fn new() -> Self {
        Self {
            accumulated: String::new(),
            emitted_text: false,
            pending_tools: HashMap::new(),
            tool_counter: 0,
        }
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    /// Process one raw line from the agent's output stream. Unparseable
    /// lines are progress noise and dropped silently.
    pub fn transcode_line(&mut self, line: &str) -> Vec<AgentEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
            log::debug!("Skipping non-JSON agent output line");
            return Vec::new();
        };

        match value.get("type").and_then(|v| v.as_str()).unwrap_or("") {
            "assistant" => self.handle_assistant(&value),
            "user" => self.handle_user(&value),
            "result" => self.handle_result(&value),
            "error" => vec![AgentEvent::Error {
                message: value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("agent error")
                    .to_string(),
            }],
            _ => Vec::new(),
        }
    }

    /// End of stream. The accumulated message wins regardless of exit code;
    /// only an empty-handed non-zero exit becomes an error.
    pub fn finish(&mut self, exit_code: Option<i32>) -> AgentEvent {
        match exit_code {
            Some(code) if code != 0 && self.accumulated.is_empty() => AgentEvent::Error {
                message: format!("agent process exited with code {code}"),
            },
            _ => AgentEvent::Done {
                content: self.accumulated.clone(),
            },
        }
    }

    fn handle_assistant(&mut self, value: &Value) -> Vec<AgentEvent> {
        let Some(message) = value.get("message") else {
            return Vec::new();
        };

        let mut events = Vec::new();
        let mut text_parts: Vec<&str> = Vec::new();

        if let Some(content) = message.get("content").and_then(|v| v.as_array()) {
            for entry in content {
                match entry.get("type").and_then(|v| v.as_str()).unwrap_or("") {
                    "thinking" => {
                        if let Some(thinking) = entry.get("thinking").and_then(|v| v.as_str()) {
                            let trimmed = thinking.trim();
                            if !trimmed.is_empty() {
                                events.push(AgentEvent::Thinking {
                                    content: trimmed.to_string(),
                                });
                            }
                        }
                    }
                    "tool_use" => {
                        let tool = entry
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("tool")
                            .to_string();
                        let input = entry.get("input").cloned().unwrap_or(Value::Null);
                        let id = match entry.get("id").and_then(|v| v.as_str()) {
                            Some(id) if !id.is_empty() => id.to_string(),
                            _ => {
                                self.tool_counter += 1;
                                format!("tool-{}", self.tool_counter)
                            }
                        };
                        self.pending_tools
                            .insert(id.clone(), (tool.clone(), input.clone()));
                        events.push(AgentEvent::ToolUse { id, tool, input });
                    }
                    "text" => {
                        if let Some(text) = entry.get("text").and_then(|v| v.as_str()) {
                            text_parts.push(text);
                        }
                    }
                    _ => {}
                }
            }
        }

        let full_text = text_parts.concat();
        if let Some(delta) = self.text_delta(&full_text) {
            self.emitted_text = true;
            events.push(AgentEvent::Text { content: delta });
        }

        events
    }

    fn handle_user(&mut self, value: &Value) -> Vec<AgentEvent> {
        let Some(content) = value
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_array())
        else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for entry in content {
            if entry.get("type").and_then(|v| v.as_str()) != Some("tool_result") {
                continue;
            }

            let id = entry
                .get("tool_use_id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let success = !entry
                .get("is_error")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let output = tool_result_output(entry.get("content").unwrap_or(&Value::Null));

            // Pair the result back to its invocation; each mapping is spent once
            let tool = match self.pending_tools.remove(&id) {
                Some((tool, _input)) => tool,
                None => "tool".to_string(),
            };

            events.push(AgentEvent::ToolResult {
                id,
                tool,
                output,
                success,
            });
        }
        events
    }

    fn handle_result(&mut self, value: &Value) -> Vec<AgentEvent> {
        // Fallback only: some turns never stream deltas and carry the whole
        // message in the final result record.
        if self.emitted_text {
            return Vec::new();
        }
        let Some(text) = value.get("result").and_then(|v| v.as_str()) else {
            return Vec::new();
        };
        if text.is_empty() {
            return Vec::new();
        }

        self.accumulated.push_str(text);
        self.emitted_text = true;
        vec![AgentEvent::Text {
            content: text.to_string(),
        }]
    }

    /// Core dedup: the upstream may send the full accumulated message, a
    /// genuine increment, or a repeat. Returns only never-before-seen text.
    fn text_delta(&mut self, fragment: &str) -> Option<String> {
        if fragment.is_empty() {
            return None;
        }

        if !self.accumulated.is_empty() && fragment.starts_with(&self.accumulated) {
            let delta = fragment[self.accumulated.len()..].to_string();
            if delta.is_empty() {
                return None;
            }
            self.accumulated = fragment.to_string();
            return Some(delta);
        }

        if self.accumulated.contains(fragment) {
            // Pure duplicate of already-delivered content
            return None;
        }

        self.accumulated.push_str(fragment);
        Some(fragment.to_string())
    }
}

fn tool_result_output(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| {
                if part.get("type").and_then(|v| v.as_str()) == Some("text") {
                    part.get("text").and_then(|v| v.as_str()).map(str::to_string)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assistant_text_line(text: &str) -> String {
        json!({
            "type": "assistant",
            "message": {
                "content": [{"type": "text", "text": text}]
            }
        })
        .to_string()
    }

    fn texts(events: &[AgentEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Text { content } => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn accumulated_fragments_yield_pure_deltas() {
        let mut transcoder = StreamTranscoder::new();

        let mut emitted = Vec::new();
        for fragment in ["Hi", "Hi there", "Hi there!"] {
            emitted.extend(transcoder.transcode_line(&assistant_text_line(fragment)));
        }

        assert_eq!(texts(&emitted), vec!["Hi", " there", "!"]);
        assert_eq!(transcoder.accumulated_text(), "Hi there!");
    }

    #[test]
    fn duplicate_fragment_is_emitted_once() {
        let mut transcoder = StreamTranscoder::new();

        let mut emitted = Vec::new();
        for fragment in ["Hello", "Hello"] {
            emitted.extend(transcoder.transcode_line(&assistant_text_line(fragment)));
        }

        assert_eq!(texts(&emitted), vec!["Hello"]);
        assert_eq!(transcoder.accumulated_text(), "Hello");
    }

    #[test]
    fn non_prefix_fragment_is_appended_verbatim() {
        let mut transcoder = StreamTranscoder::new();

        let mut emitted = Vec::new();
        for fragment in ["First paragraph.", " Second paragraph."] {
            emitted.extend(transcoder.transcode_line(&assistant_text_line(fragment)));
        }

        assert_eq!(
            texts(&emitted),
            vec!["First paragraph.", " Second paragraph."]
        );
        assert_eq!(
            transcoder.accumulated_text(),
            "First paragraph. Second paragraph."
        );
    }

    #[test]
    fn tool_use_and_result_are_correlated_across_interleaving() {
        let mut transcoder = StreamTranscoder::new();

        let use_line = |id: &str, name: &str| {
            json!({
                "type": "assistant",
                "message": {"content": [
                    {"type": "tool_use", "id": id, "name": name, "input": {"path": id}}
                ]}
            })
            .to_string()
        };
        let result_line = |id: &str, out: &str| {
            json!({
                "type": "user",
                "message": {"content": [
                    {"type": "tool_result", "tool_use_id": id, "content": out}
                ]}
            })
            .to_string()
        };

        transcoder.transcode_line(&use_line("t1", "read_file"));
        transcoder.transcode_line(&use_line("t2", "bash"));
        // t2 resolves before t1
        let second = transcoder.transcode_line(&result_line("t2", "ok2"));
        let first = transcoder.transcode_line(&result_line("t1", "ok1"));

        assert_eq!(
            second,
            vec![AgentEvent::ToolResult {
                id: "t2".to_string(),
                tool: "bash".to_string(),
                output: "ok2".to_string(),
                success: true,
            }]
        );
        assert_eq!(
            first,
            vec![AgentEvent::ToolResult {
                id: "t1".to_string(),
                tool: "read_file".to_string(),
                output: "ok1".to_string(),
                success: true,
            }]
        );

        // Mapping entries are dropped once paired
        let repeat = transcoder.transcode_line(&result_line("t1", "again"));
        assert_eq!(
            repeat,
            vec![AgentEvent::ToolResult {
                id: "t1".to_string(),
                tool: "tool".to_string(),
                output: "again".to_string(),
                success: true,
            }]
        );
    }

    #[test]
    fn failed_tool_result_reports_failure() {
        let mut transcoder = StreamTranscoder::new();
        transcoder.transcode_line(
            &json!({
                "type": "assistant",
                "message": {"content": [
                    {"type": "tool_use", "id": "t1", "name": "bash", "input": {}}
                ]}
            })
            .to_string(),
        );

        let events = transcoder.transcode_line(
            &json!({
                "type": "user",
                "message": {"content": [
                    {"type": "tool_result", "tool_use_id": "t1",
                     "content": "boom", "is_error": true}
                ]}
            })
            .to_string(),
        );

        assert_eq!(
            events,
            vec![AgentEvent::ToolResult {
                id: "t1".to_string(),
                tool: "bash".to_string(),
                output: "boom".to_string(),
                success: false,
            }]
        );
    }

    #[test]
    fn result_record_is_fallback_only() {
        // No deltas: the result payload is the message
        let mut transcoder = StreamTranscoder::new();
        let events = transcoder
            .transcode_line(&json!({"type": "result", "result": "whole message"}).to_string());
        assert_eq!(texts(&events), vec!["whole message"]);
        assert_eq!(
            transcoder.finish(Some(0)),
            AgentEvent::Done {
                content: "whole message".to_string()
            }
        );

        // Deltas happened: the result record must not re-deliver anything
        let mut transcoder = StreamTranscoder::new();
        transcoder.transcode_line(&assistant_text_line("streamed"));
        let events =
            transcoder.transcode_line(&json!({"type": "result", "result": "streamed"}).to_string());
        assert!(events.is_empty());
    }

    #[test]
    fn error_records_do_not_interrupt_processing() {
        let mut transcoder = StreamTranscoder::new();

        let errors =
            transcoder.transcode_line(&json!({"type": "error", "message": "tool blew up"}).to_string());
        assert_eq!(
            errors,
            vec![AgentEvent::Error {
                message: "tool blew up".to_string()
            }]
        );

        // Stream continues afterwards
        let events = transcoder.transcode_line(&assistant_text_line("still going"));
        assert_eq!(texts(&events), vec!["still going"]);
    }

    #[test]
    fn thinking_blocks_surface_as_events() {
        let mut transcoder = StreamTranscoder::new();
        let events = transcoder.transcode_line(
            &json!({
                "type": "assistant",
                "message": {"content": [
                    {"type": "thinking", "thinking": "  pondering  "}
                ]}
            })
            .to_string(),
        );
        assert_eq!(
            events,
            vec![AgentEvent::Thinking {
                content: "pondering".to_string()
            }]
        );
    }

    #[test]
    fn finish_reports_error_on_empty_nonzero_exit() {
        let mut transcoder = StreamTranscoder::new();
        match transcoder.finish(Some(3)) {
            AgentEvent::Error { message } => assert!(message.contains("code 3")),
            other => panic!("expected error, got {other:?}"),
        }

        // Accumulated text wins over a bad exit code
        let mut transcoder = StreamTranscoder::new();
        transcoder.transcode_line(&assistant_text_line("partial"));
        assert_eq!(
            transcoder.finish(Some(3)),
            AgentEvent::Done {
                content: "partial".to_string()
            }
        );
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let mut transcoder = StreamTranscoder::new();
        assert!(transcoder.transcode_line("not json at all").is_empty());
        assert!(transcoder.transcode_line("").is_empty());
        assert!(
            transcoder
                .transcode_line(&json!({"type": "system", "subtype": "init"}).to_string())
                .is_empty()
        );
    }

    #[test]
    fn multi_part_text_is_joined_before_delta() {
        let mut transcoder = StreamTranscoder::new();
        let events = transcoder.transcode_line(
            &json!({
                "type": "assistant",
                "message": {"content": [
                    {"type": "text", "text": "part one"},
                    {"type": "text", "text": " part two"}
                ]}
            })
            .to_string(),
        );
        assert_eq!(texts(&events), vec!["part one part two"]);
    }
}
