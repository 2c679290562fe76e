// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use orc_config::CompactionStrategy;
use orc_model::{ContentBlock, Message, MessageContent, Role};
use orc_tools::OutputCategory;

const SUMMARIZE_PROMPT: &str =
    "You are a context compaction assistant. Summarize the following conversation history \
     in a concise, information-dense way. Preserve all technical details, decisions, file \
     names, code snippets, and tool outputs that may be relevant to future work. \
     The summary will replace the original history to free up context space.";

/// Replace `messages` with a single summarization request, following
/// `strategy`. The caller is responsible for actually invoking the model on
/// the rewritten history and replacing it with the summary that comes back;
/// this function only performs the deterministic part.
pub fn compact_session_with_strategy(messages: &mut Vec<Message>, strategy: CompactionStrategy) -> usize {
    let before = messages.len();
    match strategy {
        CompactionStrategy::Summarize => {
            let history_text = serialize_history(messages);
            let request = Message::user(format!("{SUMMARIZE_PROMPT}\n\n---\n\n{history_text}"));
            messages.clear();
            messages.push(request);
        }
        CompactionStrategy::Emergency => {
            emergency_compact(messages, 4);
        }
    }
    before
}

/// Split `messages` into an older portion to summarize and a recent tail to
/// keep verbatim, nudging the split point backward so it never falls inside
/// a tool_use/tool_result group. Splitting mid-group would leave a
/// `tool_result` in the tail whose matching `tool_use` was summarized away —
/// or vice versa — violating the tool-call pairing invariant on the next
/// provider call.
pub fn split_keeping_tool_groups_intact(messages: &[Message], keep_recent: usize) -> usize {
    let mut split = messages.len().saturating_sub(keep_recent);
    while split > 0 && split < messages.len() {
        let boundary_is_tool_content = match &messages[split].content {
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. })),
            MessageContent::Text(_) => false,
        };
        if boundary_is_tool_content {
            split -= 1;
        } else {
            break;
        }
    }
    split
}

/// Deterministic fallback compaction, used when the session is too large to
/// fit even a summarization prompt within the context window. Drops all but
/// the last `keep_n` messages and prepends a notice. Makes no model call and
/// always succeeds.
pub fn emergency_compact(messages: &mut Vec<Message>, keep_n: usize) -> usize {
    let before = messages.len();
    let keep = keep_n.min(messages.len());
    let preserved: Vec<Message> = messages[messages.len() - keep..].to_vec();
    let notice = Message::assistant(
        "[Context emergency-compacted: earlier history was dropped to prevent a context-window \
         overflow. Proceed carefully; ask the user to re-state requirements that may be missing.]",
    );
    messages.clear();
    messages.push(notice);
    messages.extend(preserved);
    before
}

/// Deterministic, content-aware tool-result truncation. Returns `content`
/// unchanged when it already fits `cap_tokens`. Dispatches on
/// [`OutputCategory`] rather than tool name, so this stays independent of the
/// concrete tool list.
pub fn smart_truncate(content: &str, category: OutputCategory, cap_tokens: usize) -> String {
    if cap_tokens == 0 {
        return content.to_string();
    }
    let cap_chars = cap_tokens * 4;
    if content.len() <= cap_chars {
        return content.to_string();
    }
    let omitted_bytes = content.len() - cap_chars;
    match category {
        OutputCategory::HeadTail => head_tail_lines(
            content,
            cap_chars,
            60,
            40,
            &format!("[... {{lines}} lines / {omitted_bytes} bytes omitted ...]"),
        ),
        OutputCategory::MatchList => head_lines(
            content,
            cap_chars,
            &format!(
                "[... {{lines}} more matches omitted ({omitted_bytes} bytes); \
                 use a more specific pattern to see them ...]"
            ),
        ),
        OutputCategory::FileContent => head_tail_lines(
            content,
            cap_chars,
            usize::MAX,
            usize::MAX,
            &format!(
                "[... {{lines}} lines omitted ({omitted_bytes} bytes); \
                 use read_file with offset/limit to see more ...]"
            ),
        ),
        OutputCategory::Generic => {
            let cut = content[..cap_chars].rfind('\n').map(|p| p + 1).unwrap_or(cap_chars);
            format!(
                "{}\n[... {omitted_bytes} bytes omitted; content truncated to fit context budget ...]",
                &content[..cut]
            )
        }
    }
}

fn serialize_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let text = match &m.content {
                MessageContent::Text(t) => t.clone(),
                MessageContent::Blocks(blocks) => blocks
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => text.clone(),
                        ContentBlock::Thinking { thinking } => format!("[thinking: {thinking}]"),
                        ContentBlock::ToolUse { name, input, .. } => {
                            format!("[tool_call: {name}({input})]")
                        }
                        ContentBlock::ToolResult { content, .. } => format!("[tool_result: {content}]"),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            };
            format!("{role}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn head_lines(content: &str, cap_chars: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut kept = String::with_capacity(cap_chars);
    let mut kept_count = 0usize;
    for line in &lines {
        let needed = if kept.is_empty() { line.len() } else { line.len() + 1 };
        if kept.len() + needed > cap_chars {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        kept_count += 1;
    }
    let omitted = lines.len().saturating_sub(kept_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{kept}\n{notice}")
}

fn head_tail_lines(content: &str, cap_chars: usize, max_head: usize, max_tail: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let half_cap = cap_chars / 2;

    let mut head = String::with_capacity(half_cap);
    let mut head_count = 0usize;
    for line in lines.iter().take(max_head) {
        let needed = if head.is_empty() { line.len() } else { line.len() + 1 };
        if head.len() + needed > half_cap {
            break;
        }
        if !head.is_empty() {
            head.push('\n');
        }
        head.push_str(line);
        head_count += 1;
    }

    let mut tail_lines: Vec<&str> = Vec::new();
    let mut tail_chars = 0usize;
    for line in lines.iter().rev().take(max_tail) {
        let needed = if tail_lines.is_empty() { line.len() } else { line.len() + 1 };
        if tail_chars + needed > half_cap {
            break;
        }
        tail_chars += needed;
        tail_lines.push(line);
    }
    tail_lines.reverse();
    let tail_count = tail_lines.len();
    let tail = tail_lines.join("\n");

    let omitted = lines.len().saturating_sub(head_count + tail_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{head}\n{notice}\n{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smart_truncate_leaves_short_content_untouched() {
        let out = smart_truncate("short", OutputCategory::Generic, 1000);
        assert_eq!(out, "short");
    }

    #[test]
    fn smart_truncate_head_tail_keeps_both_ends() {
        let lines: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
        let content = lines.join("\n");
        let out = smart_truncate(&content, OutputCategory::HeadTail, 50);
        assert!(out.starts_with("line 0"));
        assert!(out.ends_with("line 199"));
        assert!(out.contains("omitted"));
    }

    #[test]
    fn summarize_strategy_collapses_history_to_one_request() {
        let mut messages = vec![Message::user("hi"), Message::assistant("hello"), Message::user("do X")];
        let before = compact_session_with_strategy(&mut messages, CompactionStrategy::Summarize);
        assert_eq!(before, 3);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].as_text().contains("hi"));
    }

    #[test]
    fn emergency_compact_keeps_only_last_n_plus_notice() {
        let mut messages: Vec<Message> = (0..10).map(|i| Message::user(format!("msg {i}"))).collect();
        emergency_compact(&mut messages, 3);
        assert_eq!(messages.len(), 4); // notice + 3 kept
        assert!(messages[0].as_text().contains("emergency-compacted"));
        assert!(messages.last().unwrap().as_text().contains("msg 9"));
    }

    #[test]
    fn split_keeps_tool_use_and_tool_result_in_the_same_half() {
        let messages = vec![
            Message::user("a"),
            Message::assistant("b"),
            Message::assistant_blocks(vec![ContentBlock::tool_use("1", "read_file", serde_json::json!({}))]),
            Message::tool_results(vec![ContentBlock::tool_result("1", "content", false)]),
        ];
        // keep_recent=1 would naively split right before the ToolResult
        // message, orphaning the ToolUse in the "to summarize" half.
        let split = split_keeping_tool_groups_intact(&messages, 1);
        assert_eq!(split, 2);
    }

    #[test]
    fn split_is_a_no_op_when_boundary_already_falls_on_plain_text() {
        let messages = vec![Message::user("a"), Message::assistant("b"), Message::user("c"), Message::assistant("d")];
        assert_eq!(split_keeping_tool_groups_intact(&messages, 2), 2);
    }

    #[test]
    fn emergency_compact_strategy_delegates_to_emergency_compact() {
        let mut messages: Vec<Message> = (0..10).map(|i| Message::user(format!("msg {i}"))).collect();
        compact_session_with_strategy(&mut messages, CompactionStrategy::Emergency);
        assert!(messages[0].as_text().contains("emergency-compacted"));
    }
}
