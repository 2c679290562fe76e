// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0

/// Which side of the Instructor/Worker pair a display event belongs to.
/// Distinct from [`orc_model::Role`]: both agents speak with the model's
/// `assistant` role, but a display sink needs to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Instructor,
    Worker,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Instructor => "instructor",
            Speaker::Worker => "worker",
        }
    }
}

/// Write-only, no-semantics sink for streamed text and status lines. Neither
/// the Orchestrator nor the Agent Driver inspect what a sink does with what
/// they send it.
pub trait DisplaySink: Send {
    fn on_text(&mut self, who: Speaker, chunk: &str);
    fn on_status(&mut self, line: &str);
}

/// Discards everything. Used in tests and non-interactive contexts.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn on_text(&mut self, _who: Speaker, _chunk: &str) {}
    fn on_status(&mut self, _line: &str) {}
}

/// Writes each speaker's text to stdout with a `[instructor]`/`[worker]`
/// prefix emitted once per turn, followed by the raw streamed chunks.
pub struct StdoutSink {
    last_speaker: Option<Speaker>,
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self { last_speaker: None }
    }
}

impl DisplaySink for StdoutSink {
    fn on_text(&mut self, who: Speaker, chunk: &str) {
        use std::io::Write;
        if self.last_speaker != Some(who) {
            print!("\n[{}] ", who.label());
            self.last_speaker = Some(who);
        }
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    }

    fn on_status(&mut self, line: &str) {
        println!("\n-- {line}");
        self.last_speaker = None;
    }
}

/// Writes each event as one line-delimited JSON object to stdout:
/// `{"type":"text","speaker":"worker","chunk":"..."}` or
/// `{"type":"status","line":"..."}`. Intended for piping into another
/// process rather than being read directly.
pub struct JsonSink;

impl DisplaySink for JsonSink {
    fn on_text(&mut self, who: Speaker, chunk: &str) {
        let line = serde_json::json!({"type": "text", "speaker": who.label(), "chunk": chunk});
        println!("{line}");
    }

    fn on_status(&mut self, line: &str) {
        let json_line = serde_json::json!({"type": "status", "line": line});
        println!("{json_line}");
    }
}

/// Buffers each speaker's streamed chunks and flushes one plain-text line
/// per turn, on a speaker switch or a status line — the legacy
/// final-response-only rendering, with status lines suppressed.
#[derive(Default)]
pub struct CompactSink {
    current_speaker: Option<Speaker>,
    buffer: String,
}

impl CompactSink {
    fn flush(&mut self) {
        if let Some(who) = self.current_speaker.take() {
            if !self.buffer.trim().is_empty() {
                println!("[{}] {}", who.label(), self.buffer.trim());
            }
            self.buffer.clear();
        }
    }
}

impl DisplaySink for CompactSink {
    fn on_text(&mut self, who: Speaker, chunk: &str) {
        if self.current_speaker != Some(who) {
            self.flush();
            self.current_speaker = Some(who);
        }
        self.buffer.push_str(chunk);
    }

    fn on_status(&mut self, _line: &str) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_any_input_without_panicking() {
        let mut sink = NullSink;
        sink.on_text(Speaker::Worker, "chunk");
        sink.on_status("status");
    }

    #[test]
    fn compact_sink_buffers_until_speaker_switch() {
        let mut sink = CompactSink::default();
        sink.on_text(Speaker::Instructor, "Tell worker: ");
        sink.on_text(Speaker::Instructor, "go");
        assert_eq!(sink.buffer, "Tell worker: go");
        sink.on_text(Speaker::Worker, "done");
        assert!(sink.buffer == "done");
        assert_eq!(sink.current_speaker, Some(Speaker::Worker));
    }
}
