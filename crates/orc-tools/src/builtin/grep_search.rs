// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use walkdir::WalkDir;

use crate::builtin::{require_str, timeout_secs_for};
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// Searches file contents under `path` for lines matching a regex
/// `pattern`, optionally restricted to files matching a glob.
pub struct GrepSearchTool {
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn description(&self) -> &str {
        "Search file contents for a regex `pattern` under `path` (default: the \
         working directory), optionally restricted to files matching `glob`. \
         `output_mode` selects `content` (matching lines with file:line prefixes, \
         the default), `files_with_matches`, or `count`."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"},
                "glob": {"type": "string"},
                "output_mode": {"type": "string", "enum": ["content", "files_with_matches", "count"]},
                "timeout_seconds": {"type": "integer", "description": "Seconds before the search is aborted"}
            },
            "required": ["pattern"]
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::MatchList
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let pattern = match require_str(&call.args, "pattern") {
            Ok(p) => p.to_string(),
            Err(e) => return ToolOutput::err(call.id.clone(), e),
        };
        let root = call.args.get("path").and_then(|v| v.as_str()).unwrap_or(".").to_string();
        let mode = call.args.get("output_mode").and_then(|v| v.as_str()).unwrap_or("content").to_string();
        let name_glob = call.args.get("glob").and_then(|v| v.as_str()).map(|s| s.to_string());
        let timeout_secs = timeout_secs_for(&call.args, self.default_timeout_secs);

        let task = tokio::task::spawn_blocking(move || search(&pattern, &root, &mode, name_glob.as_deref()));
        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Err(_) => ToolOutput::err(call.id.clone(), format!("grep_search timed out after {timeout_secs}s")),
            Ok(Err(join_err)) => ToolOutput::err(call.id.clone(), format!("internal error: {join_err}")),
            Ok(Ok(Err(e))) => ToolOutput::err(call.id.clone(), e),
            Ok(Ok(Ok(content))) => ToolOutput::ok(call.id.clone(), content),
        }
    }
}

fn search(pattern: &str, root: &str, mode: &str, name_glob: Option<&str>) -> Result<String, String> {
    let re = Regex::new(pattern).map_err(|e| format!("invalid pattern: {e}"))?;

    let mut content_lines = Vec::new();
    let mut files_with_matches = Vec::new();
    let mut total_count = 0usize;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path_str = entry.path().to_string_lossy().to_string();
        if let Some(glob) = name_glob {
            if !simple_glob_match(glob, &path_str) {
                continue;
            }
        }
        let Ok(text) = std::fs::read_to_string(entry.path()) else { continue };
        let mut file_matched = false;
        for (lineno, line) in text.lines().enumerate() {
            if re.is_match(line) {
                file_matched = true;
                total_count += 1;
                content_lines.push(format!("{path_str}:{}:{line}", lineno + 1));
            }
        }
        if file_matched {
            files_with_matches.push(path_str);
        }
    }

    Ok(match mode {
        "files_with_matches" => files_with_matches.join("\n"),
        "count" => total_count.to_string(),
        _ => content_lines.join("\n"),
    })
}

fn simple_glob_match(glob: &str, path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    if let Some(suffix) = glob.strip_prefix('*') {
        return name.ends_with(suffix);
    }
    name == glob
}
