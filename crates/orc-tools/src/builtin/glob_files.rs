// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use walkdir::WalkDir;

use crate::builtin::{require_str, timeout_secs_for};
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// Finds files matching a glob-style `pattern` (`*`/`?` wildcards) under
/// `path` (defaults to the working directory).
pub struct GlobFilesTool {
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for GlobFilesTool {
    fn name(&self) -> &str {
        "glob_files"
    }

    fn description(&self) -> &str {
        "Find files whose path matches `pattern` (supports `*` and `?` wildcards), \
         searched recursively under `path` (default: the working directory). \
         Returns newline-joined matches, or \"no matches\"."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"},
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
        let timeout_secs = timeout_secs_for(&call.args, self.default_timeout_secs);

        let task = tokio::task::spawn_blocking(move || find_matches(&pattern, &root));
        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Err(_) => ToolOutput::err(call.id.clone(), format!("glob_files timed out after {timeout_secs}s")),
            Ok(Err(join_err)) => ToolOutput::err(call.id.clone(), format!("internal error: {join_err}")),
            Ok(Ok(Err(e))) => ToolOutput::err(call.id.clone(), e),
            Ok(Ok(Ok(content))) => ToolOutput::ok(call.id.clone(), content),
        }
    }
}

fn find_matches(pattern: &str, root: &str) -> Result<String, String> {
    let re = glob_to_regex(pattern).map_err(|e| format!("invalid pattern: {e}"))?;

    let mut matches: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().to_str().map(|s| s.to_string()))
        .filter(|p| {
            let name = p.rsplit('/').next().unwrap_or(p);
            re.is_match(p) || re.is_match(name)
        })
        .collect();
    matches.sort();

    Ok(if matches.is_empty() { "no matches".to_string() } else { matches.join("\n") })
}

fn glob_to_regex(pattern: &str) -> Result<regex::Regex, regex::Error> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ if regex_syntax::is_meta_character(c) => {
                re.push('\\');
                re.push(c);
            }
            _ => re.push(c),
        }
    }
    re.push('$');
    regex::Regex::new(&re)
}

mod regex_syntax {
    pub fn is_meta_character(c: char) -> bool {
        matches!(c, '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> GlobFilesTool {
        GlobFilesTool { default_timeout_secs: 30 }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "glob_files".into(), args }
    }

    #[tokio::test]
    async fn finds_files_by_extension_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        let out = tool()
            .execute(&call(serde_json::json!({"pattern": "*.rs", "path": dir.path().to_str().unwrap()})))
            .await;
        assert!(out.content.ends_with("a.rs"));
    }

    #[tokio::test]
    async fn no_matches_reported_explicitly() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool()
            .execute(&call(serde_json::json!({"pattern": "*.nonexistent", "path": dir.path().to_str().unwrap()})))
            .await;
        assert_eq!(out.content, "no matches");
    }

    #[tokio::test]
    async fn missing_pattern_is_an_error() {
        let out = tool().execute(&call(serde_json::json!({}))).await;
        assert!(out.is_error);
    }
}
