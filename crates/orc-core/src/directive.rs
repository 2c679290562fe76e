// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use regex::Regex;

/// The parsed meaning of the Instructor's final text. Total: every
/// non-empty input maps to exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Done,
    TellWorker {
        instruction: String,
        model_override: Option<String>,
    },
    Malformed,
}

/// Parse the Instructor's final assistant text into a [`Directive`].
///
/// Completion is checked first: a standalone, case-sensitive `DONE` token
/// (optionally markdown-emphasized, optionally followed by punctuation
/// and/or a closing code fence) anchored at the end of the text wins over
/// any `Tell worker:` text that might precede it. Otherwise, a
/// case-insensitive `tell worker(<clause>):` prefix is extracted; anything
/// else is malformed.
pub fn parse(text: &str) -> Directive {
    if detect_completion(text) {
        return Directive::Done;
    }
    if let Some((instruction, model_override)) = extract_tell_worker(text) {
        if !instruction.trim().is_empty() {
            return Directive::TellWorker { instruction, model_override };
        }
    }
    Directive::Malformed
}

fn detect_completion(text: &str) -> bool {
    let re = Regex::new(
        r"(?m)(?:^|\n)[ \t]*(?:\*\*DONE\*\*|__DONE__|_DONE_|DONE)[.!]?[ \t]*\n?(?:```)?[ \t\n]*\z",
    )
    .expect("static pattern compiles");
    re.is_match(text)
}

fn extract_tell_worker(text: &str) -> Option<(String, Option<String>)> {
    let re = Regex::new(r"(?is)tell\s+worker\s*(?:\(([^)]*)\))?\s*:\s*(.*)").ok()?;
    let caps = re.captures(text)?;
    let instruction = caps.get(2)?.as_str().trim().to_string();
    let model_override = caps.get(1).and_then(|m| extract_model_clause(m.as_str()));
    Some((instruction, model_override))
}

fn extract_model_clause(clause: &str) -> Option<String> {
    let re = Regex::new(r"(?is)(?:use|model\s*:)\s*([^\s)]+)").ok()?;
    re.captures(clause).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_detection_accepts_specified_forms() {
        for accepted in [
            "DONE",
            "DONE.",
            "DONE!",
            "**DONE**",
            "__DONE__",
            "Finished everything.\n```\nDONE\n```",
        ] {
            assert_eq!(parse(accepted), Directive::Done, "expected Done for {accepted:?}");
        }
    }

    #[test]
    fn done_detection_rejects_lowercase_and_mixed_case() {
        assert_eq!(parse("done"), Directive::Malformed);
        assert_eq!(parse("Done"), Directive::Malformed);
    }

    #[test]
    fn done_detection_rejects_mid_sentence_occurrence() {
        assert_eq!(parse("I am DONE with this for now, more to follow"), Directive::Malformed);
    }

    #[test]
    fn tell_worker_extracts_instruction() {
        let d = parse("Tell worker: Create hello.txt with the content \"hello world\"");
        assert_eq!(
            d,
            Directive::TellWorker {
                instruction: "Create hello.txt with the content \"hello world\"".into(),
                model_override: None,
            }
        );
    }

    #[test]
    fn tell_worker_is_case_insensitive_on_the_keyword() {
        let d = parse("tell WORKER: do the thing");
        assert_eq!(
            d,
            Directive::TellWorker { instruction: "do the thing".into(), model_override: None }
        );
    }

    #[test]
    fn tell_worker_extracts_use_model_clause() {
        let d = parse("Tell worker(use qwen-max): Run the build");
        assert_eq!(
            d,
            Directive::TellWorker {
                instruction: "Run the build".into(),
                model_override: Some("qwen-max".into()),
            }
        );
    }

    #[test]
    fn tell_worker_extracts_model_colon_clause() {
        let d = parse("Tell worker(model: opus): Review the diff");
        assert_eq!(
            d,
            Directive::TellWorker {
                instruction: "Review the diff".into(),
                model_override: Some("opus".into()),
            }
        );
    }

    #[test]
    fn empty_tail_after_tell_worker_is_malformed() {
        assert_eq!(parse("Tell worker:   "), Directive::Malformed);
    }

    #[test]
    fn unrelated_text_is_malformed() {
        assert_eq!(parse("I think we should use TypeScript."), Directive::Malformed);
    }

    #[test]
    fn parsing_is_total_over_a_sample_of_inputs() {
        for input in [
            "DONE",
            "Tell worker: go",
            "random text",
            "",
            "   ",
            "Tell worker:",
        ] {
            match parse(input) {
                Directive::Done | Directive::TellWorker { .. } | Directive::Malformed => {}
            }
        }
    }
}
