// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use regex::Regex;

/// A single `[r+n]`/`[r=n]` adjustment consumed from the front of a user
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundAdjustment {
    Add(u64),
    Set(u64),
}

/// Result of parsing leading round-control tokens out of a raw instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    pub adjustments: Vec<RoundAdjustment>,
    pub cleaned: String,
}

/// Repeatedly consume leading `[r+<n>]`/`[r=<n>]` tokens (case-insensitive,
/// leading whitespace allowed between tokens) from `input`. Non-leading
/// occurrences are left untouched as literal text. Returns every adjustment
/// found, in order, plus the cleaned, trimmed remainder.
pub fn parse(input: &str) -> ParsedInstruction {
    let re = Regex::new(r"(?i)^\s*\[r([+=])(\d+)\]").expect("static pattern compiles");
    let mut rest = input;
    let mut adjustments = Vec::new();

    while let Some(caps) = re.captures(rest) {
        let op = caps.get(1).unwrap().as_str();
        let n: u64 = caps.get(2).unwrap().as_str().parse().unwrap_or(0);
        adjustments.push(if op == "+" { RoundAdjustment::Add(n) } else { RoundAdjustment::Set(n) });
        let consumed = caps.get(0).unwrap().end();
        rest = &rest[consumed..];
    }

    ParsedInstruction { adjustments, cleaned: rest.trim().to_string() }
}

/// Apply a sequence of adjustments to a starting `remaining_rounds` value.
pub fn apply(remaining_rounds: u64, adjustments: &[RoundAdjustment]) -> u64 {
    adjustments.iter().fold(remaining_rounds, |acc, adj| match adj {
        RoundAdjustment::Add(n) => acc.saturating_add(*n),
        RoundAdjustment::Set(n) => *n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tokens_leaves_instruction_untouched() {
        let p = parse("Continue the task");
        assert!(p.adjustments.is_empty());
        assert_eq!(p.cleaned, "Continue the task");
    }

    #[test]
    fn single_add_token_is_consumed() {
        let p = parse("[r+5] Continue the task");
        assert_eq!(p.adjustments, vec![RoundAdjustment::Add(5)]);
        assert_eq!(p.cleaned, "Continue the task");
        assert_eq!(apply(2, &p.adjustments), 7);
    }

    #[test]
    fn set_token_is_consumed() {
        let p = parse("[r=10] go");
        assert_eq!(p.adjustments, vec![RoundAdjustment::Set(10)]);
        assert_eq!(apply(999, &p.adjustments), 10);
    }

    #[test]
    fn multiple_leading_tokens_are_associative_over_concatenation() {
        let p1 = parse("[r+2][r+3] X");
        let p2 = parse("[r+2] [r+3] X");
        assert_eq!(apply(0, &p1.adjustments), apply(0, &p2.adjustments));
        assert_eq!(apply(0, &p1.adjustments), 5);
        assert_eq!(p1.cleaned, "X");
    }

    #[test]
    fn mid_text_tokens_are_not_consumed() {
        let p = parse("Continue, and [r+5] do not touch this");
        assert!(p.adjustments.is_empty());
        assert_eq!(p.cleaned, "Continue, and [r+5] do not touch this");
    }

    #[test]
    fn case_insensitive_r_token() {
        let p = parse("[R+3] go");
        assert_eq!(p.adjustments, vec![RoundAdjustment::Add(3)]);
    }

    #[test]
    fn cleaned_instruction_can_be_empty() {
        let p = parse("[r+1]   ");
        assert_eq!(p.cleaned, "");
    }
}
