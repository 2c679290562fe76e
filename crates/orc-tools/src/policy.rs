// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0

/// Return the first blocklist substring that `command` contains, if any.
/// A coarse safety net, not a sandbox (§4.2).
pub fn blocked_substring<'a>(command: &str, blocklist: &'a [String]) -> Option<&'a str> {
    blocklist.iter().map(|s| s.as_str()).find(|pat| command.contains(pat))
}

/// Whether `command`'s leading whitespace-delimited token matches one of
/// the git read-only whitelist tokens exactly. `config` gets extra scrutiny:
/// it is only read-only in its `--get`/`--get-all`/`--list` forms, so the
/// rest of the argument list is checked too, not just the head token.
pub fn git_read_allowed(command: &str, whitelist: &[String]) -> bool {
    let mut tokens = command.trim().split_whitespace();
    let head = tokens.next().unwrap_or("");
    if !whitelist.iter().any(|w| w == head) {
        return false;
    }
    if head == "config" {
        let rest: Vec<&str> = tokens.collect();
        return rest.iter().any(|a| matches!(*a, "--get" | "--get-all" | "--list" | "-l"));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocklist() -> Vec<String> {
        vec!["rm -rf /".into(), "dd if=".into()]
    }

    fn whitelist() -> Vec<String> {
        vec!["status".into(), "log".into(), "diff".into()]
    }

    #[test]
    fn blocked_substring_matches_anywhere_in_command() {
        assert_eq!(blocked_substring("sudo rm -rf / --no-preserve-root", &blocklist()), Some("rm -rf /"));
    }

    #[test]
    fn unblocked_command_returns_none() {
        assert_eq!(blocked_substring("ls -la", &blocklist()), None);
    }

    #[test]
    fn git_read_whitelist_matches_head_token_exactly() {
        assert!(git_read_allowed("status --short", &whitelist()));
        assert!(git_read_allowed("log -5", &whitelist()));
    }

    #[test]
    fn git_read_whitelist_rejects_unlisted_head_token() {
        assert!(!git_read_allowed("push origin main", &whitelist()));
        assert!(!git_read_allowed("commit -m x", &whitelist()));
    }

    #[test]
    fn git_read_whitelist_does_not_match_substring_mid_command() {
        // "status" appearing as an argument, not the head token, must not pass.
        assert!(!git_read_allowed("push --status origin main", &whitelist()));
    }

    #[test]
    fn config_get_and_list_subforms_are_allowed() {
        let wl = vec!["config".to_string()];
        assert!(git_read_allowed("config --get user.email", &wl));
        assert!(git_read_allowed("config --list", &wl));
        assert!(git_read_allowed("config -l", &wl));
    }

    #[test]
    fn config_without_a_read_only_subform_is_rejected() {
        let wl = vec!["config".to_string()];
        assert!(!git_read_allowed("config user.email x@y", &wl));
        assert!(!git_read_allowed("config --unset user.email", &wl));
        assert!(!git_read_allowed("config", &wl));
    }
}
