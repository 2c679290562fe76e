// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0

/// The provider family a model shorthand resolves to. The Worker's client
/// cache is keyed by this tag: one cached client instance per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderTag {
    /// Anthropic-family ("claude-" prefixed ids and their shorthands).
    Anthropic,
    /// Qwen / OAuth-coder-family backend.
    Qwen,
}

impl ProviderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::Anthropic => "anthropic",
            ProviderTag::Qwen => "qwen",
        }
    }
}

/// Resolve a model shorthand (e.g. `sonnet`, `qwen-max`) to its full model
/// identifier and provider tag.
///
/// Heuristics, in order: an exact shorthand match in the static table;
/// otherwise a `claude-` prefix or a `qwen` substring; otherwise default to
/// the Anthropic-family provider, since it is this system's default backend.
pub fn resolve(model: &str) -> (String, ProviderTag) {
    let lower = model.to_ascii_lowercase();

    for (shorthand, full_id, tag) in SHORTHAND_TABLE {
        if lower == *shorthand {
            return (full_id.to_string(), *tag);
        }
    }

    if lower.starts_with("claude-") {
        return (model.to_string(), ProviderTag::Anthropic);
    }
    if lower.contains("qwen") {
        return (model.to_string(), ProviderTag::Qwen);
    }

    (model.to_string(), ProviderTag::Anthropic)
}

const SHORTHAND_TABLE: &[(&str, &str, ProviderTag)] = &[
    ("sonnet", "claude-sonnet-4-5", ProviderTag::Anthropic),
    ("opus", "claude-opus-4-1", ProviderTag::Anthropic),
    ("haiku", "claude-haiku-4-5", ProviderTag::Anthropic),
    ("qwen", "qwen-plus", ProviderTag::Qwen),
    ("qwen-max", "qwen-max", ProviderTag::Qwen),
    ("qwen-plus", "qwen-plus", ProviderTag::Qwen),
    ("coder-model", "qwen-coder-plus", ProviderTag::Qwen),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sonnet_resolves_to_anthropic() {
        let (id, tag) = resolve("sonnet");
        assert_eq!(id, "claude-sonnet-4-5");
        assert_eq!(tag, ProviderTag::Anthropic);
    }

    #[test]
    fn qwen_max_resolves_to_qwen() {
        let (_, tag) = resolve("qwen-max");
        assert_eq!(tag, ProviderTag::Qwen);
    }

    #[test]
    fn claude_prefixed_full_id_resolves_to_anthropic() {
        let (id, tag) = resolve("claude-3-7-sonnet-20250219");
        assert_eq!(id, "claude-3-7-sonnet-20250219");
        assert_eq!(tag, ProviderTag::Anthropic);
    }

    #[test]
    fn unknown_model_containing_qwen_resolves_to_qwen() {
        let (_, tag) = resolve("qwen2.5-coder-32b");
        assert_eq!(tag, ProviderTag::Qwen);
    }

    #[test]
    fn unrecognized_model_defaults_to_anthropic() {
        let (_, tag) = resolve("some-custom-local-model");
        assert_eq!(tag, ProviderTag::Anthropic);
    }

    #[test]
    fn resolution_is_case_insensitive_on_shorthand() {
        let (_, tag) = resolve("SONNET");
        assert_eq!(tag, ProviderTag::Anthropic);
    }
}
