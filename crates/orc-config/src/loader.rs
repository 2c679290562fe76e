// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::schema::Config;

/// `~/.config/orc` (or platform equivalent via the `dirs` crate).
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("orc"))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from `path` if given, else from the default config
/// path if it exists, else fall back to built-in defaults. Never errors on
/// a missing file — only on a present-but-unparsable one.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let candidate = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let Some(candidate) = candidate else {
        return Ok(Config::default());
    };

    if !candidate.exists() {
        if path.is_some() {
            anyhow::bail!("config file not found: {}", candidate.display());
        }
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(&candidate)
        .with_context(|| format!("reading config file {}", candidate.display()))?;
    let config: Config = toml::from_str(&text)
        .with_context(|| format!("parsing config file {}", candidate.display()))?;
    tracing::debug!(path = %candidate.display(), "loaded config file");
    Ok(config)
}
