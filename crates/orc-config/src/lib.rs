// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod loader;
mod schema;

pub use loader::{config_dir, default_config_path, load_config};
pub use schema::{AgentConfig, CompactionStrategy, Config, ToolsConfig};
