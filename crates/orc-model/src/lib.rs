// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
pub mod anthropic;
pub mod catalog;
mod mock;
pub mod openai_compat;
mod provider;
mod types;

pub use anthropic::AnthropicProvider;
pub use catalog::{resolve, ProviderTag};
pub use mock::{DebugMockProvider, MockRole};
pub use openai_compat::{AuthStyle, OpenAICompatProvider};
pub use provider::{classify_http_error, ModelProvider, ProviderError, ResponseStream};
pub use types::{CompletionRequest, ContentBlock, Message, MessageContent, ResponseEvent, Role, ToolSchema};
