// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::{provider::ResponseStream, CompletionRequest, ResponseEvent};

/// Which side of the Instructor/Worker pair a [`DebugMockProvider`] is
/// standing in for. The weighted synthetic-message distributions differ
/// per role (spec §6: Instructor output must exercise `Tell worker:`,
/// `DONE`, and malformed forms; Worker output must never look like a
/// directive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockRole {
    Instructor,
    Worker,
}

/// Deterministic-in-shape, randomized-in-content mock provider used by
/// `--debug`. Never calls a network service; generates one weighted
/// synthetic assistant message per `complete()` call and simulates
/// streaming by emitting it in small chunks with ~20-30ms gaps, using a
/// fixed weighted distribution instead of a pre-supplied script queue.
pub struct DebugMockProvider {
    role: MockRole,
}

impl DebugMockProvider {
    pub fn new(role: MockRole) -> Self {
        Self { role }
    }

    fn pick_text(&self) -> String {
        let mut rng = rand::thread_rng();
        let roll: f32 = rng.gen();
        match self.role {
            MockRole::Instructor => {
                if roll < 0.10 {
                    DONE_VARIANTS[rng.gen_range(0..DONE_VARIANTS.len())].to_string()
                } else if roll < 0.40 {
                    MALFORMED_VARIANTS[rng.gen_range(0..MALFORMED_VARIANTS.len())].to_string()
                } else {
                    TELL_WORKER_VARIANTS[rng.gen_range(0..TELL_WORKER_VARIANTS.len())].to_string()
                }
            }
            MockRole::Worker => {
                WORKER_REPORT_VARIANTS[rng.gen_range(0..WORKER_REPORT_VARIANTS.len())].to_string()
            }
        }
    }
}

const TELL_WORKER_VARIANTS: &[&str] = &[
    "Tell worker: Read the relevant file and report back its contents.",
    "Tell worker: Create the requested file with the given content.",
    "Tell worker(use sonnet): Run the test suite and report the results.",
    "Tell worker: Apply the edit and confirm it was applied.",
];

const DONE_VARIANTS: &[&str] = &["DONE", "Task complete.\n\n**DONE**", "All good.\nDONE."];

const MALFORMED_VARIANTS: &[&str] = &[
    "I think we should use TypeScript.",
    "Let me think about the best approach here before deciding anything.",
    "Hmm, this is tricky, give me a moment.",
];

const WORKER_REPORT_VARIANTS: &[&str] = &[
    "Created the file as requested.",
    "Ran the command; output looked clean.",
    "Applied the edit successfully.",
    "Found no matches for that pattern.",
];

#[async_trait]
impl crate::ModelProvider for DebugMockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let text = self.pick_text();
        let mut chunks: Vec<ResponseEvent> = chunk_text(&text)
            .into_iter()
            .map(ResponseEvent::TextDelta)
            .collect();
        chunks.push(ResponseEvent::Usage {
            input_tokens: 10,
            output_tokens: 10,
        });
        chunks.push(ResponseEvent::Done);

        let stream = futures::stream::unfold(chunks.into_iter(), |mut iter| async move {
            let ev = iter.next()?;
            if matches!(ev, ResponseEvent::TextDelta(_)) {
                let delay_ms = rand::thread_rng().gen_range(20..=30);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Some((Ok(ev), iter))
        });
        Ok(Box::pin(stream))
    }
}

/// Split text into small chunks (~4-8 chars) to simulate streaming deltas.
fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let mut rng = rand::thread_rng();
        let len = rng.gen_range(4..=8).min(chars.len() - i);
        out.push(chars[i..i + len].iter().collect());
        i += len;
    }
    out
}
