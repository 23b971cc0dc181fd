// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod engine;
#[cfg(feature = "inference")]
pub mod llama;

pub use engine::{
    dropped_prompt_chars, find_stop, sanitize_prompt_for_tokenizer, Choice, Completion,
    CompletionEngine, CompletionRequest, EngineConfig, EngineFactory, UnavailableEngineFactory,
};
#[cfg(feature = "inference")]
pub use llama::{LlamaEngine, LlamaEngineFactory, LlamaRuntime};
