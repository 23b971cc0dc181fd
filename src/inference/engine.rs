// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub context_size: u32,
    pub gpu_layers: u32,
    pub batch_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_size: 2048,
            gpu_layers: 0,
            batch_size: 512,
        }
    }
}

/// One completion call: prompt plus sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    /// Generation halts before the first occurrence of any of these
    pub stop: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub finish_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub choices: Vec<Choice>,
    pub tokens_generated: usize,
}

impl Completion {
    pub fn single(text: impl Into<String>, finish_reason: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                text: text.into(),
                finish_reason: finish_reason.into(),
            }],
            tokens_generated: 0,
        }
    }
}

/// A loaded model, ready to produce completions
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Identifier for logs, usually `<locator>/<filename>`
    fn id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}

/// Builds engines from a repository locator and artifact filename
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn construct(
        &self,
        repository_locator: &str,
        filename: &str,
        verbose: bool,
    ) -> Result<Arc<dyn CompletionEngine>>;
}

/// Factory used when the crate is built without llama.cpp
pub struct UnavailableEngineFactory;

#[async_trait]
impl EngineFactory for UnavailableEngineFactory {
    async fn construct(
        &self,
        _repository_locator: &str,
        _filename: &str,
        _verbose: bool,
    ) -> Result<Arc<dyn CompletionEngine>> {
        Err(anyhow::anyhow!(
            "this build has no inference backend (enable the `inference` feature)"
        ))
    }
}

/// Byte offset of the earliest stop sequence in `text`, if any
pub fn find_stop(text: &str, stop: &[String]) -> Option<usize> {
    stop.iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

/// Sanitize prompt text for tokenization
///
/// Removes characters that cause issues with C string handling in llama.cpp:
/// - Null bytes (\0) - C strings use null as terminator
/// - Other control characters except tab, newline and carriage return
pub fn sanitize_prompt_for_tokenizer(prompt: &str) -> String {
    prompt.chars().filter(|c| is_tokenizer_safe(*c)).collect()
}

/// Characters `sanitize_prompt_for_tokenizer` would remove, in order
pub fn dropped_prompt_chars(prompt: &str) -> Vec<char> {
    prompt.chars().filter(|c| !is_tokenizer_safe(*c)).collect()
}

fn is_tokenizer_safe(c: char) -> bool {
    c != '\0' && (c >= ' ' || c == '\t' || c == '\n' || c == '\r')
}
