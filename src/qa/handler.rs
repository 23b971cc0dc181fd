// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use super::params::GenerationConfig;
use crate::inference::CompletionRequest;
use crate::models::ModelHandle;

/// Generation halts at the first newline
pub const STOP_SEQUENCE: &str = "\n";

pub const MODEL_NOT_LOADED: &str = "Model not loaded. Please check the error message above.";

#[derive(Debug, Error)]
pub enum QaError {
    #[error("Model not loaded. Please check the error message above.")]
    ModelNotLoaded,
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Inference returned no choices")]
    EmptyCompletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QARequest {
    pub context: String,
    pub question: String,
}

impl QARequest {
    pub fn new(context: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            question: question.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QAResult {
    /// Prompt as assembled; the engine drops control characters other than
    /// tab, newline and carriage return before tokenizing it
    pub prompt: String,
    pub answer: String,
    /// Duration of the engine call alone
    pub elapsed_seconds: f64,
}

/// The one-word extractive QA prompt
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Context: {}\nQuestion: {}\nBased solely on the above context, answer the question in one word:",
        context, question
    )
}

/// Run one question against a loaded model
pub async fn handle(
    model: Option<&ModelHandle>,
    request: &QARequest,
    config: &GenerationConfig,
) -> Result<QAResult, QaError> {
    let model = model.ok_or(QaError::ModelNotLoaded)?;

    let prompt = build_prompt(&request.context, &request.question);
    let completion_request = CompletionRequest {
        prompt: prompt.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        top_p: config.top_p,
        repeat_penalty: config.repeat_penalty,
        stop: vec![STOP_SEQUENCE.to_string()],
    };
    debug!("Prompt for {}: {:?}", model.engine.id(), prompt);

    let start = Instant::now();
    let completion = model
        .engine
        .complete(completion_request)
        .await
        .map_err(|e| QaError::Inference(format!("{:#}", e)));
    let elapsed_seconds = start.elapsed().as_secs_f64();
    let completion = completion?;

    let answer = completion
        .choices
        .first()
        .map(|choice| choice.text.trim().to_string())
        .ok_or(QaError::EmptyCompletion)?;

    info!(
        "💬 Answered in {:.2}s with {} ({} tokens)",
        elapsed_seconds,
        model.engine.id(),
        completion.tokens_generated
    );

    Ok(QAResult {
        prompt,
        answer,
        elapsed_seconds,
    })
}
