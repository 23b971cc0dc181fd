// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiError;
use crate::provision::ProvisionReport;
use crate::qa::{GenerationConfig, QARequest, MAX_TOKENS, REPEAT_PENALTY, TEMPERATURE, TOP_P};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectModelRequest {
    pub label: String,
}

impl SelectModelRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.label.trim().is_empty() {
            return Err(ApiError::ValidationError {
                field: "label".to_string(),
                message: "label must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Fields posted by the HTML form
///
/// Slider values arrive as raw numbers and are clamped, like a widget would.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub question: String,
}

fn default_temperature() -> f32 {
    TEMPERATURE.default
}

fn default_max_tokens() -> i64 {
    MAX_TOKENS.default as i64
}

fn default_top_p() -> f32 {
    TOP_P.default
}

fn default_repeat_penalty() -> f32 {
    REPEAT_PENALTY.default
}

impl GenerateForm {
    pub fn config(&self) -> GenerationConfig {
        let max_tokens = self
            .max_tokens
            .clamp(MAX_TOKENS.min as i64, MAX_TOKENS.max as i64) as u32;
        GenerationConfig {
            temperature: self.temperature,
            max_tokens,
            top_p: self.top_p,
            repeat_penalty: self.repeat_penalty,
        }
        .clamped()
    }

    pub fn request(&self) -> QARequest {
        QARequest::new(&self.context, &self.question)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub label: String,
    pub repository_locator: String,
    pub filename: String,
    /// An engine for this model is already loaded
    pub cached: bool,
    /// Memoized load failure, if the last attempt failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision: Option<ProvisionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cookie that lets a browser come back to its session
pub const SESSION_COOKIE: &str = "qa_session";

pub fn session_cookie(id: Uuid) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

/// Session id from the request's cookies, if present and well formed
pub fn session_from_cookies(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, id)| Uuid::parse_str(id).ok())
}
