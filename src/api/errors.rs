// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::qa::{ParamError, QaError, SessionError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    NotFound(String),
    ValidationError {
        field: String,
        message: String,
    },
    ModelNotFound {
        model: String,
        available_models: Vec<String>,
    },
    ModelNotLoaded(String),
    InferenceFailed(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::ModelNotFound {
                model,
                available_models,
            } => {
                let mut details = HashMap::new();
                details.insert(
                    "available_models".to_string(),
                    serde_json::Value::Array(
                        available_models
                            .iter()
                            .map(|m| serde_json::Value::String(m.clone()))
                            .collect(),
                    ),
                );
                (
                    "model_not_found",
                    format!("Model '{}' not found", model),
                    Some(details),
                )
            }
            ApiError::ModelNotLoaded(msg) => ("model_not_loaded", msg.clone(), None),
            ApiError::InferenceFailed(msg) => {
                ("inference_failed", format!("Inference failed: {}", msg), None)
            }
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) | ApiError::ModelNotFound { .. } => 404,
            ApiError::ValidationError { .. } => 400,
            ApiError::ModelNotLoaded(_) => 409,
            ApiError::InferenceFailed(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::ModelNotFound { model, .. } => write!(f, "Model '{}' not found", model),
            ApiError::ModelNotLoaded(msg) => write!(f, "{}", msg),
            ApiError::InferenceFailed(msg) => write!(f, "Inference failed: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ParamError> for ApiError {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::OutOfRange { field, .. } => ApiError::ValidationError {
                field: field.to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ApiError::NotFound(format!("Session {} not found", id)),
            SessionError::UnknownModel(model) => ApiError::ModelNotFound {
                model,
                available_models: Vec::new(),
            },
            SessionError::InvalidConfig(e) => e.into(),
            SessionError::Qa(QaError::ModelNotLoaded) => {
                ApiError::ModelNotLoaded(QaError::ModelNotLoaded.to_string())
            }
            SessionError::Qa(QaError::Inference(msg)) => ApiError::InferenceFailed(msg),
            SessionError::Qa(e @ QaError::EmptyCompletion) => {
                ApiError::InferenceFailed(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self.to_response())).into_response()
    }
}
