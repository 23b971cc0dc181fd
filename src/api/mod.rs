// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod handlers;
pub mod render;
pub mod server;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::{
    session_cookie, session_from_cookies, GenerateForm, HealthResponse, ModelInfo, ModelsResponse,
    SelectModelRequest, SESSION_COOKIE,
};
pub use server::{create_router, ApiConfig, ApiServer, AppState};
