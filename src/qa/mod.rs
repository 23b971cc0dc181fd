// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Question answering over a loaded model
pub mod handler;
pub mod params;
pub mod session;

pub use handler::{build_prompt, handle, QARequest, QAResult, QaError, MODEL_NOT_LOADED, STOP_SEQUENCE};
pub use params::{GenerationConfig, ParamError, Slider, MAX_TOKENS, REPEAT_PENALTY, TEMPERATURE, TOP_P};
pub use session::{
    LoadStatus, Session, SessionError, SessionStore, Submission, DEFAULT_MAX_SESSIONS,
};
