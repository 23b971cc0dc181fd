// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod inference;
pub mod models;
pub mod provision;
pub mod qa;
pub mod storage;
pub mod version;

pub use app::App;
pub use config::AppConfig;
pub use inference::{Completion, CompletionEngine, CompletionRequest, EngineFactory};
pub use models::{ModelCatalog, ModelDescriptor, ModelHandle, ModelKey, ModelLoader};
pub use qa::{GenerationConfig, QARequest, QAResult, QaError, SessionStore};
