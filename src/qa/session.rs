// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::handler::{self, QARequest, QAResult, QaError};
use super::params::{GenerationConfig, ParamError};
use crate::models::{LoadOutcome, ModelCatalog, ModelHandle, ModelLoader};

/// Sessions kept before the least recently used one is dropped
pub const DEFAULT_MAX_SESSIONS: usize = 256;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),
    #[error("Unknown model '{0}'")]
    UnknownModel(String),
    #[error(transparent)]
    InvalidConfig(#[from] ParamError),
    #[error(transparent)]
    Qa(#[from] QaError),
}

/// Outcome of the most recent model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded { engine_id: String },
    Failed { message: String },
}

impl From<&LoadOutcome> for LoadStatus {
    fn from(outcome: &LoadOutcome) -> Self {
        match (&outcome.handle, &outcome.error) {
            (Some(handle), _) => LoadStatus::Loaded {
                engine_id: handle.engine.id().to_string(),
            },
            (None, Some(message)) => LoadStatus::Failed {
                message: message.clone(),
            },
            (None, None) => LoadStatus::Failed {
                message: format!("Error loading model: {}", outcome.key),
            },
        }
    }
}

/// Per-user interaction state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub selected_label: String,
    pub config: GenerationConfig,
    pub load_status: LoadStatus,
    pub created_at: DateTime<Utc>,
}

/// One form submission: the session as that submission left it, plus its answer
#[derive(Debug)]
pub struct Submission {
    pub session: Session,
    pub result: Result<QAResult, QaError>,
}

/// Sessions plus the catalog and loader they share
///
/// Sessions live in a bounded LRU; reading or updating a session marks it
/// as recently used.
pub struct SessionStore {
    catalog: Arc<ModelCatalog>,
    loader: Arc<ModelLoader>,
    sessions: Mutex<LruCache<Uuid, Session>>,
}

impl SessionStore {
    pub fn new(catalog: Arc<ModelCatalog>, loader: Arc<ModelLoader>) -> Self {
        Self {
            catalog,
            loader,
            sessions: Mutex::new(LruCache::new(capacity(DEFAULT_MAX_SESSIONS))),
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.sessions = Mutex::new(LruCache::new(capacity(max_sessions)));
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    /// Start a session on the default model with default parameters
    pub async fn create(&self) -> Session {
        let label = self.catalog.default_label().to_string();
        let load_status = self.load_label(&label).await.unwrap_or_else(|e| LoadStatus::Failed {
            message: e.to_string(),
        });
        self.insert(label, load_status).await
    }

    /// Start a session on a specific catalog entry
    pub async fn create_with_model(&self, label: &str) -> Result<Session, SessionError> {
        let load_status = self.load_label(label).await?;
        Ok(self.insert(label.to_string(), load_status).await)
    }

    async fn insert(&self, selected_label: String, load_status: LoadStatus) -> Session {
        let session = Session {
            id: Uuid::new_v4(),
            selected_label,
            config: GenerationConfig::default(),
            load_status,
            created_at: Utc::now(),
        };
        info!("🆕 Session {} created", session.id);
        let evicted = self.sessions.lock().await.push(session.id, session.clone());
        if let Some((evicted_id, _)) = evicted {
            debug!("Session {} evicted", evicted_id);
        }
        session
    }

    pub async fn get(&self, id: Uuid) -> Result<Session, SessionError> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Switch the session to another catalog entry, loading it if needed
    pub async fn select_model(&self, id: Uuid, label: &str) -> Result<Session, SessionError> {
        self.get(id).await?;
        let load_status = self.load_label(label).await?;

        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.selected_label = label.to_string();
        session.load_status = load_status;
        debug!("Session {} selected '{}'", id, label);
        Ok(session.clone())
    }

    /// Replace the session's parameters after range validation
    pub async fn update_config(
        &self,
        id: Uuid,
        config: GenerationConfig,
    ) -> Result<Session, SessionError> {
        config.validate()?;
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.config = config;
        Ok(session.clone())
    }

    /// Answer a question with the session's current model and parameters
    pub async fn generate(&self, id: Uuid, request: &QARequest) -> Result<QAResult, SessionError> {
        let session = self.get(id).await?;
        let descriptor = self
            .catalog
            .get(&session.selected_label)
            .ok_or_else(|| SessionError::UnknownModel(session.selected_label.clone()))?;

        let outcome = self.loader.load_descriptor(descriptor).await;
        Ok(handler::handle(outcome.handle.as_ref(), request, &session.config).await?)
    }

    /// Apply one form submission's model and parameters, then answer with them
    ///
    /// The answer uses the handle and config resolved by this call, so a
    /// concurrent submission on the same session cannot swap either.
    pub async fn submit(
        &self,
        id: Uuid,
        label: &str,
        config: GenerationConfig,
        request: &QARequest,
    ) -> Result<Submission, SessionError> {
        config.validate()?;
        self.get(id).await?;
        let descriptor = self
            .catalog
            .get(label)
            .ok_or_else(|| SessionError::UnknownModel(label.to_string()))?;
        let outcome = self.loader.load_descriptor(descriptor).await;

        let session = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
            session.selected_label = label.to_string();
            session.config = config;
            session.load_status = LoadStatus::from(&outcome);
            session.clone()
        };

        let handle: Option<ModelHandle> = outcome.handle;
        let result = handler::handle(handle.as_ref(), request, &config).await;
        Ok(Submission { session, result })
    }

    async fn load_label(&self, label: &str) -> Result<LoadStatus, SessionError> {
        let descriptor = self
            .catalog
            .get(label)
            .ok_or_else(|| SessionError::UnknownModel(label.to_string()))?;
        let outcome = self.loader.load_descriptor(descriptor).await;
        Ok(LoadStatus::from(&outcome))
    }
}

fn capacity(max_sessions: usize) -> NonZeroUsize {
    NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN)
}
