// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{error, info};

use super::catalog::ModelDescriptor;
use crate::inference::{CompletionEngine, EngineFactory};

/// Cache key: one engine per (locator, filename) for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub repository_locator: String,
    pub filename: String,
}

impl ModelKey {
    pub fn new(repository_locator: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            repository_locator: repository_locator.into(),
            filename: filename.into(),
        }
    }
}

impl From<&ModelDescriptor> for ModelKey {
    fn from(descriptor: &ModelDescriptor) -> Self {
        Self::new(&descriptor.repository_locator, &descriptor.filename)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.repository_locator, self.filename)
    }
}

/// A loaded engine shared by every session that selects the same model
#[derive(Clone)]
pub struct ModelHandle {
    pub key: ModelKey,
    pub engine: Arc<dyn CompletionEngine>,
}

impl ModelHandle {
    pub fn ptr_eq(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("key", &self.key)
            .field("engine", &self.engine.id())
            .finish()
    }
}

/// Memoized result of a load; failures are cached as well
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub key: ModelKey,
    pub handle: Option<ModelHandle>,
    pub error: Option<String>,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }
}

/// Process-wide memoizing model loader
pub struct ModelLoader {
    factory: Arc<dyn EngineFactory>,
    cache: Mutex<HashMap<ModelKey, Arc<OnceCell<LoadOutcome>>>>,
    constructions: AtomicUsize,
    verbose: bool,
}

impl ModelLoader {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            cache: Mutex::new(HashMap::new()),
            constructions: AtomicUsize::new(0),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Load (or fetch from cache) the engine for a locator and filename
    ///
    /// Concurrent first loads of one key wait on a single construction.
    /// Construction errors are logged and returned inside the outcome.
    pub async fn load(&self, repository_locator: &str, filename: &str) -> LoadOutcome {
        let key = ModelKey::new(repository_locator, filename);
        let cell = {
            let mut cache = self.cache.lock().await;
            cache
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| self.construct(key)).await.clone()
    }

    pub async fn load_descriptor(&self, descriptor: &ModelDescriptor) -> LoadOutcome {
        self.load(&descriptor.repository_locator, &descriptor.filename)
            .await
    }

    async fn construct(&self, key: ModelKey) -> LoadOutcome {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        info!("🔄 Loading model {}", key);

        match self
            .factory
            .construct(&key.repository_locator, &key.filename, self.verbose)
            .await
        {
            Ok(engine) => {
                info!("✅ Model ready: {}", engine.id());
                LoadOutcome {
                    handle: Some(ModelHandle {
                        key: key.clone(),
                        engine,
                    }),
                    key,
                    error: None,
                }
            }
            Err(e) => {
                let message = format!("Error loading model: {:#}", e);
                error!("❌ {}", message);
                LoadOutcome {
                    key,
                    handle: None,
                    error: Some(message),
                }
            }
        }
    }

    /// Keys whose load has finished, successful or not
    pub async fn cached_keys(&self) -> Vec<ModelKey> {
        let cache = self.cache.lock().await;
        let mut keys: Vec<ModelKey> = cache
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Whether a successfully loaded engine is cached for `key`
    pub async fn is_cached(&self, key: &ModelKey) -> bool {
        self.peek(key)
            .await
            .map(|outcome| outcome.is_loaded())
            .unwrap_or(false)
    }

    /// Cached outcome for `key` without triggering a load
    pub async fn peek(&self, key: &ModelKey) -> Option<LoadOutcome> {
        let cache = self.cache.lock().await;
        cache.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of factory invocations so far
    pub fn construct_count(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}
