// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Unsupported locator scheme '{scheme}' in '{locator}'")]
    UnsupportedScheme { scheme: String, locator: String },
    #[error("Invalid locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },
    #[error("Artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Download from {source_name} failed: {reason}")]
    Download { source_name: String, reason: String },
    #[error("Could not fetch {filename} from {locator}; tried: {}", .attempts.join("; "))]
    AllSourcesFailed {
        locator: String,
        filename: String,
        attempts: Vec<String>,
    },
    #[error("Resolver registry unavailable: {0}")]
    RegistryUnavailable(String),
}

/// Resolves locators of one scheme into local artifact paths
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Scheme handled by this resolver, without the `://` suffix
    fn scheme(&self) -> &str;

    async fn resolve(&self, locator: &str, filename: &str) -> Result<PathBuf, ResolveError>;
}

/// Scheme of a repository locator
///
/// Explicit `scheme://` prefixes win. Paths (absolute, `./`, `../`) are
/// `file`, and anything else is treated as a Hugging Face repository id.
pub fn scheme_of(locator: &str) -> &str {
    if let Some(idx) = locator.find("://") {
        return &locator[..idx];
    }
    if locator.starts_with('/') || locator.starts_with("./") || locator.starts_with("../") {
        "file"
    } else {
        "hf"
    }
}

/// Scheme-keyed set of resolvers shared by every engine construction
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: RwLock<HashMap<String, Arc<dyn ArtifactResolver>>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the resolver for its scheme
    pub fn register(&self, resolver: Arc<dyn ArtifactResolver>) -> Result<(), ResolveError> {
        let scheme = resolver.scheme().to_string();
        debug!("Registering artifact resolver for scheme '{}'", scheme);
        let mut resolvers = self.resolvers.write().map_err(|e| {
            error!("❌ Cannot register '{}' resolver: {}", scheme, e);
            ResolveError::RegistryUnavailable(e.to_string())
        })?;
        resolvers.insert(scheme, resolver);
        Ok(())
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        self.resolvers
            .read()
            .map(|r| r.contains_key(scheme))
            .unwrap_or(false)
    }

    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self
            .resolvers
            .read()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        schemes.sort();
        schemes
    }

    pub async fn resolve(&self, locator: &str, filename: &str) -> Result<PathBuf, ResolveError> {
        let scheme = scheme_of(locator);
        let resolver = self
            .resolvers
            .read()
            .map_err(|e| ResolveError::RegistryUnavailable(e.to_string()))?
            .get(scheme)
            .cloned()
            .ok_or_else(|| ResolveError::UnsupportedScheme {
                scheme: scheme.to_string(),
                locator: locator.to_string(),
            })?;

        resolver.resolve(locator, filename).await
    }
}

/// Artifacts that already live on the local filesystem
pub struct LocalFileResolver;

#[async_trait]
impl ArtifactResolver for LocalFileResolver {
    fn scheme(&self) -> &str {
        "file"
    }

    async fn resolve(&self, locator: &str, filename: &str) -> Result<PathBuf, ResolveError> {
        let dir = locator.strip_prefix("file://").unwrap_or(locator);
        let path = Path::new(dir).join(filename);
        if tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            Ok(path)
        } else {
            Err(ResolveError::NotFound(path))
        }
    }
}
