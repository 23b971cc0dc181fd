// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Component wiring shared by the server and the CLI

use anyhow::Result;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::inference::EngineFactory;
use crate::models::{ModelCatalog, ModelLoader};
use crate::provision::{DirectoryPrerequisite, Prerequisite, Provisioner};
use crate::qa::SessionStore;
use crate::storage::{HubResolver, IpfsActivation, IpfsResolver, LocalFileResolver, ResolverRegistry};

pub struct App {
    pub config: AppConfig,
    pub registry: Arc<ResolverRegistry>,
    pub provisioner: Arc<Provisioner>,
    pub sessions: Arc<SessionStore>,
}

impl App {
    /// Wire the service around the llama.cpp engine
    #[cfg(feature = "inference")]
    pub fn build(config: AppConfig) -> Result<Self> {
        use crate::inference::{LlamaEngineFactory, LlamaRuntime};
        use crate::provision::LlamaBackendPrerequisite;

        let registry = base_registry(&config)?;
        let runtime = Arc::new(LlamaRuntime::new());
        let factory = Arc::new(LlamaEngineFactory::new(
            runtime.clone(),
            registry.clone(),
            config.engine_config(),
        ));
        let backend: Arc<dyn Prerequisite> = Arc::new(LlamaBackendPrerequisite::new(runtime));
        Self::assemble(config, registry, factory, ModelCatalog::builtin(), vec![backend])
    }

    #[cfg(not(feature = "inference"))]
    pub fn build(config: AppConfig) -> Result<Self> {
        let registry = base_registry(&config)?;
        let factory = Arc::new(crate::inference::UnavailableEngineFactory);
        Self::assemble(config, registry, factory, ModelCatalog::builtin(), Vec::new())
    }

    /// Wire the service around an arbitrary engine factory and catalog
    pub fn with_factory(
        config: AppConfig,
        factory: Arc<dyn EngineFactory>,
        catalog: ModelCatalog,
    ) -> Result<Self> {
        let registry = base_registry(&config)?;
        Self::assemble(config, registry, factory, catalog, Vec::new())
    }

    fn assemble(
        config: AppConfig,
        registry: Arc<ResolverRegistry>,
        factory: Arc<dyn EngineFactory>,
        catalog: ModelCatalog,
        mut prerequisites: Vec<Arc<dyn Prerequisite>>,
    ) -> Result<Self> {
        prerequisites.push(Arc::new(DirectoryPrerequisite::new(
            "model-cache",
            config.models_dir.clone(),
        )));
        prerequisites.push(Arc::new(DirectoryPrerequisite::new(
            "ipfs-cache",
            config.ipfs_cache_dir(),
        )));

        let ipfs = Arc::new(IpfsResolver::new(config.ipfs_resolver_config())?);
        let activation = Arc::new(IpfsActivation::new(registry.clone(), ipfs));
        let provisioner = Arc::new(Provisioner::new(prerequisites, activation));

        let loader = Arc::new(ModelLoader::new(factory).with_verbose(config.verbose));
        let sessions = Arc::new(
            SessionStore::new(Arc::new(catalog), loader).with_max_sessions(config.max_sessions),
        );

        Ok(Self {
            config,
            registry,
            provisioner,
            sessions,
        })
    }
}

/// Schemes available before provisioning: local paths and the Hugging Face Hub
fn base_registry(config: &AppConfig) -> Result<Arc<ResolverRegistry>> {
    let registry = Arc::new(ResolverRegistry::new());
    registry.register(Arc::new(LocalFileResolver))?;
    registry.register(Arc::new(HubResolver::new(config.hub_cache_dir())))?;
    Ok(registry)
}
