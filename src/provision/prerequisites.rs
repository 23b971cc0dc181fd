// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::path::PathBuf;
#[cfg(feature = "inference")]
use std::sync::Arc;
use tracing::debug;

use super::Prerequisite;
#[cfg(feature = "inference")]
use crate::inference::LlamaRuntime;

/// A directory that must exist (created with parents when missing)
pub struct DirectoryPrerequisite {
    name: String,
    path: PathBuf,
}

impl DirectoryPrerequisite {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Prerequisite for DirectoryPrerequisite {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_present(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn install(&self, quiet: bool) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.path).await?;
        if !quiet {
            debug!("Created {}", self.path.display());
        }
        Ok(())
    }
}

/// The llama.cpp backend, initialised once per process
#[cfg(feature = "inference")]
pub struct LlamaBackendPrerequisite {
    runtime: Arc<LlamaRuntime>,
}

#[cfg(feature = "inference")]
impl LlamaBackendPrerequisite {
    pub fn new(runtime: Arc<LlamaRuntime>) -> Self {
        Self { runtime }
    }
}

#[cfg(feature = "inference")]
#[async_trait]
impl Prerequisite for LlamaBackendPrerequisite {
    fn name(&self) -> &str {
        "llama-backend"
    }

    async fn is_present(&self) -> bool {
        self.runtime.is_initialized()
    }

    async fn install(&self, _quiet: bool) -> anyhow::Result<()> {
        self.runtime.init()?;
        Ok(())
    }
}
