// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use hf_hub::api::tokio::ApiBuilder;
use std::path::PathBuf;
use tracing::info;

use super::resolver::{ArtifactResolver, ResolveError};

/// Hugging Face Hub repositories (`hf://org/repo` or a bare `org/repo`)
pub struct HubResolver {
    cache_dir: PathBuf,
}

impl HubResolver {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn repo_id(locator: &str) -> Result<&str, ResolveError> {
        let repo = locator.strip_prefix("hf://").unwrap_or(locator).trim_matches('/');
        match repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(repo)
            }
            _ => Err(ResolveError::InvalidLocator {
                locator: locator.to_string(),
                reason: "expected <owner>/<repository>".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ArtifactResolver for HubResolver {
    fn scheme(&self) -> &str {
        "hf"
    }

    async fn resolve(&self, locator: &str, filename: &str) -> Result<PathBuf, ResolveError> {
        let repo_id = Self::repo_id(locator)?;
        let download_error = |reason: String| ResolveError::Download {
            source_name: "huggingface".to_string(),
            reason,
        };

        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .with_progress(false)
            .build()
            .map_err(|e| download_error(e.to_string()))?;

        info!("⬇️  Fetching {}/{} from Hugging Face Hub", repo_id, filename);
        api.model(repo_id.to_string())
            .get(filename)
            .await
            .map_err(|e| download_error(e.to_string()))
    }
}
