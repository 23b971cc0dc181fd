// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! One-shot dependency provisioning
//!
//! Each prerequisite is checked and installed when missing, then the storage
//! integration is activated. The whole sequence runs at most once per
//! `Provisioner`; later calls return the cached report.

pub mod prerequisites;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub use prerequisites::DirectoryPrerequisite;
#[cfg(feature = "inference")]
pub use prerequisites::LlamaBackendPrerequisite;

pub const READY_MESSAGE: &str = "Dependencies installed and IPFS integration activated!";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Failed to install {name}: {reason}")]
    InstallFailed { name: String, reason: String },
    #[error("Failed to activate {name}: {reason}")]
    ActivationFailed { name: String, reason: String },
}

/// Something the service needs before it can load models
#[async_trait]
pub trait Prerequisite: Send + Sync {
    fn name(&self) -> &str;

    async fn is_present(&self) -> bool;

    async fn install(&self, quiet: bool) -> anyhow::Result<()>;
}

/// Process-wide hook run after every prerequisite is present
#[async_trait]
pub trait Activation: Send + Sync {
    fn name(&self) -> &str;

    async fn activate(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    AlreadyPresent,
    Installed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionStep {
    pub name: String,
    pub action: StepAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub steps: Vec<ProvisionStep>,
    pub integration: String,
    pub integration_activated: bool,
    pub completed_at: DateTime<Utc>,
}

impl ProvisionReport {
    pub fn status_message(&self) -> &'static str {
        READY_MESSAGE
    }

    pub fn installed(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.action == StepAction::Installed)
            .map(|s| s.name.as_str())
            .collect()
    }
}

pub struct Provisioner {
    prerequisites: Vec<Arc<dyn Prerequisite>>,
    activation: Arc<dyn Activation>,
    quiet: bool,
    report: OnceCell<ProvisionReport>,
}

impl Provisioner {
    pub fn new(prerequisites: Vec<Arc<dyn Prerequisite>>, activation: Arc<dyn Activation>) -> Self {
        Self {
            prerequisites,
            activation,
            quiet: true,
            report: OnceCell::new(),
        }
    }

    /// Install missing prerequisites and activate the integration, once
    ///
    /// A failure is returned as-is and nothing is cached, so the caller
    /// decides whether to abort. Prerequisites installed before the failure
    /// stay installed.
    pub async fn ensure_ready(&self) -> Result<ProvisionReport, ProvisionError> {
        self.report
            .get_or_try_init(|| self.run())
            .await
            .cloned()
    }

    /// Report of a completed run, if any
    pub fn report(&self) -> Option<&ProvisionReport> {
        self.report.get()
    }

    async fn run(&self) -> Result<ProvisionReport, ProvisionError> {
        let mut steps = Vec::with_capacity(self.prerequisites.len());

        for prerequisite in &self.prerequisites {
            let name = prerequisite.name().to_string();
            let action = if prerequisite.is_present().await {
                debug!("{} already present", name);
                StepAction::AlreadyPresent
            } else {
                info!("Installing {}...", name);
                prerequisite
                    .install(self.quiet)
                    .await
                    .map_err(|e| ProvisionError::InstallFailed {
                        name: name.clone(),
                        reason: format!("{:#}", e),
                    })?;
                StepAction::Installed
            };
            steps.push(ProvisionStep { name, action });
        }

        let integration = self.activation.name().to_string();
        self.activation
            .activate()
            .await
            .map_err(|e| ProvisionError::ActivationFailed {
                name: integration.clone(),
                reason: format!("{:#}", e),
            })?;

        info!("✅ {}", READY_MESSAGE);
        Ok(ProvisionReport {
            steps,
            integration,
            integration_activated: true,
            completed_at: Utc::now(),
        })
    }
}
