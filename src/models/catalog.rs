// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GPT2_LABEL: &str = "GPT-2 (117M)";
pub const GPT2_LOCATOR: &str = "ipfs://bafybeie7quk74kmqg34nl2ewdwmsrlvvt6heayien364gtu2x6g2qpznhq";
pub const GPT2_FILENAME: &str = "ggml-model-Q4_K_M.gguf";

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("Catalog must contain at least one model")]
    Empty,
    #[error("Duplicate model label '{0}'")]
    DuplicateLabel(String),
}

/// A selectable model: display label plus where its weights live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub label: String,
    pub repository_locator: String,
    pub filename: String,
}

impl ModelDescriptor {
    pub fn new(
        label: impl Into<String>,
        repository_locator: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            repository_locator: repository_locator.into(),
            filename: filename.into(),
        }
    }
}

/// Ordered, immutable set of models offered for selection
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    entries: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    pub fn new(entries: Vec<ModelDescriptor>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.label == entry.label) {
                return Err(CatalogError::DuplicateLabel(entry.label.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The catalog shipped with the service
    pub fn builtin() -> Self {
        Self {
            entries: vec![ModelDescriptor::new(
                GPT2_LABEL,
                GPT2_LOCATOR,
                GPT2_FILENAME,
            )],
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn get(&self, label: &str) -> Option<&ModelDescriptor> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// First entry; preselected in a fresh session
    pub fn default_label(&self) -> &str {
        &self.entries[0].label
    }

    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.entries
    }
}
