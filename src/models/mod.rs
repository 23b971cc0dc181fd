// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod catalog;
pub mod loader;

pub use catalog::{CatalogError, ModelCatalog, ModelDescriptor};
pub use loader::{LoadOutcome, ModelHandle, ModelKey, ModelLoader};
