// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Artifact resolution
//!
//! Turns a repository locator plus a filename into a local file the inference
//! engine can open. Locators are dispatched on their scheme; the `ipfs://`
//! scheme is only recognised once the IPFS integration has been activated.

pub mod huggingface;
pub mod ipfs;
pub mod resolver;

pub use huggingface::HubResolver;
pub use ipfs::{IpfsActivation, IpfsLocator, IpfsResolver, IpfsResolverConfig};
pub use resolver::{scheme_of, ArtifactResolver, LocalFileResolver, ResolveError, ResolverRegistry};
