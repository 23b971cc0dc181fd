// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! `ipfs://` locator support
//!
//! Resolution order for `ipfs://<cid>[/<path>]` + filename:
//!
//! ```text
//! {cache_dir}/{cid}/{path}/{filename}   (hit: returned as-is, no network)
//!        ↓ miss
//! local IPFS node  (RPC API, POST /api/v0/cat?arg=/ipfs/<cid>/<path>/<filename>)
//!        ↓ failure
//! gateways in configured order  ({gateway}/ipfs/<cid>/<path>/<filename>)
//! ```
//!
//! Downloads are written to a `.part` file next to the final path and renamed
//! once complete, so a crashed download never looks like a cached artifact.

use async_trait::async_trait;
use bytes::Bytes;
use data_encoding::BASE32_NOPAD;
use futures::{Stream, TryStreamExt};
use reqwest::{Client, Response};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::resolver::{ArtifactResolver, ResolveError, ResolverRegistry};
use crate::provision::Activation;

/// Content identifier, checked to be a CIDv0 or a base32 CIDv1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cid(String);

impl FromStr for Cid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("Qm") {
            let bytes = bs58::decode(s).into_vec().map_err(|e| e.to_string())?;
            // sha2-256 multihash: code 0x12, 32-byte digest
            return match bytes.as_slice() {
                [0x12, 0x20, digest @ ..] if digest.len() == 32 => Ok(Self(s.to_string())),
                _ => Err("CIDv0 must be a base58 sha2-256 multihash".to_string()),
            };
        }

        if let Some(body) = s.strip_prefix(|c: char| c == 'b' || c == 'B') {
            let bytes = BASE32_NOPAD
                .decode(body.to_ascii_uppercase().as_bytes())
                .map_err(|e| e.to_string())?;
            // version, codec, then a multihash
            return match bytes.as_slice() {
                [0x01, _, _, ..] => Ok(Self(s.to_string())),
                _ => Err("CIDv1 must start with version 1".to_string()),
            };
        }

        Err("expected a CIDv0 (Qm...) or base32 CIDv1 (b...)".to_string())
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed `ipfs://` locator
#[derive(Debug, Clone, PartialEq)]
pub struct IpfsLocator {
    pub cid: Cid,
    /// Optional path inside the CID's directory
    pub path: Option<String>,
}

impl FromStr for IpfsLocator {
    type Err = ResolveError;

    fn from_str(locator: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ResolveError::InvalidLocator {
            locator: locator.to_string(),
            reason,
        };

        let rest = locator
            .strip_prefix("ipfs://")
            .ok_or_else(|| invalid("expected an ipfs:// locator".to_string()))?
            .trim_matches('/');

        let (cid_part, path) = match rest.split_once('/') {
            Some((cid, path)) => (cid, Some(path.to_string())),
            None => (rest, None),
        };
        if cid_part.is_empty() {
            return Err(invalid("missing CID".to_string()));
        }

        let cid: Cid = cid_part
            .parse()
            .map_err(|e| invalid(format!("bad CID: {}", e)))?;
        if let Some(ref p) = path {
            check_relative(p).map_err(invalid)?;
        }

        Ok(Self { cid, path })
    }
}

impl fmt::Display for IpfsLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path {
            Some(ref path) => write!(f, "ipfs://{}/{}", self.cid, path),
            None => write!(f, "ipfs://{}", self.cid),
        }
    }
}

impl IpfsLocator {
    /// `<cid>[/<path>]/<filename>`, as used after `/ipfs/` on nodes and gateways
    pub fn content_path(&self, filename: &str) -> String {
        match self.path {
            Some(ref path) => format!("{}/{}/{}", self.cid, path, filename),
            None => format!("{}/{}", self.cid, filename),
        }
    }
}

/// Reject anything that could escape the cache directory
fn check_relative(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty path segment".to_string());
    }
    let ok = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(format!("path '{}' must be relative without '..'", path))
    }
}

#[derive(Debug, Clone)]
pub struct IpfsResolverConfig {
    pub cache_dir: PathBuf,
    pub api_url: Option<String>,
    pub gateways: Vec<String>,
}

pub struct IpfsResolver {
    config: IpfsResolverConfig,
    http: Client,
}

impl IpfsResolver {
    pub fn new(config: IpfsResolverConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("llama-ipfs-qa/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    /// Where an artifact is (or will be) cached locally
    pub fn cache_path(&self, locator: &IpfsLocator, filename: &str) -> PathBuf {
        let mut path = self.config.cache_dir.join(locator.cid.to_string());
        if let Some(ref sub) = locator.path {
            path = path.join(sub);
        }
        path.join(filename)
    }

    async fn fetch_from_node(
        &self,
        api_url: &str,
        content_path: &str,
        dest: &Path,
    ) -> Result<u64, String> {
        let url = format!("{}/api/v0/cat", api_url.trim_end_matches('/'));
        debug!("Fetching /ipfs/{} via {}", content_path, url);

        let response = self
            .http
            .post(&url)
            .query(&[("arg", format!("/ipfs/{}", content_path))])
            .send()
            .await
            .map_err(|e| e.to_string())?;
        write_response(response, dest).await
    }

    async fn fetch_from_gateway(
        &self,
        gateway: &str,
        content_path: &str,
        dest: &Path,
    ) -> Result<u64, String> {
        let url = format!("{}/ipfs/{}", gateway.trim_end_matches('/'), content_path);
        debug!("Fetching {}", url);

        let response = self.http.get(&url).send().await.map_err(|e| e.to_string())?;
        write_response(response, dest).await
    }
}

async fn write_response(response: Response, dest: &Path) -> Result<u64, String> {
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    write_stream(response.bytes_stream().map_err(|e| e.to_string()), dest).await
}

async fn write_stream<S>(stream: S, dest: &Path) -> Result<u64, String>
where
    S: Stream<Item = Result<Bytes, String>>,
{
    futures::pin_mut!(stream);

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| format!("cannot create {}: {}", dest.display(), e))?;
    let mut written = 0u64;

    while let Some(chunk) = stream.try_next().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("write to {} failed: {}", dest.display(), e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| e.to_string())?;

    if written == 0 {
        return Err("empty response".to_string());
    }
    Ok(written)
}

#[async_trait]
impl ArtifactResolver for IpfsResolver {
    fn scheme(&self) -> &str {
        "ipfs"
    }

    async fn resolve(&self, locator: &str, filename: &str) -> Result<PathBuf, ResolveError> {
        let parsed: IpfsLocator = locator.parse()?;
        check_relative(filename).map_err(|reason| ResolveError::InvalidLocator {
            locator: format!("{}/{}", locator, filename),
            reason,
        })?;

        let final_path = self.cache_path(&parsed, filename);
        if tokio::fs::metadata(&final_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            debug!("IPFS cache hit: {}", final_path.display());
            return Ok(final_path);
        }

        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part_path = final_path.with_file_name(format!(
            "{}.part",
            final_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("artifact")
        ));

        let content_path = parsed.content_path(filename);
        let mut attempts = Vec::new();

        info!("⬇️  Fetching {} from IPFS (first run may take a while)", content_path);

        if let Some(ref api_url) = self.config.api_url {
            match self.fetch_from_node(api_url, &content_path, &part_path).await {
                Ok(bytes) => {
                    tokio::fs::rename(&part_path, &final_path).await?;
                    info!("✅ Fetched {} bytes from local IPFS node", bytes);
                    return Ok(final_path);
                }
                Err(e) => {
                    warn!("Local IPFS node unavailable for {}: {}", content_path, e);
                    attempts.push(format!("ipfs node: {}", e));
                }
            }
        }

        for gateway in &self.config.gateways {
            match self.fetch_from_gateway(gateway, &content_path, &part_path).await {
                Ok(bytes) => {
                    tokio::fs::rename(&part_path, &final_path).await?;
                    info!("✅ Fetched {} bytes from gateway {}", bytes, gateway);
                    return Ok(final_path);
                }
                Err(e) => {
                    warn!("Gateway {} failed for {}: {}", gateway, content_path, e);
                    attempts.push(format!("{}: {}", gateway, e));
                }
            }
        }

        let _ = tokio::fs::remove_file(&part_path).await;
        Err(ResolveError::AllSourcesFailed {
            locator: locator.to_string(),
            filename: filename.to_string(),
            attempts,
        })
    }
}

/// Teaches the resolver registry the `ipfs://` scheme
pub struct IpfsActivation {
    registry: Arc<ResolverRegistry>,
    resolver: Arc<IpfsResolver>,
}

impl IpfsActivation {
    pub fn new(registry: Arc<ResolverRegistry>, resolver: Arc<IpfsResolver>) -> Self {
        Self { registry, resolver }
    }
}

#[async_trait]
impl Activation for IpfsActivation {
    fn name(&self) -> &str {
        "ipfs"
    }

    async fn activate(&self) -> anyhow::Result<()> {
        self.registry.register(self.resolver.clone())?;
        info!(
            "IPFS integration active (cache: {})",
            self.resolver.cache_dir().display()
        );
        Ok(())
    }
}
