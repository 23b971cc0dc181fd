// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime configuration for the QA service
//!
//! Everything is optional and read from the environment (a `.env` file is
//! honoured by the binaries through `dotenv`).

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::inference::EngineConfig;
use crate::qa::DEFAULT_MAX_SESSIONS;
use crate::storage::IpfsResolverConfig;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8501";
pub const DEFAULT_IPFS_API_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_IPFS_GATEWAYS: &[&str] = &["https://ipfs.io", "https://dweb.link"];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid listen address '{0}'")]
    InvalidListenAddr(String),
    #[error("Invalid URL for {field}: '{value}'")]
    InvalidUrl { field: String, value: String },
    #[error("At least one IPFS gateway is required when no local IPFS node is configured")]
    NoIpfsSource,
    #[error("{0} must be greater than 0")]
    MustBePositive(&'static str),
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP surface binds to
    pub listen_addr: String,
    /// Root directory for downloaded model artifacts
    pub models_dir: PathBuf,
    /// IPFS HTTP API of a local node (`None` skips the node)
    pub ipfs_api_url: Option<String>,
    /// Public gateways tried in order after the local node
    pub ipfs_gateways: Vec<String>,
    /// Layers offloaded to the GPU (0 = CPU only)
    pub gpu_layers: u32,
    /// Context window used for each generation
    pub context_size: u32,
    /// Prompt batch size
    pub batch_size: u32,
    /// Forward llama.cpp diagnostics to the log
    pub verbose: bool,
    /// Sessions kept in memory before the least recently used is dropped
    pub max_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            models_dir: PathBuf::from("./models"),
            ipfs_api_url: Some(DEFAULT_IPFS_API_URL.to_string()),
            ipfs_gateways: DEFAULT_IPFS_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            gpu_layers: 0,
            context_size: 2048,
            batch_size: 512,
            verbose: false,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // An empty IPFS_API_URL disables the local node entirely
        let ipfs_api_url = match lookup("IPFS_API_URL") {
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(url.trim().to_string()),
            None => defaults.ipfs_api_url,
        };

        let ipfs_gateways = lookup("IPFS_GATEWAYS")
            .map(|v| {
                v.split(',')
                    .map(|g| g.trim().trim_end_matches('/').to_string())
                    .filter(|g| !g.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.ipfs_gateways);

        Self {
            listen_addr: lookup("QA_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            models_dir: lookup("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            ipfs_api_url,
            ipfs_gateways,
            gpu_layers: lookup("GPU_LAYERS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.gpu_layers),
            context_size: lookup("MAX_CONTEXT_LENGTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.context_size),
            batch_size: lookup("LLAMA_BATCH_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            verbose: lookup("LLAMA_VERBOSE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.verbose),
            max_sessions: lookup("MAX_SESSIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_sessions),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidListenAddr(self.listen_addr.clone()))?;

        if let Some(ref api_url) = self.ipfs_api_url {
            check_http_url("IPFS_API_URL", api_url)?;
        }
        for gateway in &self.ipfs_gateways {
            check_http_url("IPFS_GATEWAYS", gateway)?;
        }
        if self.ipfs_api_url.is_none() && self.ipfs_gateways.is_empty() {
            return Err(ConfigError::NoIpfsSource);
        }

        if self.context_size == 0 {
            return Err(ConfigError::MustBePositive("MAX_CONTEXT_LENGTH"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::MustBePositive("LLAMA_BATCH_SIZE"));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::MustBePositive("MAX_SESSIONS"));
        }
        Ok(())
    }

    /// Directory holding artifacts fetched from IPFS
    pub fn ipfs_cache_dir(&self) -> PathBuf {
        self.models_dir.join("ipfs")
    }

    /// Directory handed to the Hugging Face Hub client
    pub fn hub_cache_dir(&self) -> PathBuf {
        self.models_dir.join("huggingface")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            context_size: self.context_size,
            gpu_layers: self.gpu_layers,
            batch_size: self.batch_size,
        }
    }

    pub fn ipfs_resolver_config(&self) -> IpfsResolverConfig {
        IpfsResolverConfig {
            cache_dir: self.ipfs_cache_dir(),
            api_url: self.ipfs_api_url.clone(),
            gateways: self.ipfs_gateways.clone(),
        }
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        field: field.to_string(),
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(invalid()),
    }
}
