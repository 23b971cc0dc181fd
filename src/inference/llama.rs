// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use llama_cpp_2::{
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel, Special},
    sampling::LlamaSampler,
};
use std::num::NonZeroU32;
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::engine::{
    dropped_prompt_chars, find_stop, sanitize_prompt_for_tokenizer, Completion, CompletionEngine,
    CompletionRequest, EngineConfig, EngineFactory,
};
use crate::storage::ResolverRegistry;

/// Tokens considered by the repeat penalty
const REPEAT_LAST_N: i32 = 64;

/// Process-wide llama.cpp backend
///
/// llama.cpp refuses a second backend initialisation, so every model shares
/// the one created here.
#[derive(Default)]
pub struct LlamaRuntime {
    backend: OnceLock<Arc<LlamaBackend>>,
}

impl LlamaRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&self) -> Result<Arc<LlamaBackend>> {
        if let Some(backend) = self.backend.get() {
            return Ok(backend.clone());
        }
        let backend = Arc::new(
            LlamaBackend::init().map_err(|e| anyhow!("Failed to initialize backend: {:?}", e))?,
        );
        // A racing initialiser would have failed above, so this always wins.
        Ok(self.backend.get_or_init(|| backend).clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.get().is_some()
    }
}

/// Builds llama.cpp engines from artifacts fetched through the resolver registry
pub struct LlamaEngineFactory {
    runtime: Arc<LlamaRuntime>,
    registry: Arc<ResolverRegistry>,
    config: EngineConfig,
}

impl LlamaEngineFactory {
    pub fn new(
        runtime: Arc<LlamaRuntime>,
        registry: Arc<ResolverRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            runtime,
            registry,
            config,
        }
    }
}

#[async_trait]
impl EngineFactory for LlamaEngineFactory {
    async fn construct(
        &self,
        repository_locator: &str,
        filename: &str,
        verbose: bool,
    ) -> Result<Arc<dyn CompletionEngine>> {
        let backend = self.runtime.init()?;
        let model_path = self.registry.resolve(repository_locator, filename).await?;
        info!("📦 Loading model from {}", model_path.display());

        let gpu_layers = self.config.gpu_layers;
        let path = model_path.clone();
        let load_backend = backend.clone();
        let model = tokio::task::spawn_blocking(move || {
            let model_params = LlamaModelParams::default().with_n_gpu_layers(gpu_layers);
            LlamaModel::load_from_file(&load_backend, &path, &model_params)
                .map_err(|e| anyhow!("Failed to load model: {:?}", e))
        })
        .await??;

        if verbose {
            info!(
                "✅ Model loaded: {} (vocab={}, train_ctx={}, gpu_layers={})",
                model_path.display(),
                model.n_vocab(),
                model.n_ctx_train(),
                gpu_layers
            );
        } else {
            info!("✅ Model loaded: {}", model_path.display());
        }

        Ok(Arc::new(LlamaEngine {
            id: format!("{}/{}", repository_locator.trim_end_matches('/'), filename),
            backend,
            model: Arc::new(model),
            context_size: self.config.context_size,
            batch_size: self.config.batch_size,
            verbose,
        }))
    }
}

pub struct LlamaEngine {
    id: String,
    backend: Arc<LlamaBackend>,
    model: Arc<LlamaModel>,
    context_size: u32,
    batch_size: u32,
    verbose: bool,
}

#[async_trait]
impl CompletionEngine for LlamaEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let backend = self.backend.clone();
        let model = self.model.clone();
        let context_size = self.context_size;
        let batch_size = self.batch_size;
        let verbose = self.verbose;

        tokio::task::spawn_blocking(move || {
            generate(&backend, &model, context_size, batch_size, verbose, &request)
        })
        .await?
    }
}

fn build_sampler(request: &CompletionRequest) -> LlamaSampler {
    let mut samplers = Vec::new();
    if request.repeat_penalty != 1.0 {
        samplers.push(LlamaSampler::penalties(
            REPEAT_LAST_N,
            request.repeat_penalty,
            0.0,
            0.0,
        ));
    }

    if request.temperature <= 0.0 {
        samplers.push(LlamaSampler::greedy());
    } else {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        samplers.push(LlamaSampler::top_p(request.top_p, 1));
        samplers.push(LlamaSampler::temp(request.temperature));
        samplers.push(LlamaSampler::dist(seed));
    }

    LlamaSampler::chain_simple(samplers)
}

fn generate(
    backend: &LlamaBackend,
    model: &LlamaModel,
    context_size: u32,
    batch_size: u32,
    verbose: bool,
    request: &CompletionRequest,
) -> Result<Completion> {
    let start_time = Instant::now();

    // The prompt shown to the user keeps these characters; the model never sees them.
    let dropped = dropped_prompt_chars(&request.prompt);
    if !dropped.is_empty() {
        warn!(
            "🧹 Sanitized prompt: removed {} control characters",
            dropped.len()
        );
        debug!("Dropped prompt characters: {:?}", dropped);
    }
    let sanitized_prompt = sanitize_prompt_for_tokenizer(&request.prompt);

    let prompt_tokens = model
        .str_to_token(&sanitized_prompt, AddBos::Always)
        .map_err(|e| anyhow!("Failed to tokenize: {:?}", e))?;
    if prompt_tokens.is_empty() {
        return Err(anyhow!("Prompt produced no tokens"));
    }

    let max_tokens = request.max_tokens as usize;
    if prompt_tokens.len() + max_tokens > context_size as usize {
        return Err(anyhow!(
            "Prompt ({} tokens) plus max_tokens ({}) exceeds context size {}",
            prompt_tokens.len(),
            max_tokens,
            context_size
        ));
    }

    // The whole prompt is decoded in one batch.
    let n_batch = (batch_size as usize).max(prompt_tokens.len());
    let ctx_params = LlamaContextParams::default()
        .with_n_ctx(NonZeroU32::new(context_size))
        .with_n_batch(n_batch as u32);
    let mut context = model
        .new_context(backend, ctx_params)
        .map_err(|e| anyhow!("Failed to create context: {:?}", e))?;

    let mut batch = LlamaBatch::new(n_batch, 1);
    let last_index = prompt_tokens.len() - 1;
    for (i, &token) in prompt_tokens.iter().enumerate() {
        batch
            .add(token, i as i32, &[0], i == last_index)
            .map_err(|e| anyhow!("Failed to add token to batch: {:?}", e))?;
    }
    context
        .decode(&mut batch)
        .map_err(|e| anyhow!("Decode failed: {:?}", e))?;

    let mut sampler = build_sampler(request);
    let eos_token = model.token_eos();
    let mut output = String::new();
    let mut n_cur = prompt_tokens.len();
    let mut finish_reason = "length";

    while n_cur < prompt_tokens.len() + max_tokens {
        let new_token_id = sampler.sample(&context, -1);

        if new_token_id == eos_token {
            finish_reason = "stop";
            break;
        }

        // Invalid UTF-8 pieces are dropped but the model state still advances.
        match model.token_to_str(new_token_id, Special::Plaintext) {
            Ok(piece) => output.push_str(&piece),
            Err(e) => debug!("Skipping undecodable token {}: {:?}", new_token_id, e),
        }

        if let Some(idx) = find_stop(&output, &request.stop) {
            output.truncate(idx);
            finish_reason = "stop";
            n_cur += 1;
            break;
        }

        batch.clear();
        batch
            .add(new_token_id, n_cur as i32, &[0], true)
            .map_err(|e| anyhow!("Failed to add token: {:?}", e))?;
        context
            .decode(&mut batch)
            .map_err(|e| anyhow!("Decode failed: {:?}", e))?;

        n_cur += 1;
    }

    let tokens_generated = n_cur - prompt_tokens.len();
    if verbose {
        info!(
            "🏁 Generation ended: prompt_tokens={}, tokens={}, chars={}, finish_reason={}, elapsed={:.2}s",
            prompt_tokens.len(),
            tokens_generated,
            output.len(),
            finish_reason,
            start_time.elapsed().as_secs_f64()
        );
    }

    let mut completion = Completion::single(output, finish_reason);
    completion.tokens_generated = tokens_generated;
    Ok(completion)
}
