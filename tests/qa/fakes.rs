// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// In-process stand-ins for the llama.cpp engine
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use llama_ipfs_qa::inference::{
    find_stop, Completion, CompletionEngine, CompletionRequest, EngineFactory,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    NoChoices,
    Fail(String),
}

pub struct FakeEngine {
    id: String,
    reply: Reply,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeEngine {
    pub fn new(id: &str, reply: Reply) -> Self {
        Self {
            id: id.to_string(),
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionEngine for FakeEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            Reply::Text(text) => {
                let mut text = text.clone();
                if let Some(idx) = find_stop(&text, &request.stop) {
                    text.truncate(idx);
                }
                Ok(Completion::single(text, "stop"))
            }
            Reply::NoChoices => Ok(Completion {
                choices: Vec::new(),
                tokens_generated: 0,
            }),
            Reply::Fail(message) => Err(anyhow!("{}", message)),
        }
    }
}

/// Builds `FakeEngine`s and remembers every one it built
pub struct FakeFactory {
    reply: Reply,
    delay: Option<Duration>,
    failing_locators: HashSet<String>,
    constructions: AtomicUsize,
    engines: Mutex<Vec<Arc<FakeEngine>>>,
}

impl FakeFactory {
    pub fn answering(text: &str) -> Self {
        Self::with_reply(Reply::Text(text.to_string()))
    }

    pub fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: None,
            failing_locators: HashSet::new(),
            constructions: AtomicUsize::new(0),
            engines: Mutex::new(Vec::new()),
        }
    }

    /// Engine construction sleeps, to widen race windows
    pub fn with_construct_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_for(mut self, locator: &str) -> Self {
        self.failing_locators.insert(locator.to_string());
        self
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    pub fn engines(&self) -> Vec<Arc<FakeEngine>> {
        self.engines.lock().unwrap().clone()
    }

    pub fn total_engine_calls(&self) -> usize {
        self.engines().iter().map(|e| e.calls()).sum()
    }
}

#[async_trait]
impl EngineFactory for FakeFactory {
    async fn construct(
        &self,
        repository_locator: &str,
        filename: &str,
        _verbose: bool,
    ) -> Result<Arc<dyn CompletionEngine>> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_locators.contains(repository_locator) {
            return Err(anyhow!("no route to {}", repository_locator));
        }

        let engine = Arc::new(FakeEngine::new(
            &format!("{}/{}", repository_locator, filename),
            self.reply.clone(),
        ));
        self.engines.lock().unwrap().push(engine.clone());
        Ok(engine)
    }
}

pub fn two_model_catalog() -> llama_ipfs_qa::ModelCatalog {
    use llama_ipfs_qa::ModelDescriptor;
    llama_ipfs_qa::ModelCatalog::new(vec![
        ModelDescriptor::new(
            "GPT-2 (117M)",
            "ipfs://bafybeie7quk74kmqg34nl2ewdwmsrlvvt6heayien364gtu2x6g2qpznhq",
            "ggml-model-Q4_K_M.gguf",
        ),
        ModelDescriptor::new("TinyLlama", "TheBloke/TinyLlama-1.1B-GGUF", "tinyllama.Q4_K_M.gguf"),
    ])
    .unwrap()
}
