// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use llama_ipfs_qa::provision::{
    Activation, DirectoryPrerequisite, Prerequisite, ProvisionError, Provisioner, StepAction,
    READY_MESSAGE,
};
use llama_ipfs_qa::storage::{
    IpfsActivation, IpfsResolver, IpfsResolverConfig, ResolveError, ResolverRegistry,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingPrerequisite {
    name: &'static str,
    present: AtomicBool,
    installs: AtomicUsize,
    fail: bool,
}

impl CountingPrerequisite {
    fn new(name: &'static str, present: bool) -> Self {
        Self {
            name,
            present: AtomicBool::new(present),
            installs: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, false)
        }
    }
}

#[async_trait]
impl Prerequisite for CountingPrerequisite {
    fn name(&self) -> &str {
        self.name
    }

    async fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    async fn install(&self, quiet: bool) -> Result<()> {
        assert!(quiet, "installs run in quiet mode");
        self.installs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("installer exited with status 1"));
        }
        self.present.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct CountingActivation {
    calls: AtomicUsize,
}

#[async_trait]
impl Activation for CountingActivation {
    fn name(&self) -> &str {
        "ipfs"
    }

    async fn activate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_side_effects_run_once() {
    let backend = Arc::new(CountingPrerequisite::new("llama-backend", false));
    let cache = Arc::new(CountingPrerequisite::new("model-cache", true));
    let activation = Arc::new(CountingActivation::default());
    let provisioner = Provisioner::new(
        vec![
            backend.clone() as Arc<dyn Prerequisite>,
            cache.clone() as Arc<dyn Prerequisite>,
        ],
        activation.clone(),
    );

    assert!(provisioner.report().is_none());
    let first = provisioner.ensure_ready().await.unwrap();
    for _ in 0..5 {
        let again = provisioner.ensure_ready().await.unwrap();
        assert_eq!(again, first);
    }

    assert_eq!(backend.installs.load(Ordering::SeqCst), 1);
    assert_eq!(cache.installs.load(Ordering::SeqCst), 0);
    assert_eq!(activation.calls.load(Ordering::SeqCst), 1);

    assert_eq!(first.steps[0].action, StepAction::Installed);
    assert_eq!(first.steps[1].action, StepAction::AlreadyPresent);
    assert_eq!(first.installed(), vec!["llama-backend"]);
    assert!(first.integration_activated);
    assert_eq!(first.status_message(), READY_MESSAGE);
    assert_eq!(
        READY_MESSAGE,
        "Dependencies installed and IPFS integration activated!"
    );
}

#[tokio::test]
async fn test_install_failure_is_fatal_and_not_cached() {
    let ok = Arc::new(CountingPrerequisite::new("model-cache", false));
    let broken = Arc::new(CountingPrerequisite::failing("llama-backend"));
    let after = Arc::new(CountingPrerequisite::new("ipfs-cache", false));
    let activation = Arc::new(CountingActivation::default());
    let provisioner = Provisioner::new(
        vec![
            ok.clone() as Arc<dyn Prerequisite>,
            broken.clone() as Arc<dyn Prerequisite>,
            after.clone() as Arc<dyn Prerequisite>,
        ],
        activation.clone(),
    );

    let err = provisioner.ensure_ready().await.unwrap_err();
    match err {
        ProvisionError::InstallFailed { name, reason } => {
            assert_eq!(name, "llama-backend");
            assert!(reason.contains("status 1"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    // Earlier installs stay, later ones never ran, activation was skipped
    assert_eq!(ok.installs.load(Ordering::SeqCst), 1);
    assert_eq!(after.installs.load(Ordering::SeqCst), 0);
    assert_eq!(activation.calls.load(Ordering::SeqCst), 0);
    assert!(provisioner.report().is_none());
}

#[tokio::test]
async fn test_concurrent_callers_share_one_run() {
    let prerequisite = Arc::new(CountingPrerequisite::new("model-cache", false));
    let activation = Arc::new(CountingActivation::default());
    let provisioner = Arc::new(Provisioner::new(
        vec![prerequisite.clone() as Arc<dyn Prerequisite>],
        activation.clone(),
    ));

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let provisioner = provisioner.clone();
        tasks.push(tokio::spawn(async move { provisioner.ensure_ready().await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(prerequisite.installs.load(Ordering::SeqCst), 1);
    assert_eq!(activation.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ipfs_scheme_only_after_activation() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ResolverRegistry::new());
    let resolver = Arc::new(
        IpfsResolver::new(IpfsResolverConfig {
            cache_dir: dir.path().join("ipfs"),
            api_url: None,
            gateways: vec!["http://127.0.0.1:9".to_string()],
        })
        .unwrap(),
    );
    let provisioner = Provisioner::new(
        vec![
            Arc::new(DirectoryPrerequisite::new("model-cache", dir.path().join("models")))
                as Arc<dyn Prerequisite>,
            Arc::new(DirectoryPrerequisite::new("ipfs-cache", dir.path().join("ipfs"))),
        ],
        Arc::new(IpfsActivation::new(registry.clone(), resolver)),
    );

    let cid = "bafybeie7quk74kmqg34nl2ewdwmsrlvvt6heayien364gtu2x6g2qpznhq";
    let locator = format!("ipfs://{}", cid);

    let before = registry.resolve(&locator, "m.gguf").await.unwrap_err();
    assert!(matches!(before, ResolveError::UnsupportedScheme { .. }));

    let report = provisioner.ensure_ready().await.unwrap();
    assert_eq!(report.installed(), vec!["model-cache", "ipfs-cache"]);
    assert!(dir.path().join("models").is_dir());
    assert!(registry.is_registered("ipfs"));

    // Cached artifact resolves through the registry without network access
    let cached = dir.path().join("ipfs").join(cid).join("m.gguf");
    std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
    std::fs::write(&cached, b"GGUF").unwrap();
    assert_eq!(registry.resolve(&locator, "m.gguf").await.unwrap(), cached);
}
