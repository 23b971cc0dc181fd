// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use llama_ipfs_qa::inference::CompletionEngine;
use llama_ipfs_qa::models::ModelLoader;
use llama_ipfs_qa::qa::{
    GenerationConfig, LoadStatus, ParamError, QARequest, QaError, SessionError, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::fakes::{two_model_catalog, FakeFactory};

const GPT2: &str = "ipfs://bafybeie7quk74kmqg34nl2ewdwmsrlvvt6heayien364gtu2x6g2qpznhq";

fn store_with(factory: Arc<FakeFactory>) -> SessionStore {
    SessionStore::new(
        Arc::new(two_model_catalog()),
        Arc::new(ModelLoader::new(factory)),
    )
}

#[tokio::test]
async fn test_new_session_starts_from_defaults() {
    let store = store_with(Arc::new(FakeFactory::answering("Paris")));
    let session = store.create().await;

    assert_eq!(session.selected_label, "GPT-2 (117M)");
    assert_eq!(session.config, GenerationConfig::default());
    assert!(matches!(session.load_status, LoadStatus::Loaded { .. }));
    assert_eq!(store.get(session.id).await.unwrap().id, session.id);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_update_config_validates_ranges() {
    let store = store_with(Arc::new(FakeFactory::answering("Paris")));
    let session = store.create().await;

    let bad = GenerationConfig {
        temperature: 1.5,
        ..Default::default()
    };
    let err = store.update_config(session.id, bad).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidConfig(ParamError::OutOfRange { field: "temperature", .. })
    ));
    assert_eq!(
        store.get(session.id).await.unwrap().config,
        GenerationConfig::default()
    );

    let good = GenerationConfig {
        temperature: 0.4,
        max_tokens: 12,
        top_p: 0.8,
        repeat_penalty: 1.2,
    };
    let updated = store.update_config(session.id, good).await.unwrap();
    assert_eq!(updated.config, good);
}

#[tokio::test]
async fn test_generation_uses_session_config() {
    let factory = Arc::new(FakeFactory::answering("Paris"));
    let store = store_with(factory.clone());
    let session = store.create().await;
    let config = GenerationConfig {
        temperature: 0.9,
        max_tokens: 99,
        top_p: 0.3,
        repeat_penalty: 1.9,
    };
    store.update_config(session.id, config).await.unwrap();

    store
        .generate(session.id, &QARequest::new("c", "q"))
        .await
        .unwrap();

    let sent = factory.engines()[0].last_request().unwrap();
    assert_eq!(sent.max_tokens, 99);
    assert_eq!(sent.top_p, 0.3);
}

#[tokio::test]
async fn test_failed_load_disables_generation() {
    let factory = Arc::new(FakeFactory::answering("Paris").failing_for(GPT2));
    let store = store_with(factory.clone());
    let session = store.create().await;

    match &session.load_status {
        LoadStatus::Failed { message } => assert!(message.starts_with("Error loading model: ")),
        other => panic!("expected failure, got {:?}", other),
    }

    let err = store
        .generate(session.id, &QARequest::new("France is a country.", "Capital?"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Qa(QaError::ModelNotLoaded)));
    assert_eq!(factory.total_engine_calls(), 0);
    assert_eq!(factory.constructions(), 1);
}

#[tokio::test]
async fn test_unknown_model_and_session() {
    let store = store_with(Arc::new(FakeFactory::answering("Paris")));
    let session = store.create().await;

    let err = store.select_model(session.id, "GPT-5").await.unwrap_err();
    assert!(matches!(err, SessionError::UnknownModel(ref m) if m == "GPT-5"));
    assert_eq!(
        store.get(session.id).await.unwrap().selected_label,
        "GPT-2 (117M)"
    );

    let missing = Uuid::new_v4();
    assert!(matches!(
        store.get(missing).await,
        Err(SessionError::NotFound(id)) if id == missing
    ));
    assert!(store
        .create_with_model("GPT-5")
        .await
        .is_err());
}

#[tokio::test]
async fn test_sessions_share_the_loader() {
    let factory = Arc::new(FakeFactory::answering("Paris"));
    let store = store_with(factory.clone());

    let a = store.create().await;
    let b = store.create().await;
    assert_ne!(a.id, b.id);
    assert_eq!(factory.constructions(), 1);
}

#[tokio::test]
async fn test_store_drops_least_recently_used_session() {
    let store = store_with(Arc::new(FakeFactory::answering("Paris"))).with_max_sessions(2);
    let a = store.create().await;
    let b = store.create().await;

    // Reading `a` makes `b` the oldest.
    store.get(a.id).await.unwrap();
    let c = store.create().await;

    assert_eq!(store.len().await, 2);
    assert!(matches!(store.get(b.id).await, Err(SessionError::NotFound(_))));
    assert!(store.get(a.id).await.is_ok());
    assert!(store.get(c.id).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_submissions_keep_their_own_model_and_config() {
    let factory = Arc::new(
        FakeFactory::answering("Paris").with_construct_delay(Duration::from_millis(50)),
    );
    let store = store_with(factory.clone());
    let session = store.create().await;
    let request = QARequest::new("France is a country.", "What is the capital of France?");

    let tiny = GenerationConfig {
        max_tokens: 11,
        ..Default::default()
    };
    let gpt2 = GenerationConfig {
        max_tokens: 22,
        ..Default::default()
    };

    // The TinyLlama load is slow, so the GPT-2 submission lands in between.
    let (slow, fast) = tokio::join!(
        store.submit(session.id, "TinyLlama", tiny, &request),
        store.submit(session.id, "GPT-2 (117M)", gpt2, &request),
    );
    let (slow, fast) = (slow.unwrap(), fast.unwrap());

    assert_eq!(slow.session.selected_label, "TinyLlama");
    assert_eq!(slow.session.config, tiny);
    assert_eq!(fast.session.selected_label, "GPT-2 (117M)");
    assert_eq!(fast.session.config, gpt2);
    assert_eq!(slow.result.unwrap().answer, "Paris");
    assert_eq!(fast.result.unwrap().answer, "Paris");

    let engines = factory.engines();
    let tiny_engine = engines.iter().find(|e| e.id().starts_with("TheBloke/")).unwrap();
    let gpt2_engine = engines.iter().find(|e| e.id().starts_with(GPT2)).unwrap();
    assert_eq!(tiny_engine.calls(), 1);
    assert_eq!(tiny_engine.last_request().unwrap().max_tokens, 11);
    assert_eq!(gpt2_engine.calls(), 1);
    assert_eq!(gpt2_engine.last_request().unwrap().max_tokens, 22);

    let stored = store.get(session.id).await.unwrap();
    assert_eq!(stored.selected_label, "TinyLlama");
    assert_eq!(stored.config, tiny);
}

#[tokio::test]
async fn test_submit_rejects_unknown_model_without_touching_session() {
    let factory = Arc::new(FakeFactory::answering("Paris"));
    let store = store_with(factory.clone());
    let session = store.create().await;

    let err = store
        .submit(
            session.id,
            "GPT-5",
            GenerationConfig::default(),
            &QARequest::new("c", "q"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UnknownModel(_)));
    assert_eq!(
        store.get(session.id).await.unwrap().selected_label,
        "GPT-2 (117M)"
    );
    assert_eq!(factory.total_engine_calls(), 0);
}
