// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use llama_ipfs_qa::storage::{
    ArtifactResolver, IpfsResolver, IpfsResolverConfig, ResolveError,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CID: &str = "bafybeie7quk74kmqg34nl2ewdwmsrlvvt6heayien364gtu2x6g2qpznhq";
const PAYLOAD: &[u8] = b"GGUF\x03\x00\x00\x00fake-weights";

/// Local HTTP server answering `/ipfs/<cid>/<file>` like a public gateway
async fn spawn_gateway(hits: Arc<AtomicUsize>) -> SocketAddr {
    let app = Router::new().route(
        "/ipfs/:cid/:file",
        get(move |Path((cid, file)): Path<(String, String)>| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                if cid == CID && file == "ggml-model-Q4_K_M.gguf" {
                    Ok(PAYLOAD.to_vec())
                } else {
                    Err(StatusCode::NOT_FOUND)
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Local HTTP server answering `POST /api/v0/cat?arg=/ipfs/<cid>/<file>` like a node
async fn spawn_node(hits: Arc<AtomicUsize>) -> SocketAddr {
    let app = Router::new().route(
        "/api/v0/cat",
        post(move |Query(params): Query<HashMap<String, String>>| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let wanted = format!("/ipfs/{}/ggml-model-Q4_K_M.gguf", CID);
                if params.get("arg") == Some(&wanted) {
                    Ok(PAYLOAD.to_vec())
                } else {
                    Err(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn resolver(cache_dir: std::path::PathBuf, gateways: Vec<String>) -> IpfsResolver {
    IpfsResolver::new(IpfsResolverConfig {
        cache_dir,
        api_url: None,
        gateways,
    })
    .unwrap()
}

#[tokio::test]
async fn test_downloads_from_gateway_then_serves_from_cache() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = spawn_gateway(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let resolver = resolver(
        dir.path().to_path_buf(),
        vec![
            // Nothing listens on the discard port; the next gateway is used
            "http://127.0.0.1:9".to_string(),
            format!("http://{}", addr),
        ],
    );
    let locator = format!("ipfs://{}", CID);

    let path = resolver
        .resolve(&locator, "ggml-model-Q4_K_M.gguf")
        .await
        .unwrap();
    assert_eq!(path, dir.path().join(CID).join("ggml-model-Q4_K_M.gguf"));
    assert_eq!(std::fs::read(&path).unwrap(), PAYLOAD);
    assert!(!path.with_file_name("ggml-model-Q4_K_M.gguf.part").exists());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let again = resolver
        .resolve(&locator, "ggml-model-Q4_K_M.gguf")
        .await
        .unwrap();
    assert_eq!(again, path);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_all_sources_failing_leaves_no_partial_file() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = spawn_gateway(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let resolver = resolver(dir.path().to_path_buf(), vec![format!("http://{}", addr)]);

    let err = resolver
        .resolve(&format!("ipfs://{}", CID), "missing.gguf")
        .await
        .unwrap_err();

    match err {
        ResolveError::AllSourcesFailed { attempts, filename, .. } => {
            assert_eq!(filename, "missing.gguf");
            assert_eq!(attempts.len(), 1);
            assert!(attempts[0].contains("404"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!dir.path().join(CID).join("missing.gguf").exists());
    assert!(!dir.path().join(CID).join("missing.gguf.part").exists());
}

#[tokio::test]
async fn test_local_node_is_tried_before_gateways() {
    let node_hits = Arc::new(AtomicUsize::new(0));
    let gateway_hits = Arc::new(AtomicUsize::new(0));
    let node = spawn_node(node_hits.clone()).await;
    let gateway = spawn_gateway(gateway_hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = IpfsResolver::new(IpfsResolverConfig {
        cache_dir: dir.path().to_path_buf(),
        api_url: Some(format!("http://{}", node)),
        gateways: vec![format!("http://{}", gateway)],
    })
    .unwrap();
    let locator = format!("ipfs://{}", CID);

    let path = resolver
        .resolve(&locator, "ggml-model-Q4_K_M.gguf")
        .await
        .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), PAYLOAD);
    assert_eq!(node_hits.load(Ordering::SeqCst), 1);
    assert_eq!(gateway_hits.load(Ordering::SeqCst), 0);

    // A node error falls through to the gateways.
    let err = resolver.resolve(&locator, "missing.gguf").await.unwrap_err();
    match err {
        ResolveError::AllSourcesFailed { attempts, .. } => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts[0].starts_with("ipfs node: HTTP 500"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(gateway_hits.load(Ordering::SeqCst), 1);
}
