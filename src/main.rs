// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use llama_ipfs_qa::{
    api::{ApiConfig, ApiServer},
    app::App,
    config::AppConfig,
    version,
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🦙 Starting LLaMA-IPFS QA...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!();

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("❌ Invalid configuration: {}", e);
        std::process::exit(1);
    }
    println!("📁 Models directory: {}", config.models_dir.display());
    match config.ipfs_api_url {
        Some(ref url) => println!("🛰️  IPFS node: {}", url),
        None => println!("🛰️  IPFS node: disabled"),
    }
    println!("🌍 IPFS gateways: {}", config.ipfs_gateways.join(", "));

    let app = App::build(config)?;
    tracing::info!("{}", version::get_version_string());

    println!("🔧 Setting up environment...");
    let report = match app.provisioner.ensure_ready().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("❌ Provisioning failed: {}", e);
            std::process::exit(1);
        }
    };
    for step in &report.steps {
        println!("   {} ({:?})", step.name, step.action);
    }
    println!("✅ {}", report.status_message());

    let catalog = app.sessions.catalog();
    if let Some(default) = catalog.get(catalog.default_label()) {
        println!("📦 Loading model: {} ({})", default.label, default.repository_locator);
        println!("   This may take a few minutes on the first run while the model downloads.");
        let outcome = app.sessions.loader().load_descriptor(default).await;
        match outcome.error {
            None => println!("✅ Model loaded successfully"),
            Some(message) => {
                eprintln!("❌ {}", message);
                eprintln!("   The server will start but generation is disabled for this model.");
            }
        }
    }

    let api_config = ApiConfig {
        listen_addr: app.config.listen_addr.clone(),
        ..Default::default()
    };
    println!("\n🌐 Open http://{} in a browser", api_config.listen_addr);

    ApiServer::new(api_config, &app).serve().await?;

    println!("👋 Shutdown complete");
    Ok(())
}
