// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod ask;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::App;
use crate::config::AppConfig;
use crate::provision::StepAction;

/// LLaMA-IPFS QA command line
#[derive(Parser, Debug)]
#[command(name = "qa-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Ask questions of IPFS-hosted GGUF models from the terminal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the models that can be selected
    Models,

    /// Install missing prerequisites and activate IPFS support
    Provision,

    /// Answer one question from a context passage
    Ask(ask::AskArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env();
    config.validate()?;
    let app = App::build(config)?;

    match cli.command {
        Commands::Models => {
            let catalog = app.sessions.catalog();
            for descriptor in catalog.descriptors() {
                let marker = if descriptor.label == catalog.default_label() {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}\t{}\t{}",
                    marker, descriptor.label, descriptor.repository_locator, descriptor.filename
                );
            }
            Ok(())
        }
        Commands::Provision => {
            let report = app.provisioner.ensure_ready().await?;
            for step in &report.steps {
                let action = match step.action {
                    StepAction::AlreadyPresent => "already present",
                    StepAction::Installed => "installed",
                };
                println!("{:<16} {}", step.name, action);
            }
            println!("✅ {}", report.status_message());
            Ok(())
        }
        Commands::Ask(args) => ask::run(&app, args).await,
    }
}
