// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;
use std::fmt::Display;
use std::str::FromStr;
use tracing::info;

use crate::app::App;
use crate::qa::{GenerationConfig, LoadStatus, QARequest, Slider, MAX_TOKENS, REPEAT_PENALTY, TEMPERATURE, TOP_P};

/// Arguments for the ask command
#[derive(Args, Debug)]
pub struct AskArgs {
    /// Passage the answer must come from
    #[arg(long)]
    pub context: String,

    /// Question about the passage
    #[arg(long)]
    pub question: String,

    /// Catalog label (defaults to the first catalog entry)
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, default_value_t = TEMPERATURE.default, value_parser = parse_temperature)]
    pub temperature: f32,

    #[arg(long, default_value_t = MAX_TOKENS.default, value_parser = parse_max_tokens)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = TOP_P.default, value_parser = parse_top_p)]
    pub top_p: f32,

    #[arg(long, default_value_t = REPEAT_PENALTY.default, value_parser = parse_repeat_penalty)]
    pub repeat_penalty: f32,
}

impl AskArgs {
    pub fn config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            repeat_penalty: self.repeat_penalty,
        }
    }
}

fn parse_in_range<T>(slider: &Slider<T>, raw: &str) -> Result<T, String>
where
    T: FromStr + PartialOrd + Copy + Display,
{
    let value: T = raw
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if slider.contains(value) {
        Ok(value)
    } else {
        Err(format!(
            "{} must be between {} and {}",
            slider.label, slider.min, slider.max
        ))
    }
}

fn parse_temperature(raw: &str) -> Result<f32, String> {
    parse_in_range(&TEMPERATURE, raw)
}

fn parse_max_tokens(raw: &str) -> Result<u32, String> {
    parse_in_range(&MAX_TOKENS, raw)
}

fn parse_top_p(raw: &str) -> Result<f32, String> {
    parse_in_range(&TOP_P, raw)
}

fn parse_repeat_penalty(raw: &str) -> Result<f32, String> {
    parse_in_range(&REPEAT_PENALTY, raw)
}

/// Provision, load the model, answer once and print the result
pub async fn run(app: &App, args: AskArgs) -> Result<()> {
    let report = app.provisioner.ensure_ready().await?;
    info!("{}", report.status_message());

    let sessions = &app.sessions;
    let label = args
        .model
        .clone()
        .unwrap_or_else(|| sessions.catalog().default_label().to_string());
    let session = sessions.create_with_model(&label).await?;
    if let LoadStatus::Failed { message } = &session.load_status {
        eprintln!("❌ {}", message);
    }
    sessions.update_config(session.id, args.config()).await?;

    let request = QARequest::new(&args.context, &args.question);
    let result = sessions
        .generate(session.id, &request)
        .await
        .map_err(|e| anyhow!("{}", e))?;

    println!("Prompt:\n{}\n", result.prompt);
    println!("Generated in {:.2} seconds", result.elapsed_seconds);
    println!("Answer: {}", result.answer);
    Ok(())
}
