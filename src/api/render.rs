// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTML rendering for the browser front end

use ammonia::clean_text;
use pulldown_cmark::{html, Parser};
use std::fmt::{Display, Write};
use uuid::Uuid;

use crate::qa::{
    GenerationConfig, LoadStatus, QAResult, Slider, MAX_TOKENS, REPEAT_PENALTY, TEMPERATURE,
    TOP_P,
};

pub const DEFAULT_CONTEXT: &str = "France is a country.";
pub const DEFAULT_QUESTION: &str = "What is the capital of France?";

const HOW_IT_WORKS: &str = r#"### How It Works

Models are addressed by `ipfs://` locators. When a model is selected the service:

1. Recognizes `ipfs://` URIs as valid model identifiers
2. Downloads the model file from a local IPFS node or public gateways
3. Caches the file locally so later runs load it straight from disk

Hugging Face repository ids and local paths keep working alongside IPFS.
"#;

/// What one click produced
#[derive(Debug, Clone)]
pub enum Outcome {
    Answer(QAResult),
    Error(String),
}

/// Everything needed to draw the page
#[derive(Debug, Clone)]
pub struct PageView {
    pub session_id: Uuid,
    pub labels: Vec<String>,
    pub selected_label: String,
    pub config: GenerationConfig,
    pub load_status: LoadStatus,
    pub provision_message: Option<String>,
    pub context: String,
    pub question: String,
    pub outcome: Option<Outcome>,
}

pub fn escape(text: &str) -> String {
    clean_text(text)
}

/// Prompt, timing and answer for a successful generation
pub fn render_result(result: &QAResult) -> String {
    format!(
        concat!(
            "<section class=\"result\">",
            "<details><summary>Prompt</summary><pre>{prompt}</pre></details>",
            "<div class=\"notice success\">Generated in {elapsed:.2} seconds</div>",
            "<h2>Answer</h2>",
            "<p class=\"answer\">{answer}</p>",
            "</section>"
        ),
        prompt = escape(&result.prompt),
        elapsed = result.elapsed_seconds,
        answer = escape(&result.answer),
    )
}

/// Error notice shown instead of a result
pub fn render_error(message: &str) -> String {
    format!(
        "<section class=\"result\"><div class=\"notice error\">{}</div></section>",
        escape(message)
    )
}

pub fn how_it_works_html() -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new(HOW_IT_WORKS));
    out
}

fn render_slider<T: Display>(slider: &Slider<T>, value: T) -> String {
    format!(
        concat!(
            "<label for=\"{name}\">{label} <output>{value}</output></label>",
            "<input type=\"range\" id=\"{name}\" name=\"{name}\" min=\"{min}\" max=\"{max}\" ",
            "step=\"{step}\" value=\"{value}\" oninput=\"this.previousElementSibling.lastChild.value=this.value\">"
        ),
        name = slider.name,
        label = slider.label,
        min = slider.min,
        max = slider.max,
        step = slider.step,
        value = value,
    )
}

fn render_load_status(status: &LoadStatus) -> String {
    match status {
        LoadStatus::Loaded { engine_id } => format!(
            "<div class=\"notice info\">Model loaded: {}</div>",
            escape(engine_id)
        ),
        LoadStatus::Failed { message } => {
            format!("<div class=\"notice error\">{}</div>", escape(message))
        }
    }
}

pub fn render_page(view: &PageView) -> String {
    let mut options = String::new();
    for label in &view.labels {
        let selected = if *label == view.selected_label { " selected" } else { "" };
        let _ = write!(
            options,
            "<option value=\"{0}\"{1}>{0}</option>",
            escape(label),
            selected
        );
    }

    let provision = view
        .provision_message
        .as_deref()
        .map(|m| format!("<div class=\"notice success\">✅ {}</div>", escape(m)))
        .unwrap_or_default();

    let outcome = match &view.outcome {
        Some(Outcome::Answer(result)) => render_result(result),
        Some(Outcome::Error(message)) => render_error(message),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>IPFS-LLaMA Demo</title>
<style>
body {{ font-family: sans-serif; display: flex; margin: 0; }}
form {{ display: flex; width: 100%; }}
aside {{ width: 18rem; padding: 1rem; background: #f0f2f6; min-height: 100vh; }}
aside input, aside select {{ width: 100%; }}
main {{ flex: 1; padding: 1rem 2rem; }}
textarea, input[type=text] {{ width: 100%; }}
.notice {{ padding: .75rem; margin: .5rem 0; border-radius: .25rem; }}
.success {{ background: #dff5e3; }} .error {{ background: #fde2e2; }} .info {{ background: #e2ecfd; }}
</style>
</head>
<body>
<form method="post" action="/ui/generate">
<input type="hidden" name="session_id" value="{session_id}">
<aside>
<h2>Model Settings</h2>
<label for="model">Select Model</label>
<select id="model" name="model">{options}</select>
<h2>Generation Settings</h2>
{temperature}
{max_tokens}
{top_p}
{repeat_penalty}
</aside>
<main>
<h1>🦙 LLaMA-IPFS Demo</h1>
<p>This app demonstrates using llama.cpp with IPFS-hosted models.</p>
{provision}
{load_status}
<h2>Question &amp; Answer</h2>
<label for="context">Context</label>
<textarea id="context" name="context" rows="6">{context}</textarea>
<label for="question">Question</label>
<input type="text" id="question" name="question" value="{question}">
<p><button type="submit">Generate Answer</button></p>
{outcome}
<hr>
{how_it_works}
</main>
</form>
</body>
</html>
"#,
        session_id = view.session_id,
        options = options,
        temperature = render_slider(&TEMPERATURE, view.config.temperature),
        max_tokens = render_slider(&MAX_TOKENS, view.config.max_tokens),
        top_p = render_slider(&TOP_P, view.config.top_p),
        repeat_penalty = render_slider(&REPEAT_PENALTY, view.config.repeat_penalty),
        provision = provision,
        load_status = render_load_status(&view.load_status),
        context = escape(&view.context),
        question = escape(&view.question),
        outcome = outcome,
        how_it_works = how_it_works_html(),
    )
}
