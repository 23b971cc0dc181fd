// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use axum::{
    extract::{Form, Json, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::handlers::{
    session_cookie, session_from_cookies, GenerateForm, HealthResponse, ModelInfo,
    ModelsResponse, SelectModelRequest,
};
use super::render::{render_page, Outcome, PageView, DEFAULT_CONTEXT, DEFAULT_QUESTION};
use super::ApiError;
use crate::app::App;
use crate::models::ModelKey;
use crate::provision::Provisioner;
use crate::qa::{
    GenerationConfig, QARequest, QAResult, QaError, Session, SessionError, SessionStore,
};
use crate::version;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen_addr: String,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: crate::config::DEFAULT_LISTEN_ADDR.to_string(),
            enable_cors: true,
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub provisioner: Arc<Provisioner>,
}

impl AppState {
    pub fn from_app(app: &App) -> Self {
        Self {
            sessions: app.sessions.clone(),
            provisioner: app.provisioner.clone(),
        }
    }

    fn model_not_found(&self, model: String) -> ApiError {
        ApiError::ModelNotFound {
            model,
            available_models: self
                .sessions
                .catalog()
                .labels()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    fn api_error(&self, err: SessionError) -> ApiError {
        match err {
            SessionError::UnknownModel(model) => self.model_not_found(model),
            other => other.into(),
        }
    }

    /// Reuse a known session, or start a fresh one
    async fn resume_or_create(&self, id: Option<Uuid>) -> Session {
        if let Some(id) = id {
            if let Ok(session) = self.sessions.get(id).await {
                return session;
            }
        }
        self.sessions.create().await
    }

    fn page(&self, session: &Session, request: &QARequest, outcome: Option<Outcome>) -> String {
        render_page(&PageView {
            session_id: session.id,
            labels: self
                .sessions
                .catalog()
                .labels()
                .into_iter()
                .map(String::from)
                .collect(),
            selected_label: session.selected_label.clone(),
            config: session.config,
            load_status: session.load_status.clone(),
            provision_message: self
                .provisioner
                .report()
                .map(|r| r.status_message().to_string()),
            context: request.context.clone(),
            question: request.question.clone(),
            outcome,
        })
    }
}

pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiConfig, app: &App) -> Self {
        Self {
            config,
            state: AppState::from_app(app),
        }
    }

    pub fn router(&self) -> Router {
        let router = create_router(self.state.clone());
        if self.config.enable_cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Serve until ctrl-c
    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.config.listen_addr.parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;
        info!("🌐 Listening on http://{}", actual_addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                info!("🛑 Shutdown signal received");
            })
            .await?;
        Ok(())
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ui/generate", post(ui_generate_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/v1/models", get(models_handler))
        .route("/v1/sessions", post(create_session_handler))
        .route("/v1/sessions/:id", get(get_session_handler))
        .route("/v1/sessions/:id/model", put(select_model_handler))
        .route("/v1/sessions/:id/config", put(update_config_handler))
        .route("/v1/sessions/:id/generate", post(generate_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = state
        .resume_or_create(session_from_cookies(&headers))
        .await;
    let defaults = QARequest::new(DEFAULT_CONTEXT, DEFAULT_QUESTION);
    let page = state.page(&session, &defaults, None);
    ([(header::SET_COOKIE, session_cookie(session.id))], Html(page)).into_response()
}

async fn ui_generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<GenerateForm>,
) -> Response {
    let session = state
        .resume_or_create(form.session_id.or_else(|| session_from_cookies(&headers)))
        .await;
    let cookie = [(header::SET_COOKIE, session_cookie(session.id))];
    let request = form.request();

    // Form values are clamped, so only the model label can be rejected here.
    let submission = match state
        .sessions
        .submit(session.id, &form.model, form.config(), &request)
        .await
    {
        Ok(submission) => submission,
        Err(e @ SessionError::UnknownModel(_)) => {
            let page = state.page(&session, &request, Some(Outcome::Error(e.to_string())));
            return (StatusCode::BAD_REQUEST, cookie, Html(page)).into_response();
        }
        Err(e) => return state.api_error(e).into_response(),
    };

    let session = submission.session;
    match submission.result {
        Ok(result) => {
            let page = state.page(&session, &request, Some(Outcome::Answer(result)));
            (cookie, Html(page)).into_response()
        }
        Err(e @ QaError::ModelNotLoaded) => {
            let page = state.page(&session, &request, Some(Outcome::Error(e.to_string())));
            (cookie, Html(page)).into_response()
        }
        Err(e) => {
            error!("❌ Generation failed: {}", e);
            let page = state.page(&session, &request, Some(Outcome::Error(e.to_string())));
            (StatusCode::INTERNAL_SERVER_ERROR, cookie, Html(page)).into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.provisioner.report().cloned();
    Json(HealthResponse {
        status: if report.is_some() { "ok" } else { "provisioning" }.to_string(),
        version: version::VERSION.to_string(),
        message: report.as_ref().map(|r| r.status_message().to_string()),
        provision: report,
    })
}

async fn version_handler() -> Json<serde_json::Value> {
    Json(version::get_version_info())
}

async fn models_handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    let catalog = state.sessions.catalog();
    let loader = state.sessions.loader();

    let mut models = Vec::new();
    for descriptor in catalog.descriptors() {
        let outcome = loader.peek(&ModelKey::from(descriptor)).await;
        models.push(ModelInfo {
            label: descriptor.label.clone(),
            repository_locator: descriptor.repository_locator.clone(),
            filename: descriptor.filename.clone(),
            cached: outcome.as_ref().map(|o| o.is_loaded()).unwrap_or(false),
            load_error: outcome.and_then(|o| o.error),
        });
    }

    Json(ModelsResponse {
        models,
        default_model: catalog.default_label().to_string(),
    })
}

async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(state.sessions.create().await))
}

async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .map(Json)
        .map_err(|e| state.api_error(e))
}

async fn select_model_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectModelRequest>,
) -> Result<Json<Session>, ApiError> {
    request.validate()?;
    state
        .sessions
        .select_model(id, &request.label)
        .await
        .map(Json)
        .map_err(|e| state.api_error(e))
}

async fn update_config_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(config): Json<GenerationConfig>,
) -> Result<Json<Session>, ApiError> {
    state
        .sessions
        .update_config(id, config)
        .await
        .map(Json)
        .map_err(|e| state.api_error(e))
}

async fn generate_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QARequest>,
) -> Result<Json<QAResult>, ApiError> {
    state
        .sessions
        .generate(id, &request)
        .await
        .map(Json)
        .map_err(|e| {
            let err = state.api_error(e);
            if err.status_code() >= 500 {
                error!("❌ Generation failed: {}", err);
            }
            err
        })
}
