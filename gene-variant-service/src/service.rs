use axum::{
    Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{Next, from_fn},
    response::{Html, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;
use walkthrough_flow::{
    ChatMessage, FlowError, FlowRunner, InMemorySessionStorage, Session, SessionStorage,
};

use crate::{
    assets::{AssetCatalog, StepOptions},
    chat::{ChatContext, ChatProxy},
    classifier::Classifier,
    config::ServiceConfig,
    ensembl::{EnsemblClient, GenomeService},
    error::{GENE_NOT_FOUND_MESSAGE, WalkthroughError},
    models::{
        ChatRequest, ChatResponse, SessionCursor, StepSummary, SubmitRequest, WalkthroughResponse,
    },
    render::{WalkthroughView, render_index, render_walkthrough},
    tasks::session_keys,
    walkthrough::{Navigation, StepCursor},
    workflow::{build_walkthrough_pipeline, create_flow_runner, create_walkthrough_session, set_submission},
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn error_with_details(status: StatusCode, message: &str, details: &str) -> ApiError {
    (
        status,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

/// HTTP status and user-facing body for a walkthrough error.
fn api_error(err: WalkthroughError) -> ApiError {
    match &err {
        WalkthroughError::ResolutionNotFound(details) => {
            warn!(details = %details, "Gene could not be resolved");
            error_with_details(StatusCode::NOT_FOUND, GENE_NOT_FOUND_MESSAGE, details)
        }
        WalkthroughError::NoWalkthrough(_) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": err.to_string() })))
        }
        WalkthroughError::StepOutOfRange { .. } => bad_request_error(&err.to_string()),
        WalkthroughError::ConfigError(details) => {
            warn!(details = %details, "Request needs unconfigured capability");
            error_with_details(StatusCode::SERVICE_UNAVAILABLE, "Chat is disabled", details)
        }
        WalkthroughError::UpstreamError(details) => {
            error!(details = %details, "Upstream service failed");
            error_with_details(StatusCode::BAD_GATEWAY, "The chat service failed", details)
        }
        WalkthroughError::AssetError(details) => {
            error!(details = %details, "Asset catalog misconfigured");
            error_with_details(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Walkthrough assets are misconfigured",
                details,
            )
        }
        WalkthroughError::Flow(FlowError::SessionNotFound(id)) => {
            not_found_error("Session not found", id)
        }
        WalkthroughError::Flow(inner) => {
            error!(error = %inner, "Walkthrough pipeline failed");
            error_with_details(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Walkthrough pipeline failed",
                &inner.to_string(),
            )
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub flow_runner: FlowRunner,
    pub chat: Arc<ChatProxy>,
}

impl AppState {
    pub fn new(
        genome: Arc<dyn GenomeService>,
        classifier: Classifier,
        catalog: Arc<AssetCatalog>,
        options: StepOptions,
        chat: ChatProxy,
        session_storage: Arc<dyn SessionStorage>,
    ) -> Self {
        let pipeline = build_walkthrough_pipeline(genome, classifier, catalog, options);
        let flow_runner = create_flow_runner(pipeline, session_storage.clone());
        Self {
            session_storage,
            flow_runner,
            chat: Arc::new(chat),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let catalog = match &config.asset_manifest {
            Some(manifest) => AssetCatalog::from_manifest(&config.asset_dir, manifest)?,
            None => AssetCatalog::builtin(&config.asset_dir),
        };
        let missing = catalog.missing_keys();
        if !missing.is_empty() {
            warn!(missing = ?missing, "Asset catalog is incomplete; affected walkthroughs will fail");
        }

        let genome = EnsemblClient::new(&config.ensembl_base_url)?;
        info!(base_url = %genome.base_url(), "Using Ensembl REST API");

        Ok(Self::new(
            Arc::new(genome),
            Classifier::new(config.classifier_config()),
            Arc::new(catalog),
            config.step_options(),
            ChatProxy::from_api_key(config.openrouter_api_key.as_deref(), &config.chat_model),
            Arc::new(InMemorySessionStorage::with_idle_ttl(config.session_idle_ttl())),
        ))
    }
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let app_state = AppState::from_config(config)?;
    Ok(build_router(app_state))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/walkthrough", post(submit_walkthrough))
        .route("/walkthrough/{session_id}", get(get_walkthrough))
        .route("/walkthrough/{session_id}/view", get(view_walkthrough))
        .route("/walkthrough/{session_id}/next", post(next_step))
        .route("/walkthrough/{session_id}/back", post(previous_step))
        .route("/walkthrough/{session_id}/reset", post(reset_walkthrough))
        .route("/walkthrough/{session_id}/select/{index}", post(select_step))
        .route(
            "/walkthrough/{session_id}/chat",
            get(get_transcript).post(ask_question),
        )
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tag every request with a correlation id and run it inside a span carrying it.
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root(State(state): State<AppState>) -> Html<String> {
    Html(render_index(state.chat.is_enabled()))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn submit_walkthrough(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<WalkthroughResponse> {
    validate_submission(&request)?;

    let (session, created) = match &request.session_id {
        Some(session_id) => {
            if Uuid::parse_str(session_id).is_err() {
                return Err(bad_request_error("Invalid session ID format"));
            }
            (load_session(&state, session_id).await?, false)
        }
        None => (create_walkthrough_session(), true),
    };
    let session_id = session.id.clone();

    info!(
        session_id = %session_id,
        gene = %request.gene,
        variant = %request.variant,
        "Starting walkthrough"
    );

    set_submission(&session, &request.gene, &request.variant)
        .await
        .map_err(api_error)?;
    save_session(&state, session).await?;

    if let Err(e) = state.flow_runner.run(&session_id).await {
        // the client never learned this id, so nothing could reach the session
        if created {
            if let Err(delete_err) = state.session_storage.delete(&session_id).await {
                warn!(session_id = %session_id, error = %delete_err, "Failed to drop unused session");
            }
        }
        return Err(api_error(e.into()));
    }

    let session = load_session(&state, &session_id).await?;
    walkthrough_response(&session).await.map(Json)
}

fn validate_submission(request: &SubmitRequest) -> Result<(), ApiError> {
    if request.gene.trim().is_empty() {
        return Err(bad_request_error("Gene symbol is required"));
    }
    if request.variant.trim().is_empty() {
        return Err(bad_request_error("Variant notation is required"));
    }
    Ok(())
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load session");
            Err(error_with_details(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load session",
                &e.to_string(),
            ))
        }
    }
}

async fn save_session(state: &AppState, mut session: Session) -> Result<(), ApiError> {
    session.touch();
    let session_id = session.id.clone();
    state.session_storage.save(session).await.map_err(|e| {
        error!(session_id = %session_id, error = %e, "Failed to save session");
        error_with_details(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save session",
            &e.to_string(),
        )
    })
}

/// Collect the built walkthrough of a session.
async fn load_view(session: &Session) -> Result<WalkthroughView, WalkthroughError> {
    let context = &session.context;
    let no_walkthrough = || {
        WalkthroughError::NoWalkthrough(
            "submit a gene and variant for this session first".to_string(),
        )
    };

    let cursor: StepCursor = context
        .get(session_keys::CURSOR)
        .await
        .ok_or_else(no_walkthrough)?;
    let steps = context
        .get(session_keys::STEPS)
        .await
        .ok_or_else(no_walkthrough)?;

    Ok(WalkthroughView {
        session_id: session.id.clone(),
        cursor: SessionCursor {
            step_index: cursor.index(),
            gene: context.require(session_keys::GENE).await?,
            variant: context.require(session_keys::VARIANT).await?,
        },
        locus: context.require(session_keys::LOCUS).await?,
        category: context.require(session_keys::CATEGORY).await?,
        steps,
    })
}

async fn walkthrough_response(session: &Session) -> Result<WalkthroughResponse, ApiError> {
    let view = load_view(session).await.map_err(api_error)?;
    let current_step = view
        .current_step()
        .map(|step| StepSummary {
            key: step.key,
            caption: step.caption.clone(),
        })
        .ok_or_else(|| {
            api_error(WalkthroughError::NoWalkthrough(
                "walkthrough has no steps".to_string(),
            ))
        })?;

    Ok(WalkthroughResponse {
        session_id: view.session_id,
        step_count: view.steps.len(),
        cursor: view.cursor,
        locus: view.locus,
        category: view.category,
        current_step,
        status_message: session.status_message.clone(),
    })
}

async fn get_walkthrough(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<WalkthroughResponse> {
    let session = load_session(&state, &session_id).await?;
    walkthrough_response(&session).await.map(Json)
}

async fn view_walkthrough(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let session = load_session(&state, &session_id).await?;
    let view = load_view(&session).await.map_err(api_error)?;
    Ok(Html(render_walkthrough(&view)))
}

/// Move the cursor; the step list itself is left untouched.
async fn navigate(
    state: &AppState,
    session_id: &str,
    navigation: Navigation,
) -> ApiResult<WalkthroughResponse> {
    let session = load_session(state, session_id).await?;

    let mut cursor: StepCursor = session
        .context
        .get(session_keys::CURSOR)
        .await
        .ok_or_else(|| {
            api_error(WalkthroughError::NoWalkthrough(
                "submit a gene and variant for this session first".to_string(),
            ))
        })?;
    let index = cursor.apply(navigation).map_err(api_error)?;
    session
        .context
        .set(session_keys::CURSOR, cursor)
        .await
        .map_err(|e| api_error(e.into()))?;

    info!(session_id = %session_id, navigation = ?navigation, step = index, "Cursor moved");

    let response = walkthrough_response(&session).await?;
    save_session(state, session).await?;
    Ok(Json(response))
}

async fn next_step(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<WalkthroughResponse> {
    navigate(&state, &session_id, Navigation::Next).await
}

async fn previous_step(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<WalkthroughResponse> {
    navigate(&state, &session_id, Navigation::Back).await
}

async fn reset_walkthrough(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<WalkthroughResponse> {
    navigate(&state, &session_id, Navigation::Reset).await
}

async fn select_step(
    State(state): State<AppState>,
    Path((session_id, index)): Path<(String, usize)>,
) -> ApiResult<WalkthroughResponse> {
    navigate(&state, &session_id, Navigation::Select(index)).await
}

async fn ask_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    if request.question.trim().is_empty() {
        return Err(bad_request_error("Question cannot be empty"));
    }

    let session = load_session(&state, &session_id).await?;
    let chat_context = ChatContext {
        gene: session.context.get(session_keys::GENE).await,
        variant: session.context.get(session_keys::VARIANT).await,
    };

    let outcome = state
        .chat
        .ask(&request.question, &chat_context, &session.context)
        .await;
    // the transcript records failed attempts too
    save_session(&state, session).await?;

    let reply = outcome.map_err(api_error)?;
    Ok(Json(ChatResponse { session_id, reply }))
}

async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Vec<ChatMessage>> {
    let session = load_session(&state, &session_id).await?;
    Ok(Json(session.context.get_all_messages().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::write_builtin_assets;
    use crate::chat::tests::EchoChat;
    use crate::ensembl::tests::FakeGenome;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request as HttpRequest};
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        genome: Arc<FakeGenome>,
        storage: Arc<InMemorySessionStorage>,
        _assets: tempfile::TempDir,
    }

    impl Harness {
        fn genome_calls(&self) -> usize {
            self.genome.calls.lock().unwrap().len()
        }

        async fn stored_steps(&self, session_id: &str) -> Value {
            let session = self.storage.get(session_id).await.unwrap().unwrap();
            session.context.get(session_keys::STEPS).await.unwrap()
        }
    }

    fn harness(chat: ChatProxy) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let catalog = write_builtin_assets(dir.path());
        let genome = Arc::new(
            FakeGenome::default()
                .with_gene("NFIX", "ENSG00000008441", "19", Some(12_995_000), 58_617_616)
                .with_gene("DMD", "ENSG00000198947", "X", Some(31_097_677), 156_040_895),
        );
        let storage = Arc::new(InMemorySessionStorage::new());

        let state = AppState::new(
            genome.clone(),
            Classifier::default(),
            Arc::new(catalog),
            StepOptions::default(),
            chat,
            storage.clone(),
        );
        Harness {
            router: build_router(state),
            genome,
            storage,
            _assets: dir,
        }
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn submit(router: &Router, gene: &str, variant: &str) -> (StatusCode, Value) {
        call(
            router,
            Method::POST,
            "/walkthrough",
            Some(json!({ "gene": gene, "variant": variant })),
        )
        .await
    }

    #[tokio::test]
    async fn submission_builds_walkthrough() {
        let h = harness(ChatProxy::disabled());
        let (status, body) = submit(&h.router, "NFIX", "c.240A>G").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "Missense");
        assert_eq!(body["step_count"], 6);
        assert_eq!(body["cursor"]["step_index"], 0);
        assert_eq!(body["locus"]["chromosome_id"], "19");
        assert_eq!(body["locus"]["arm"], "p");
        assert_eq!(body["current_step"]["key"], "chromosome_overview");
    }

    #[tokio::test]
    async fn unknown_gene_is_reported_without_steps() {
        let h = harness(ChatProxy::disabled());
        let (status, body) = submit(&h.router, "NOTAGENE", "c.1A>T").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], GENE_NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let h = harness(ChatProxy::disabled());
        let (status, _) = submit(&h.router, "  ", "c.1A>T").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = submit(&h.router, "NFIX", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn navigation_moves_only_the_cursor() {
        let h = harness(ChatProxy::disabled());
        let (_, body) = submit(&h.router, "DMD", "c.100_101dup").await;
        let id = body["session_id"].as_str().unwrap().to_string();
        let calls = h.genome_calls();
        let steps = h.stored_steps(&id).await;

        let (_, body) = call(&h.router, Method::POST, &format!("/walkthrough/{}/back", id), None).await;
        assert_eq!(body["cursor"]["step_index"], 0);

        let (_, body) = call(&h.router, Method::POST, &format!("/walkthrough/{}/next", id), None).await;
        assert_eq!(body["cursor"]["step_index"], 1);
        assert_eq!(body["current_step"]["key"], "arm_diagram");

        let (_, body) = call(&h.router, Method::POST, &format!("/walkthrough/{}/select/5", id), None).await;
        assert_eq!(body["current_step"]["key"], "mutation_duplication");

        let (_, body) = call(&h.router, Method::POST, &format!("/walkthrough/{}/next", id), None).await;
        assert_eq!(body["cursor"]["step_index"], 5);

        let (status, _) =
            call(&h.router, Method::POST, &format!("/walkthrough/{}/select/6", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&h.router, Method::POST, &format!("/walkthrough/{}/reset", id), None).await;
        assert_eq!(body["cursor"]["step_index"], 0);
        assert_eq!(body["locus"]["chromosome_id"], "X");

        assert_eq!(h.genome_calls(), calls);
        assert_eq!(h.stored_steps(&id).await, steps);
    }

    #[tokio::test]
    async fn failed_new_submission_leaves_no_session() {
        let h = harness(ChatProxy::disabled());

        for _ in 0..2 {
            let (status, _) = submit(&h.router, "NOTAGENE", "c.1A>T").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        assert!(h.storage.is_empty());

        let (status, _) = submit(&h.router, "NFIX", "c.240A>G").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.storage.len(), 1);
    }

    #[tokio::test]
    async fn resubmission_resets_cursor_and_failure_clears_walkthrough() {
        let h = harness(ChatProxy::disabled());
        let (_, body) = submit(&h.router, "NFIX", "c.240A>G").await;
        let id = body["session_id"].as_str().unwrap().to_string();
        call(&h.router, Method::POST, &format!("/walkthrough/{}/select/3", id), None).await;

        let (status, body) = call(
            &h.router,
            Method::POST,
            "/walkthrough",
            Some(json!({ "session_id": id, "gene": "NFIX", "variant": "p.Gly12Ter" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cursor"]["step_index"], 0);
        assert_eq!(body["category"], "Nonsense");

        let (status, _) = call(
            &h.router,
            Method::POST,
            "/walkthrough",
            Some(json!({ "session_id": id, "gene": "NOTAGENE", "variant": "c.1A>T" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&h.router, Method::GET, &format!("/walkthrough/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("No walkthrough"));
    }

    #[tokio::test]
    async fn unknown_or_malformed_session_ids() {
        let h = harness(ChatProxy::disabled());
        let (status, _) = call(
            &h.router,
            Method::POST,
            "/walkthrough",
            Some(json!({ "session_id": "not-a-uuid", "gene": "NFIX", "variant": "c.1A>T" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = Uuid::new_v4();
        let (status, _) = call(&h.router, Method::POST, &format!("/walkthrough/{}/next", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_without_key_is_reported_and_recorded() {
        let h = harness(ChatProxy::disabled());
        let (_, body) = submit(&h.router, "NFIX", "c.240A>G").await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &h.router,
            Method::POST,
            &format!("/walkthrough/{}/chat", id),
            Some(json!({ "question": "What is NFIX?" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Chat is disabled");

        let (_, transcript) = call(&h.router, Method::GET, &format!("/walkthrough/{}/chat", id), None).await;
        assert_eq!(transcript.as_array().unwrap().len(), 2);
        assert_eq!(transcript[0]["role"], "user");
    }

    #[tokio::test]
    async fn chat_reply_uses_session_context() {
        let provider = Arc::new(EchoChat::new("A transcription factor."));
        let h = harness(ChatProxy::new(provider.clone()));
        let (_, body) = submit(&h.router, "NFIX", "c.240A>G").await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &h.router,
            Method::POST,
            &format!("/walkthrough/{}/chat", id),
            Some(json!({ "question": "What is NFIX?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["reply"].as_str().unwrap().starts_with("A transcription factor."));
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Gene: NFIX"));
        assert!(prompts[0].contains("Variant: c.240A>G"));
    }

    #[tokio::test]
    async fn view_renders_current_step() {
        let h = harness(ChatProxy::disabled());
        let (_, body) = submit(&h.router, "NFIX", "c.240A>G").await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let response = h
            .router
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri(format!("/walkthrough/{}/view", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Step 1 of 6"));
        assert!(html.contains("<strong>Chr:</strong> 19p"));
    }
}
