//! HTTP server for the chat front end.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};

use super::agent::{AgentSession, ChatMessage};
use super::conversation::Conversation;
use super::report::{Report, ReportError};
use crate::config::ChatConfig;

const PAGE: &str = include_str!("page.html");

/// Shared state for the chat handlers
#[derive(Debug, Clone)]
pub struct AppState {
    agent: Arc<dyn AgentSession>,
    config: Arc<ChatConfig>,
    conversation: Arc<Conversation>,
}

impl AppState {
    pub fn new(config: ChatConfig, agent: Arc<dyn AgentSession>) -> Self {
        let conversation = Conversation::new(config.system_prompt.clone(), config.history_window);
        Self {
            agent,
            config: Arc::new(config),
            conversation: Arc::new(conversation),
        }
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Defaults to the first configured model
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default = "default_true")]
    pub use_history: bool,
    /// Extended thinking for this turn
    #[serde(default)]
    pub reasoning: bool,
}

fn default_true() -> bool {
    true
}

/// Body of `POST /api/report`
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub content: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/models", get(models))
        .route("/api/chat", post(chat))
        .route("/api/report", post(report))
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: ChatConfig, agent: Arc<dyn AgentSession>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Chat front end listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(AppState::new(config, agent)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down chat front end");
        })
        .await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn index() -> Html<&'static str> {
    Html(PAGE)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn models(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "models": state.config.models,
        "default": state.config.default_model().map(|m| m.id.as_str()),
    }))
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let message = request.message.trim();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message is empty");
    }

    let model = match request.model.as_deref() {
        Some(id) => match state.config.models.iter().find(|m| m.id == id) {
            Some(option) => option.id.clone(),
            None => return error_response(StatusCode::BAD_REQUEST, format!("unknown model '{}'", id)),
        },
        None => match state.config.default_model() {
            Some(option) => option.id.clone(),
            None => return error_response(StatusCode::SERVICE_UNAVAILABLE, "no models configured"),
        },
    };

    let messages = state
        .conversation
        .messages(&request.history, request.use_history, message);
    tracing::info!(model = %model, reasoning = request.reasoning, messages = messages.len(), "chat turn");

    Sse::new(turn_events(state.agent.clone(), model, request.reasoning, messages))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// `delta` events as text arrives, then `done` with the full reply or `error`
fn turn_events(
    agent: Arc<dyn AgentSession>,
    model: String,
    reasoning: bool,
    messages: Vec<ChatMessage>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut reply = String::new();
        let mut failure = None;

        match agent.stream(&model, reasoning, messages).await {
            Ok(mut deltas) => {
                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(text) => {
                            reply.push_str(&text);
                            yield Ok(Event::default().event("delta").data(json!({ "text": text }).to_string()));
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }
            Err(e) => failure = Some(e),
        }

        match failure {
            Some(e) => {
                tracing::warn!(kind = %e.kind(), "agent turn failed: {}", e);
                let data = json!({ "kind": e.kind(), "detail": e.to_string() });
                yield Ok(Event::default().event("error").data(data.to_string()));
            }
            None => {
                tracing::info!(chars = reply.len(), "agent turn completed");
                yield Ok(Event::default().event("done").data(json!({ "text": reply }).to_string()));
            }
        }
    }
}

async fn report(State(state): State<AppState>, Json(request): Json<ReportRequest>) -> Response {
    let report = match Report::new(request.name.as_deref(), &request.content) {
        Ok(report) => report,
        Err(e @ ReportError::Empty) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let now = chrono::Local::now().naive_local();
    if let Some(dir) = &state.config.reports_dir {
        if let Err(e) = report.write_to(dir, now) {
            tracing::warn!("Could not save report: {}", e);
        }
    }

    let disposition = format!("attachment; filename=\"{}\"", report.filename(now));
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.body().to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::agent::{AgentError, DeltaStream};
    use crate::chat::Role;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Debug, Default)]
    struct StubAgent {
        fail: Option<AgentError>,
        seen: Mutex<Vec<(String, bool, Vec<ChatMessage>)>>,
    }

    #[async_trait]
    impl AgentSession for StubAgent {
        async fn stream(
            &self,
            model: &str,
            reasoning: bool,
            messages: Vec<ChatMessage>,
        ) -> Result<DeltaStream, AgentError> {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), reasoning, messages));
            if let Some(e) = &self.fail {
                return Err(e.clone());
            }
            let parts = vec![Ok("HER2 ".to_string()), Ok("is ERBB2.".to_string())];
            Ok(futures_util::stream::iter(parts).boxed())
        }
    }

    fn app(agent: Arc<StubAgent>) -> Router {
        router(AppState::new(ChatConfig::default(), agent))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Arc::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("\"ok\""));
    }

    #[tokio::test]
    async fn test_models_lists_default() {
        let response = app(Arc::default())
            .oneshot(Request::get("/api/models").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(value["default"], "us.anthropic.claude-3-7-sonnet-20250219-v1:0");
        assert_eq!(value["models"][0]["label"], "Claude 3.7 Sonnet");
    }

    #[tokio::test]
    async fn test_chat_streams_deltas_then_done() {
        let agent = Arc::new(StubAgent::default());
        let request = post_json(
            "/api/chat",
            json!({
                "message": "What is HER2?",
                "history": [{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}],
            }),
        );

        let response = app(agent.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_text(response).await;
        assert!(text.contains("event: delta"));
        assert!(text.contains("event: done"));
        assert!(text.contains("HER2 is ERBB2."));

        let seen = agent.seen.lock().unwrap();
        let (model, reasoning, messages) = &seen[0];
        assert_eq!(model, "us.anthropic.claude-3-7-sonnet-20250219-v1:0");
        assert!(!reasoning);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_chat_passes_reasoning_toggle() {
        let agent = Arc::new(StubAgent::default());
        let response = app(agent.clone())
            .oneshot(post_json(
                "/api/chat",
                json!({"message": "Compare trastuzumab and lapatinib", "reasoning": true}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("event: done"));

        let seen = agent.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1);
    }

    #[tokio::test]
    async fn test_chat_reports_agent_failure() {
        let agent = Arc::new(StubAgent {
            fail: Some(AgentError::Authentication("bad key".to_string())),
            ..StubAgent::default()
        });

        let response = app(agent)
            .oneshot(post_json("/api/chat", json!({"message": "hi"})))
            .await
            .unwrap();

        let text = body_text(response).await;
        assert!(text.contains("event: error"));
        assert!(text.contains("AuthenticationFailure"));
        assert!(!text.contains("event: done"));
    }

    #[tokio::test]
    async fn test_chat_rejects_unknown_model() {
        let agent = Arc::new(StubAgent::default());
        let response = app(agent.clone())
            .oneshot(post_json("/api/chat", json!({"message": "hi", "model": "gpt-x"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(agent.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_download() {
        let response = app(Arc::default())
            .oneshot(post_json(
                "/api/report",
                json!({"content": "# Summary\n\n\nText", "name": "her2"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"her2_"));
        assert!(disposition.ends_with(".txt\""));
        assert_eq!(body_text(response).await, "Summary\n=======\n\nText\n");
    }

    #[tokio::test]
    async fn test_report_empty_content() {
        let response = app(Arc::default())
            .oneshot(post_json("/api/report", json!({"content": "  "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
