use crate::state::AppState;
use analyst::config::RunContext;
use analyst::errors::RunError;
use analyst::sink::{ChannelSink, SinkEvent, DONE_MARKER};
use axum::{
    extract::State,
    http::{self, header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    question: String,
    #[serde(default)]
    organization_id: String,
    #[serde(default)]
    connection_id: String,
    #[serde(default)]
    schema: String,
    /// Replaces the default system instruction
    #[serde(default)]
    system: Option<String>,
}

impl ReplyRequest {
    fn context(&self, auth_token: String) -> RunContext {
        let context = RunContext::new(&self.organization_id, &self.connection_id)
            .with_auth_token(auth_token)
            .with_schema(&self.schema);
        match &self.system {
            Some(system) => context.with_system_instruction(system),
            None => context,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .unwrap_or_default()
}

// Server-sent events carrying the run's text deltas
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        (
            [
                (http::header::CONTENT_TYPE, "text/event-stream"),
                (http::header::CACHE_CONTROL, "no-cache"),
                (http::header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

struct EventFormatter;

impl EventFormatter {
    fn format_text(text: &str) -> String {
        let encoded_text = serde_json::to_string(text).unwrap_or_else(|_| String::new());
        format!("data: {}\n\n", encoded_text)
    }

    fn format_done() -> String {
        format!("data: {}\n\n", DONE_MARKER)
    }

    fn format_error(message: &str) -> String {
        let encoded = serde_json::to_string(message).unwrap_or_else(|_| String::new());
        format!("event: error\ndata: {}\n\n", encoded)
    }

    fn format_cancelled() -> String {
        "event: cancelled\ndata: null\n\n".to_string()
    }

    fn format(event: &SinkEvent) -> String {
        match event {
            SinkEvent::Text(text) => Self::format_text(text),
            SinkEvent::Complete => Self::format_done(),
            SinkEvent::Cancelled => Self::format_cancelled(),
            SinkEvent::Error(message) => Self::format_error(message),
        }
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReplyRequest>,
) -> SseResponse {
    let context = request.context(bearer_token(&headers));
    let question = request.question;

    let (tx, rx) = mpsc::channel(state.sink_buffer.max(1));
    let (sink, mut events) = ChannelSink::channel(state.sink_buffer);
    let cancel = CancellationToken::new();

    let agent = state.agent.clone();
    let run_cancel = cancel.clone();
    tokio::spawn(async move {
        // the outcome reaches the client through the sink
        let _ = agent.run(context, &question, Some(&sink), &run_cancel).await;
    });

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => {
                    tracing::info!("client disconnected, cancelling run");
                    cancel.cancel();
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if tx.send(EventFormatter::format(&event)).await.is_err() {
                        cancel.cancel();
                        break;
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
            }
        }
    });

    SseResponse::new(ReceiverStream::new(rx))
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
}

fn status_for(error: &RunError) -> StatusCode {
    match error {
        RunError::Upstream(_) => StatusCode::BAD_GATEWAY,
        RunError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        RunError::StepLimitExceeded(_) | RunError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ask for a final answer without streaming
async fn ask_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<AskResponse>, StatusCode> {
    let context = request.context(bearer_token(&headers));

    let conversation = state
        .agent
        .run(context, &request.question, None, &CancellationToken::new())
        .await
        .map_err(|e| {
            tracing::error!("Failed to answer question: {}", e);
            status_for(&e)
        })?;

    Ok(Json(AskResponse {
        response: conversation.final_text().unwrap_or_default(),
    }))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reply", post(handler))
        .route("/ask", post(ask_handler))
        .with_state(state)
}
