use futures::stream;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::mpsc;

use crate::domains::agent::events::{AgentEvent, ChatMessage};
use crate::gateway::http::{ApiBody, error_response, read_json_body_or_respond};
use crate::gateway::state::AppState;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ChatRequest {
    message: String,
    history: Vec<ChatMessage>,
}

/// One-shot chat turn: spawn the agent scoped to the session's working copy
/// and stream transcoded events back as NDJSON. The response always ends
/// with a `done` or `error` event; the client is never left hanging.
pub async fn handle_chat(
    req: Request<Incoming>,
    state: AppState,
    repo: String,
    session_id: String,
) -> Result<Response<ApiBody>, hyper::Error> {
    let body: ChatRequest = match read_json_body_or_respond(req).await {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    if body.message.trim().is_empty() {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "Chat message must not be empty",
        ));
    }

    let session = match state.sessions.get_session(&repo, &session_id) {
        Ok(Some(session)) => session,
        Ok(None) => {
            return Ok(error_response(
                StatusCode::NOT_FOUND,
                &format!("Session '{session_id}' not found"),
            ));
        }
        Err(e) => {
            log::error!("Failed to resolve chat session '{session_id}': {e}");
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to resolve session",
            ));
        }
    };

    if !state.sessions.validate(&session) {
        return Ok(error_response(
            StatusCode::CONFLICT,
            &format!("Session '{session_id}' has no valid working copy"),
        ));
    }

    let (tx, rx) = mpsc::channel::<AgentEvent>(EVENT_CHANNEL_CAPACITY);
    let runner = state.agent.clone();
    let worktree_path = session.worktree_path.clone();
    let message = body.message;
    let history = body.history;

    tokio::spawn(async move {
        let result = runner
            .run_turn(&worktree_path, &message, &history, tx.clone())
            .await;
        if let Err(e) = result {
            // Spawn-level failure: the transcoder never got to emit a
            // terminal event, so the error is surfaced here instead.
            log::warn!("Agent turn failed: {e}");
            let _ = tx
                .send(AgentEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    });

    state.sessions.touch(&session_id);

    let event_stream = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let mut line = serde_json::to_string(&event).unwrap_or_default();
        line.push('\n');
        Some((Ok::<_, Infallible>(Frame::data(Bytes::from(line))), rx))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/x-ndjson")
        .body(StreamBody::new(event_stream).boxed_unsync())
        .unwrap_or_else(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "stream error"));
    Ok(response)
}
