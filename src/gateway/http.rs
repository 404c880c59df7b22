use http_body_util::{BodyExt, Full, combinators::UnsyncBoxBody};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;

use crate::domains::repos::RepoStore;
use crate::domains::sessions::service::{CreateSessionParams, CreateTabParams};
use crate::gateway::state::AppState;
use crate::gateway::{chat, ws};

pub type ApiBody = UnsyncBoxBody<Bytes, Infallible>;

pub fn full_body(body: impl Into<Bytes>) -> ApiBody {
    Full::new(body.into()).boxed_unsync()
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct CreateSessionRequest {
    session_id: Option<String>,
    display_name: Option<String>,
    base_branch: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    session_id: String,
    branch_name: String,
    base_branch: String,
    base_revision: String,
    working_copy_path: PathBuf,
    is_existing: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RenameSessionRequest {
    display_name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct CreateTabRequest {
    tab_id: Option<String>,
    dedicated_worktree: bool,
    base_branch: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TabResponse {
    session_id: String,
    tab_id: String,
    worktree_path: Option<PathBuf>,
    branch: Option<String>,
    index: i32,
    is_existing: bool,
}

/// Route one request. Paths follow
/// `/api/repos/{repo}/sessions[/{id}[/terminal|/chat|/tabs[/{tab}]]]`.
pub async fn handle_request(
    req: Request<Incoming>,
    state: AppState,
) -> Result<Response<ApiBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<String> = path
        .trim_matches('/')
        .split('/')
        .map(|s| urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_else(|_| s.to_string()))
        .collect();

    let response = match (&method, segments.as_slice()) {
        (&Method::POST, [api, repos, repo, sessions])
            if api == "api" && repos == "repos" && sessions == "sessions" =>
        {
            create_session(req, state, repo.clone()).await
        }
        (&Method::GET, [api, repos, repo, sessions])
            if api == "api" && repos == "repos" && sessions == "sessions" =>
        {
            list_sessions(state, repo)
        }
        (&Method::DELETE, [api, repos, repo, sessions, id])
            if api == "api" && repos == "repos" && sessions == "sessions" =>
        {
            delete_session(state, repo, id).await
        }
        (&Method::PATCH, [api, repos, repo, sessions, id])
            if api == "api" && repos == "repos" && sessions == "sessions" =>
        {
            rename_session(req, state, repo.clone(), id.clone()).await
        }
        (&Method::GET, [api, repos, repo, sessions, id, terminal])
            if api == "api" && repos == "repos" && sessions == "sessions"
                && terminal == "terminal" =>
        {
            return ws::handle_terminal_upgrade(req, state, repo.clone(), id.clone());
        }
        (&Method::POST, [api, repos, repo, sessions, id, chat_seg])
            if api == "api" && repos == "repos" && sessions == "sessions"
                && chat_seg == "chat" =>
        {
            return chat::handle_chat(req, state, repo.clone(), id.clone()).await;
        }
        (&Method::POST, [api, repos, repo, sessions, id, tabs])
            if api == "api" && repos == "repos" && sessions == "sessions" && tabs == "tabs" =>
        {
            create_tab(req, state, repo.clone(), id.clone()).await
        }
        (&Method::DELETE, [api, repos, repo, sessions, id, tabs, tab])
            if api == "api" && repos == "repos" && sessions == "sessions" && tabs == "tabs" =>
        {
            delete_tab(state, repo, id, tab).await
        }
        (&Method::POST, [api, repos, repo, cleanup])
            if api == "api" && repos == "repos" && cleanup == "cleanup" =>
        {
            cleanup_worktrees(state, repo).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Unknown route"),
    };

    Ok(response)
}

async fn create_session(
    req: Request<Incoming>,
    state: AppState,
    repo: String,
) -> Response<ApiBody> {
    let body: CreateSessionRequest = match read_json_body_or_respond(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let result = state
        .sessions
        .create_session(
            &repo,
            CreateSessionParams {
                session_id: body.session_id,
                display_name: body.display_name,
                base_branch: body.base_branch,
            },
        )
        .await;

    match result {
        Ok(created) => {
            let session = created.session;
            json_response(
                StatusCode::OK,
                &CreateSessionResponse {
                    session_id: session.id,
                    branch_name: session.branch,
                    base_branch: session.base_branch,
                    base_revision: session.base_commit,
                    working_copy_path: session.worktree_path,
                    is_existing: created.is_existing,
                },
            )
        }
        Err(e) => map_lifecycle_error(&e),
    }
}

fn list_sessions(state: AppState, repo: &str) -> Response<ApiBody> {
    if RepoStore::validate_repo_id(repo).is_err() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid repository id");
    }
    match state.sessions.list_session_summaries(repo) {
        Ok(summaries) => json_response(StatusCode::OK, &summaries),
        Err(e) => {
            log::error!("Failed to list sessions for '{repo}': {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list sessions")
        }
    }
}

async fn delete_session(state: AppState, repo: &str, id: &str) -> Response<ApiBody> {
    // Multiplexer sessions die before the working copy is removed
    let tab_ids: Vec<String> = state
        .sessions
        .list_tabs(id)
        .unwrap_or_default()
        .into_iter()
        .map(|tab| tab.tab_id)
        .collect();
    state.terminals.kill_session_terminals(id, &tab_ids).await;

    match state.sessions.delete_session(repo, id).await {
        Ok(true) => json_response(StatusCode::OK, &serde_json::json!({"success": true})),
        Ok(false) => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"success": false, "error": "Session not found"}),
        ),
        Err(e) => {
            log::error!("Failed to delete session '{id}': {e}");
            map_lifecycle_error(&e)
        }
    }
}

async fn cleanup_worktrees(state: AppState, repo: &str) -> Response<ApiBody> {
    match state.sessions.cleanup_orphaned_worktrees(repo).await {
        Ok(removed) => json_response(StatusCode::OK, &serde_json::json!({"removed": removed})),
        Err(e) => {
            log::error!("Worktree cleanup failed for '{repo}': {e}");
            map_lifecycle_error(&e)
        }
    }
}

async fn rename_session(
    req: Request<Incoming>,
    state: AppState,
    repo: String,
    id: String,
) -> Response<ApiBody> {
    let body: RenameSessionRequest = match read_json_body_or_respond(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match state.sessions.rename_session(&repo, &id, &body.display_name) {
        Ok(true) => json_response(StatusCode::OK, &serde_json::json!({"success": true})),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Session not found"),
        Err(e) => {
            log::error!("Failed to rename session '{id}': {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to rename session")
        }
    }
}

async fn create_tab(
    req: Request<Incoming>,
    state: AppState,
    repo: String,
    id: String,
) -> Response<ApiBody> {
    let body: CreateTabRequest = match read_json_body_or_respond(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let result = state
        .sessions
        .create_tab(
            &repo,
            &id,
            CreateTabParams {
                tab_id: body.tab_id,
                dedicated_worktree: body.dedicated_worktree,
                base_branch: body.base_branch,
            },
        )
        .await;

    match result {
        Ok((tab, is_existing)) => json_response(
            StatusCode::OK,
            &TabResponse {
                session_id: tab.session_id,
                tab_id: tab.tab_id,
                worktree_path: tab.worktree_path,
                branch: tab.branch,
                index: tab.index,
                is_existing,
            },
        ),
        Err(e) => map_lifecycle_error(&e),
    }
}

async fn delete_tab(state: AppState, repo: &str, id: &str, tab: &str) -> Response<ApiBody> {
    let key = crate::domains::terminal::TerminalKey::tab(id, tab);
    if let Err(e) = state.terminals.kill_terminal(&key).await {
        log::warn!("Failed to kill terminal for tab '{tab}': {e}");
    }

    match state.sessions.delete_tab(repo, id, tab).await {
        Ok(true) => json_response(StatusCode::OK, &serde_json::json!({"success": true})),
        Ok(false) => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"success": false, "error": "Tab not found"}),
        ),
        Err(e) => {
            log::error!("Failed to delete tab '{tab}': {e}");
            map_lifecycle_error(&e)
        }
    }
}

pub(crate) async fn read_json_body_or_respond<T: for<'de> Deserialize<'de> + Default>(
    req: Request<Incoming>,
) -> Result<T, Response<ApiBody>> {
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read request body: {e}"),
            ));
        }
    };

    if bytes.is_empty() {
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            &format!("Invalid JSON body: {e}"),
        )
    })
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<ApiBody> {
    let payload = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(payload))
        .unwrap_or_else(|_| Response::new(full_body("")))
}

pub fn error_response(status: StatusCode, message: &str) -> Response<ApiBody> {
    json_response(status, &serde_json::json!({"error": message}))
}

/// Lifecycle errors keep their anyhow messages; the status code is inferred
/// from the failure class.
fn map_lifecycle_error(e: &anyhow::Error) -> Response<ApiBody> {
    let message = e.to_string();
    let status = if message.contains("no canonical clone") || message.contains("not found") {
        StatusCode::NOT_FOUND
    } else if message.contains("Invalid") {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("Lifecycle operation failed: {message}");
    }
    error_response(status, &message)
}
