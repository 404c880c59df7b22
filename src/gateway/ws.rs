use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use hyper::body::Incoming;
use hyper::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::{Message, Role};

use crate::domains::sessions::entity::Session;
use crate::domains::sessions::service::{CreateSessionParams, CreateTabParams};
use crate::domains::terminal::TerminalKey;
use crate::gateway::frames::{ClientFrame, ServerFrame};
use crate::gateway::http::{ApiBody, error_response, full_body};
use crate::gateway::state::AppState;

const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

/// Upgrade a terminal request to a WebSocket and hand the connection to a
/// dedicated task. The 101 response is produced synchronously; everything
/// else happens after the upgrade completes.
pub fn handle_terminal_upgrade(
    mut req: Request<Incoming>,
    state: AppState,
    repo: String,
    session_id: String,
) -> Result<Response<ApiBody>, hyper::Error> {
    let key = match req.headers().get(SEC_WEBSOCKET_KEY) {
        Some(key) => key.clone(),
        None => {
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                "Missing Sec-WebSocket-Key header",
            ));
        }
    };

    let tab_id = req.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "tab")
            .map(|(_, value)| value.into_owned())
    });

    let accept = derive_accept_key(key.as_bytes());

    tokio::spawn(async move {
        match hyper::upgrade::on(&mut req).await {
            Ok(upgraded) => {
                let io = TokioIo::new(upgraded);
                let socket = WebSocketStream::from_raw_socket(io, Role::Server, None).await;
                run_terminal_connection(socket, state, repo, session_id, tab_id).await;
            }
            Err(e) => log::warn!("Terminal upgrade failed: {e}"),
        }
    });

    let response = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(CONNECTION, "upgrade")
        .header(UPGRADE, "websocket")
        .header(SEC_WEBSOCKET_ACCEPT, accept)
        .body(full_body(""))
        .unwrap_or_else(|_| Response::new(full_body("")));
    Ok(response)
}

/// Resolve the session, healing an invalid working copy through the
/// reconciliation path before attaching.
async fn resolve_session(
    state: &AppState,
    repo: &str,
    session_id: &str,
) -> Result<Session, String> {
    let session = state
        .sessions
        .get_session(repo, session_id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Session '{session_id}' not found"))?;

    if state.sessions.validate(&session) {
        return Ok(session);
    }

    log::info!("Session '{session_id}' has an invalid worktree, reconciling before attach");
    state
        .sessions
        .create_session(
            repo,
            CreateSessionParams {
                session_id: Some(session_id.to_string()),
                display_name: session.display_name.clone(),
                base_branch: Some(session.base_branch.clone()),
            },
        )
        .await
        .map(|created| created.session)
        .map_err(|e| e.to_string())
}

async fn send_frame<S>(
    sink: &mut futures::stream::SplitSink<WebSocketStream<S>, Message>,
    frame: &ServerFrame,
) -> Result<(), tokio_tungstenite::tungstenite::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let json = serde_json::to_string(frame).unwrap_or_default();
    sink.send(Message::Text(json.into())).await
}

async fn run_terminal_connection<S>(
    socket: WebSocketStream<S>,
    state: AppState,
    repo: String,
    session_id: String,
    tab_id: Option<String>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    let session = match resolve_session(&state, &repo, &session_id).await {
        Ok(session) => session,
        Err(message) => {
            let _ = send_frame(&mut sink, &ServerFrame::Error { message }).await;
            let _ = sink.close().await;
            return;
        }
    };

    // A tab addressed for the first time is materialized on the spot
    let tab = match &tab_id {
        Some(tab) => {
            let result = state
                .sessions
                .create_tab(
                    &repo,
                    &session_id,
                    CreateTabParams {
                        tab_id: Some(tab.clone()),
                        ..Default::default()
                    },
                )
                .await;
            match result {
                Ok((tab, _)) => Some(tab),
                Err(e) => {
                    let _ = send_frame(
                        &mut sink,
                        &ServerFrame::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                    let _ = sink.close().await;
                    return;
                }
            }
        }
        None => None,
    };

    let key = match &tab_id {
        Some(tab) => TerminalKey::tab(&session_id, tab),
        None => TerminalKey::session(&session_id),
    };
    let cwd = tab
        .as_ref()
        .and_then(|t| t.worktree_path.clone())
        .unwrap_or_else(|| session.worktree_path.clone());
    let branch_name = tab
        .as_ref()
        .and_then(|t| t.branch.clone())
        .unwrap_or_else(|| session.branch.clone());

    let outcome = match state
        .terminals
        .attach(&key, &cwd, DEFAULT_COLS, DEFAULT_ROWS)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            let _ = send_frame(
                &mut sink,
                &ServerFrame::Error {
                    message: format!("Failed to attach terminal: {e}"),
                },
            )
            .await;
            let _ = sink.close().await;
            return;
        }
    };

    let connected = ServerFrame::Connected {
        session_id: session_id.clone(),
        tab_id: tab_id.clone(),
        branch_name,
        base_branch: session.base_branch.clone(),
        base_commit: session.base_commit.clone(),
        is_new_session: outcome.is_new_session,
        reconnected: outcome.reconnected,
    };
    if send_frame(&mut sink, &connected).await.is_err() {
        state.terminals.detach(&key).await;
        return;
    }

    if let Some(tab) = &tab_id {
        state.sessions.db_manager().touch_tab(&session_id, tab);
    }
    state.sessions.touch(&session_id);

    let crate::domains::terminal::pty::PtyProcess {
        controller,
        mut output_rx,
        exit_rx,
    } = outcome.process;
    let mut exit_rx = exit_rx;

    let mut ping_interval = tokio::time::interval(state.ping_interval);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping_interval.tick().await; // first tick fires immediately
    let mut pong_pending = false;

    loop {
        tokio::select! {
            // PTY output, in arrival order
            chunk = output_rx.recv() => {
                match chunk {
                    Some(bytes) => {
                        let frame = ServerFrame::Output { data: BASE64.encode(&bytes) };
                        if send_frame(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // Reader finished; exit code follows on exit_rx
                        let code = (&mut exit_rx).await.unwrap_or(-1);
                        let _ = send_frame(&mut sink, &ServerFrame::Exit { code }).await;
                        break;
                    }
                }
            }

            // Liveness culling: a missed pong round closes the connection
            _ = ping_interval.tick() => {
                if pong_pending {
                    log::info!("Terminal {key} missed keep-alive, closing connection");
                    break;
                }
                pong_pending = true;
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                if let Some(response) =
                                    handle_client_frame(&state, &key, &controller, frame).await
                                {
                                    if send_frame(&mut sink, &response).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                let frame = ServerFrame::Error {
                                    message: format!("Invalid frame: {e}"),
                                };
                                if send_frame(&mut sink, &frame).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_pending = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::debug!("Terminal {key} socket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    // Disconnect kills only the attach handle; the mux session survives so
    // the next connection resumes exactly where this one left off.
    state.terminals.detach(&key).await;
    state.sessions.touch(&session_id);
    let _ = sink.close().await;
    log::info!("Terminal connection closed for {key}");
}

/// Apply one client frame. Returns a frame to send back, if any.
async fn handle_client_frame(
    state: &AppState,
    key: &TerminalKey,
    controller: &crate::domains::terminal::pty::PtyController,
    frame: ClientFrame,
) -> Option<ServerFrame> {
    match frame {
        ClientFrame::Input { data } => match BASE64.decode(data.as_bytes()) {
            Ok(bytes) => {
                if let Err(e) = controller.write(&bytes) {
                    return Some(ServerFrame::Error {
                        message: format!("Write failed: {e}"),
                    });
                }
                None
            }
            Err(_) => Some(ServerFrame::Error {
                message: "Input data is not valid base64".to_string(),
            }),
        },
        ClientFrame::Resize { cols, rows } => {
            if let Err(e) = controller.resize(cols, rows) {
                log::debug!("Resize failed for {key}: {e}");
            }
            let _ = state.terminals.mux().resize_window(&key.mux_session_name(), cols, rows).await;
            None
        }
        ClientFrame::Restart => {
            if let Err(e) = state.terminals.restart(key).await {
                return Some(ServerFrame::Error {
                    message: format!("Restart failed: {e}"),
                });
            }
            None
        }
        ClientFrame::Ping => Some(ServerFrame::Pong),
    }
}
