use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    extract::{
        connect_info::{ConnectInfo, Connected},
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, Response},
    routing::get,
    serve::IncomingStream,
    Router,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use crate::api::pages;
use crate::gate::GateFile;

/// Text message that makes the server end a WebSocket session
pub const CLOSE_COMMAND: &str = "close";

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<GateFile>,
    /// Cancelled on shutdown, ends open WebSocket sessions
    pub shutdown: CancellationToken,
}

/// Server-side address a connection was accepted on
#[derive(Debug, Clone, Copy)]
pub struct LocalAddr(pub Option<SocketAddr>);

impl Connected<IncomingStream<'_>> for LocalAddr {
    fn connect_info(target: IncomingStream<'_>) -> Self {
        LocalAddr(target.local_addr().ok())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn index(
    State(state): State<AppState>,
    ConnectInfo(local): ConnectInfo<LocalAddr>,
) -> Html<String> {
    Html(pages::page_for(&state.gate, local.0.map(|addr| addr.ip())))
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| echo_session(socket, state.shutdown))
}

/// What to do with one incoming frame
#[derive(Debug, PartialEq)]
pub enum Reply {
    Send(Message),
    /// Close the session from our side
    Close,
    /// Peer closed the session
    Finished,
    Ignore,
}

pub fn reply_to(msg: Message) -> Reply {
    match msg {
        Message::Text(text) if text == CLOSE_COMMAND => Reply::Close,
        Message::Text(text) => Reply::Send(Message::Text(text)),
        Message::Binary(data) => Reply::Send(Message::Binary(data)),
        Message::Close(_) => Reply::Finished,
        // Pings are answered by the protocol layer
        Message::Ping(_) | Message::Pong(_) => Reply::Ignore,
    }
}

async fn echo_session(socket: WebSocket, shutdown: CancellationToken) {
    let (sender, receiver) = socket.split();
    tracing::debug!("WebSocket session opened");
    echo(sender, receiver, shutdown).await;
    tracing::debug!("WebSocket session closed");
}

/// Echo frames from `receiver` to `sender` until either side closes or
/// `shutdown` is cancelled.
pub async fn echo<Tx, Rx, E>(mut sender: Tx, mut receiver: Rx, shutdown: CancellationToken)
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: fmt::Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let msg = tokio::select! {
            msg = receiver.next() => msg,
            _ = shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        };

        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                tracing::warn!("WebSocket connection closed with exception: {}", e);
                break;
            }
            None => break,
        };

        match reply_to(msg) {
            Reply::Send(reply) => {
                if let Err(e) = sender.send(reply).await {
                    tracing::debug!("Failed to send WebSocket reply: {}", e);
                    break;
                }
            }
            Reply::Close => {
                if let Err(e) = sender.close().await {
                    tracing::debug!("Failed to close WebSocket: {}", e);
                }
                break;
            }
            Reply::Finished => break,
            Reply::Ignore => {}
        }
    }
}
