//! GraphQL subscriptions over WebSocket (`graphql-transport-ws`).
//!
//! Each [`Subscription`] owns a background task holding its own socket.
//! The socket is opened lazily when the subscription starts, reconnects
//! with bounded exponential backoff, and is torn down when the handle is
//! dropped. The connection handshake runs through the interceptor, so a
//! socket rejected with close code 4401 waits for a token refresh.

use super::client::ApiClient;
use super::graphql::{extract, GraphqlError, GraphqlRequest, GraphqlResponse};
use super::reconnect::{self, ReconnectPolicy};
use crate::error::{Error, Result};
use crate::models::{
    CommandResult, ServerLog, ServerLogsHistory, ServerProcesses, TaskEvent, TaskMovedEvent,
};
use crate::session::AuthInterceptor;
use futures::{SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const PROTOCOL: &str = "graphql-transport-ws";

const EVENT_BUFFER: usize = 64;

/// Close codes the server uses to reject `connection_init`
const CLOSE_UNAUTHORIZED: u16 = 4401;
const CLOSE_FORBIDDEN: u16 = 4403;

pub const SERVER_PROCESSES: &str = r#"
subscription ServerProcesses($serverId: ID!) {
  serverProcesses(serverId: $serverId) {
    serverId
    processes {
      pm_id name pid
      pm2_env { status pm_uptime restart_time }
      monit { cpu memory }
    }
  }
}"#;

pub const SERVER_LOGS_HISTORY: &str = r#"
subscription ServerLogsHistory($serverId: ID!) {
  serverLogsHistory(serverId: $serverId) { serverId logs }
}"#;

pub const NEW_SERVER_LOG: &str = r#"
subscription NewServerLog($serverId: ID!) {
  newServerLog(serverId: $serverId) { id timestamp level message source serverId }
}"#;

pub const COMMAND_RESULT: &str = r#"
subscription CommandResult($serverId: ID!) {
  commandResult(serverId: $serverId) { serverId success command processId output error }
}"#;

pub const TASK_CREATED: &str = r#"
subscription OnTaskCreated {
  taskCreated { id title columnId projectId }
}"#;

pub const TASK_UPDATED: &str = r#"
subscription OnTaskUpdated {
  taskUpdated { id title columnId projectId }
}"#;

pub const TASK_MOVED: &str = r#"
subscription OnTaskMoved {
  taskMoved { id columnId position previousColumnId }
}"#;

pub const TASK_DELETED: &str = r#"
subscription OnTaskDeleted {
  taskDeleted { id columnId }
}"#;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage<'a> {
    ConnectionInit { payload: Value },
    Subscribe {
        id: &'a str,
        payload: &'a GraphqlRequest,
    },
    Complete { id: &'a str },
    Pong,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    ConnectionAck {
        #[serde(default)]
        payload: Option<Value>,
    },
    Next {
        id: String,
        payload: GraphqlResponse,
    },
    Error {
        id: String,
        payload: Vec<GraphqlError>,
    },
    Complete {
        id: String,
    },
    Ping {
        #[serde(default)]
        payload: Option<Value>,
    },
    Pong {
        #[serde(default)]
        payload: Option<Value>,
    },
}

/// Starts subscriptions against one WebSocket endpoint
#[derive(Clone)]
pub struct SubscriptionClient {
    ws_url: String,
    interceptor: AuthInterceptor,
    policy: ReconnectPolicy,
}

impl SubscriptionClient {
    pub fn new(ws_url: impl Into<String>, interceptor: AuthInterceptor, policy: ReconnectPolicy) -> Self {
        Self {
            ws_url: ws_url.into(),
            interceptor,
            policy,
        }
    }

    /// Share the session and refresh cycle of an HTTP client
    pub fn for_client(client: &ApiClient, ws_url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self::new(ws_url, client.interceptor().clone(), policy)
    }

    /// Start a subscription whose events are `data.<field>`
    pub fn subscribe<T>(&self, request: GraphqlRequest, field: &'static str) -> Subscription<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        debug!(id = %id, operation = request.operation_name, "Starting subscription");
        let worker = Worker {
            ws_url: self.ws_url.clone(),
            interceptor: self.interceptor.clone(),
            policy: self.policy,
            request,
            field,
            id: id.clone(),
            events,
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run());

        Subscription {
            id,
            events: receiver,
            cancel,
        }
    }

    pub fn server_processes(&self, server_id: &str) -> Subscription<ServerProcesses> {
        self.subscribe(
            GraphqlRequest::new(SERVER_PROCESSES, "ServerProcesses", json!({ "serverId": server_id })),
            "serverProcesses",
        )
    }

    pub fn server_logs_history(&self, server_id: &str) -> Subscription<ServerLogsHistory> {
        self.subscribe(
            GraphqlRequest::new(
                SERVER_LOGS_HISTORY,
                "ServerLogsHistory",
                json!({ "serverId": server_id }),
            ),
            "serverLogsHistory",
        )
    }

    pub fn new_server_log(&self, server_id: &str) -> Subscription<ServerLog> {
        self.subscribe(
            GraphqlRequest::new(NEW_SERVER_LOG, "NewServerLog", json!({ "serverId": server_id })),
            "newServerLog",
        )
    }

    pub fn command_result(&self, server_id: &str) -> Subscription<CommandResult> {
        self.subscribe(
            GraphqlRequest::new(COMMAND_RESULT, "CommandResult", json!({ "serverId": server_id })),
            "commandResult",
        )
    }

    pub fn task_created(&self) -> Subscription<TaskEvent> {
        self.subscribe(
            GraphqlRequest::new(TASK_CREATED, "OnTaskCreated", json!({})),
            "taskCreated",
        )
    }

    pub fn task_updated(&self) -> Subscription<TaskEvent> {
        self.subscribe(
            GraphqlRequest::new(TASK_UPDATED, "OnTaskUpdated", json!({})),
            "taskUpdated",
        )
    }

    pub fn task_moved(&self) -> Subscription<TaskMovedEvent> {
        self.subscribe(
            GraphqlRequest::new(TASK_MOVED, "OnTaskMoved", json!({})),
            "taskMoved",
        )
    }

    pub fn task_deleted(&self) -> Subscription<TaskEvent> {
        self.subscribe(
            GraphqlRequest::new(TASK_DELETED, "OnTaskDeleted", json!({})),
            "taskDeleted",
        )
    }
}

/// Live subscription. Dropping it unsubscribes and closes the socket.
pub struct Subscription<T> {
    id: String,
    events: mpsc::Receiver<Result<T>>,
    cancel: CancellationToken,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next event; `None` once the server completes or the task gives up
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.events.recv().await
    }

    /// Stop the subscription now rather than when the handle is dropped
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// Never pinned structurally
impl<T> Unpin for Subscription<T> {}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

enum End {
    /// Completed, errored or unsubscribed: do not reconnect
    Finished,
    /// Socket lost: reconnect
    Dropped(String),
}

struct Worker<T> {
    ws_url: String,
    interceptor: AuthInterceptor,
    policy: ReconnectPolicy,
    request: GraphqlRequest,
    field: &'static str,
    id: String,
    events: mpsc::Sender<Result<T>>,
    cancel: CancellationToken,
}

impl<T: DeserializeOwned + Send + 'static> Worker<T> {
    async fn run(self) {
        let mut failures = 0u32;

        loop {
            let ws_url = self.ws_url.as_str();
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.interceptor.execute(|token| connect(ws_url, token)) => result,
            };

            match connected {
                Ok(mut socket) => {
                    failures = 0;
                    match self.pump(&mut socket).await {
                        End::Finished => {
                            let _ = socket.close(None).await;
                            debug!(id = %self.id, "Subscription finished");
                            return;
                        }
                        End::Dropped(reason) => {
                            warn!(id = %self.id, reason = %reason, "Subscription socket dropped");
                        }
                    }
                }
                Err(e) if is_terminal(&e) => {
                    let _ = self.events.send(Err(e)).await;
                    return;
                }
                Err(e) => {
                    warn!(id = %self.id, error = %e, "Subscription connect failed");
                }
            }

            failures += 1;
            if !self.policy.allows(failures) {
                warn!(id = %self.id, failures, "Giving up on subscription");
                let _ = self
                    .events
                    .send(Err(Error::SubscriptionGaveUp {
                        attempts: self.policy.retry_attempts,
                    }))
                    .await;
                return;
            }

            let delay = self.policy.delay_for(failures - 1);
            info!(
                id = %self.id,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting subscription"
            );
            if !reconnect::wait(delay, &self.cancel).await {
                return;
            }
        }
    }

    async fn pump(&self, socket: &mut Socket) -> End {
        let subscribe = ClientMessage::Subscribe {
            id: &self.id,
            payload: &self.request,
        };
        if let Err(e) = send(socket, &subscribe).await {
            return End::Dropped(e.to_string());
        }

        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => None,
                frame = socket.next() => Some(frame),
            };
            let Some(frame) = frame else {
                let _ = send(socket, &ClientMessage::Complete { id: &self.id }).await;
                return End::Finished;
            };

            let text = match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(frame))) => return End::Dropped(describe_close(frame.as_ref())),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return End::Dropped(e.to_string()),
                None => return End::Dropped("connection closed".to_string()),
            };

            let message = match serde_json::from_str::<ServerMessage>(&text) {
                Ok(message) => message,
                Err(e) => {
                    debug!(error = %e, "Ignoring unrecognised message");
                    continue;
                }
            };

            match message {
                ServerMessage::Next { id, payload } if id == self.id => {
                    let event = payload
                        .into_data()
                        .and_then(|data| extract::<T>(data, self.field));
                    if self.events.send(event).await.is_err() {
                        let _ = send(socket, &ClientMessage::Complete { id: &self.id }).await;
                        return End::Finished;
                    }
                }
                ServerMessage::Error { id, payload } if id == self.id => {
                    let err = payload
                        .into_iter()
                        .next()
                        .map(GraphqlError::into_error)
                        .unwrap_or_else(|| Error::WebSocket("subscription rejected".to_string()));
                    let _ = self.events.send(Err(err)).await;
                    return End::Finished;
                }
                ServerMessage::Complete { id } if id == self.id => return End::Finished,
                ServerMessage::Ping { .. } => {
                    if let Err(e) = send(socket, &ClientMessage::Pong).await {
                        return End::Dropped(e.to_string());
                    }
                }
                _ => {}
            }
        }
    }
}

/// Errors that end a subscription instead of triggering a reconnect
fn is_terminal(err: &Error) -> bool {
    err.auth_rejection().is_some() || matches!(err, Error::SessionExpired)
}

fn connection_params(token: Option<&str>) -> Value {
    match token {
        Some(token) => {
            let bearer = format!("Bearer {}", token);
            json!({ "Authorization": bearer, "authorization": bearer })
        }
        None => json!({}),
    }
}

/// Open the socket and complete the `connection_init`/`connection_ack` handshake
async fn connect(ws_url: &str, token: Option<String>) -> Result<Socket> {
    let mut request = ws_url.into_client_request().map_err(ws_error)?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(PROTOCOL));
    let (mut socket, _) = connect_async(request).await.map_err(ws_error)?;

    let init = ClientMessage::ConnectionInit {
        payload: connection_params(token.as_deref()),
    };
    send(&mut socket, &init).await?;

    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
                Ok(ServerMessage::ConnectionAck { .. }) => {
                    debug!(url = ws_url, "Subscription socket acknowledged");
                    return Ok(socket);
                }
                Ok(ServerMessage::Ping { .. }) => send(&mut socket, &ClientMessage::Pong).await?,
                Ok(other) => debug!(message = ?other, "Unexpected message before ack"),
                Err(e) => return Err(Error::WebSocket(format!("malformed message: {}", e))),
            },
            Some(Ok(Message::Close(frame))) => return Err(close_error(frame.as_ref())),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(ws_error(e)),
            None => {
                return Err(Error::WebSocket(
                    "connection closed before acknowledgement".to_string(),
                ))
            }
        }
    }
}

async fn send(socket: &mut Socket, message: &ClientMessage<'_>) -> Result<()> {
    let text = serde_json::to_string(message)?;
    socket.send(Message::Text(text)).await.map_err(ws_error)
}

fn ws_error(err: tokio_tungstenite::tungstenite::Error) -> Error {
    Error::WebSocket(err.to_string())
}

fn close_error(frame: Option<&CloseFrame<'_>>) -> Error {
    let Some(frame) = frame else {
        return Error::WebSocket("connection closed before acknowledgement".to_string());
    };
    let message = frame.reason.to_string();
    match u16::from(frame.code) {
        CLOSE_UNAUTHORIZED => Error::Unauthenticated { message },
        CLOSE_FORBIDDEN => Error::Forbidden { message },
        _ => Error::WebSocket(describe_close(Some(frame))),
    }
}

fn describe_close(frame: Option<&CloseFrame<'_>>) -> String {
    match frame {
        Some(frame) => format!("closed ({}): {}", u16::from(frame.code), frame.reason),
        None => "closed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{signed_in_client, FakeTransport};
    use crate::session::AuthSignal;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::accept_hdr_async;

    type ServerSocket = WebSocketStream<TcpStream>;

    fn negotiate(_req: &Request, mut resp: Response) -> std::result::Result<Response, ErrorResponse> {
        resp.headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(PROTOCOL));
        Ok(resp)
    }

    /// Accept a single connection and hand it to `handler`; returns the ws URL
    async fn serve_once<F, Fut>(handler: F) -> String
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let socket = accept_hdr_async(stream, negotiate).await.unwrap();
            handler(socket).await;
        });
        format!("ws://{}", addr)
    }

    async fn recv_json(socket: &mut ServerSocket) -> Value {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    async fn send_json(socket: &mut ServerSocket, value: Value) {
        socket.send(Message::Text(value.to_string())).await.unwrap();
    }

    fn fast_policy(retry_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            retry_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn client_messages_match_protocol() {
        let init = ClientMessage::ConnectionInit {
            payload: connection_params(Some("abc")),
        };
        assert_eq!(
            serde_json::to_value(&init).unwrap(),
            json!({ "type": "connection_init", "payload": {
                "Authorization": "Bearer abc", "authorization": "Bearer abc"
            }})
        );

        let request = GraphqlRequest::new(TASK_MOVED, "OnTaskMoved", json!({}));
        let subscribe = ClientMessage::Subscribe {
            id: "1",
            payload: &request,
        };
        let value = serde_json::to_value(&subscribe).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["payload"]["operationName"], "OnTaskMoved");

        assert_eq!(
            serde_json::to_value(&ClientMessage::Pong).unwrap(),
            json!({ "type": "pong" })
        );
    }

    #[test]
    fn server_messages_parse() {
        let ack: ServerMessage =
            serde_json::from_str(r#"{"type":"connection_ack","payload":{}}"#).unwrap();
        assert!(matches!(ack, ServerMessage::ConnectionAck { .. }));

        let ping: ServerMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ServerMessage::Ping { .. }));
    }

    #[tokio::test]
    async fn streams_events_until_complete() {
        let (init_tx, init_rx) = oneshot::channel();
        let url = serve_once(|mut socket| async move {
            let init = recv_json(&mut socket).await;
            let _ = init_tx.send(init);
            send_json(&mut socket, json!({ "type": "connection_ack" })).await;

            let subscribe = recv_json(&mut socket).await;
            let id = subscribe["id"].as_str().unwrap().to_string();
            send_json(&mut socket, json!({ "type": "ping" })).await;
            assert_eq!(recv_json(&mut socket).await["type"], "pong");

            send_json(
                &mut socket,
                json!({ "type": "next", "id": id, "payload": { "data": { "newServerLog": {
                    "id": "l1", "timestamp": "2025-01-01T00:00:00Z", "level": "ERROR",
                    "message": "disk full", "serverId": "s1"
                }}}}),
            )
            .await;
            send_json(&mut socket, json!({ "type": "complete", "id": id })).await;
            // Keep the socket open until the client closes it
            while socket.next().await.is_some() {}
        })
        .await;

        let client = signed_in_client(FakeTransport::new()).await;
        let subscriptions = SubscriptionClient::for_client(&client, url, fast_policy(0));
        let mut logs = subscriptions.new_server_log("s1");

        let log = logs.next().await.unwrap().unwrap();
        assert_eq!(log.message, "disk full");
        assert!(logs.next().await.is_none());

        let init = init_rx.await.unwrap();
        assert_eq!(init["type"], "connection_init");
        assert_eq!(init["payload"]["Authorization"], "Bearer access");
    }

    #[tokio::test]
    async fn unsubscribe_sends_complete() {
        let (subscribed_tx, subscribed_rx) = oneshot::channel();
        let (complete_tx, complete_rx) = oneshot::channel();
        let url = serve_once(|mut socket| async move {
            let _ = recv_json(&mut socket).await;
            send_json(&mut socket, json!({ "type": "connection_ack" })).await;
            let subscribe = recv_json(&mut socket).await;
            let _ = subscribed_tx.send(());

            let complete = recv_json(&mut socket).await;
            assert_eq!(complete["id"], subscribe["id"]);
            let _ = complete_tx.send(complete["type"].as_str().unwrap_or_default().to_string());
        })
        .await;

        let client = signed_in_client(FakeTransport::new()).await;
        let subscriptions = SubscriptionClient::for_client(&client, url, fast_policy(0));
        let deleted = subscriptions.task_deleted();

        subscribed_rx.await.unwrap();
        deleted.unsubscribe();

        let kind = tokio::time::timeout(Duration::from_secs(2), complete_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kind, "complete");
    }

    #[tokio::test]
    async fn gives_up_after_retry_attempts() {
        // Free port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = signed_in_client(FakeTransport::new()).await;
        let subscriptions =
            SubscriptionClient::for_client(&client, format!("ws://{}", addr), fast_policy(2));
        let mut moves = subscriptions.task_moved();

        let err = moves.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::SubscriptionGaveUp { attempts: 2 }));
        assert!(moves.next().await.is_none());
    }

    #[tokio::test]
    async fn forbidden_close_logs_out() {
        let url = serve_once(|mut socket| async move {
            let _ = recv_json(&mut socket).await;
            let _ = socket
                .close(Some(CloseFrame {
                    code: CloseCode::from(CLOSE_FORBIDDEN),
                    reason: "Forbidden".into(),
                }))
                .await;
        })
        .await;

        let client = signed_in_client(FakeTransport::new()).await;
        let mut signals = client.signals().channel();
        let subscriptions = SubscriptionClient::for_client(&client, url, fast_policy(3));
        let mut created = subscriptions.task_created();

        let err = created.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
        assert_eq!(signals.recv().await.unwrap(), AuthSignal::Logout);
    }
}
