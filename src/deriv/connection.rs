//! Upstream connection task and correlation state machine.
//!
//! Each authenticated session owns one task running [`run`]. The task owns
//! the upstream socket and a [`ConnectionState`] tracking:
//!
//! - pending calls awaiting their correlated response (`req_id` map),
//! - live subscription streams routed by `req_id`,
//! - outbound payloads queued until authorization completes.
//!
//! The socket is dialed lazily: the first command after startup (or after
//! a disconnect) triggers a single connect attempt, and `authorize` is
//! sent before anything else. There is deliberately no retry/backoff; a
//! failed dial surfaces as timeouts on the callers.

use std::collections::{HashMap, HashSet};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::messages::{self, MSG_TYPE_AUTHORIZE, UpstreamMessage};
use crate::error::GatewayError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type CallReply = oneshot::Sender<Result<Value, GatewayError>>;

/// Settings for one upstream connection.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Full upstream URL including the `app_id` query parameter.
    pub url: String,
    /// Deriv API token, sent in the `authorize` request after connect.
    pub token: String,
    /// Capacity of each subscription's tick channel.
    pub stream_buffer_size: usize,
}

/// Commands accepted by the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    /// One-shot request/response call.
    Call {
        payload: Value,
        reply: CallReply,
    },
    /// Start a subscription stream.
    Subscribe {
        payload: Value,
        reply: oneshot::Sender<Result<Subscription, GatewayError>>,
    },
    /// Stop forwarding a stream and forget it upstream.
    Forget { req_id: u64 },
    /// Close the socket and end the task.
    Close,
}

/// A granted subscription: the correlation id plus the message channel.
#[derive(Debug)]
pub(crate) struct Subscription {
    pub req_id: u64,
    pub receiver: mpsc::Receiver<Value>,
}

/// Correlation state for one upstream connection.
///
/// Pure bookkeeping, no I/O: methods return the payloads that should be
/// written to the socket, which keeps the routing logic unit-testable.
pub(crate) struct ConnectionState {
    authorized: bool,
    req_id_counter: u64,
    stream_buffer_size: usize,
    /// Calls awaiting their correlated response.
    pending: HashMap<u64, CallReply>,
    /// Live subscription channels, routed by `req_id`.
    streams: HashMap<u64, mpsc::Sender<Value>>,
    /// Upstream subscription ids observed on stream messages, for `forget`.
    sub_ids: HashMap<u64, String>,
    /// Outbound payloads held back until authorization completes.
    wait_queue: Vec<Value>,
}

impl ConnectionState {
    pub(crate) fn new(stream_buffer_size: usize) -> Self {
        Self {
            authorized: false,
            req_id_counter: 0,
            stream_buffer_size,
            pending: HashMap::new(),
            streams: HashMap::new(),
            sub_ids: HashMap::new(),
            wait_queue: Vec::new(),
        }
    }

    pub(crate) fn next_req_id(&mut self) -> u64 {
        self.req_id_counter += 1;
        self.req_id_counter
    }

    /// Passes a payload through when authorized, queues it otherwise.
    fn submit(&mut self, payload: Value) -> Option<Value> {
        if self.authorized {
            Some(payload)
        } else {
            self.wait_queue.push(payload);
            None
        }
    }

    /// Applies a command, returning the payloads to write now.
    pub(crate) fn apply_command(&mut self, cmd: Command) -> Vec<Value> {
        match cmd {
            Command::Call { payload, reply } => {
                let req_id = self.next_req_id();
                match messages::with_req_id(payload, req_id) {
                    Ok(payload) => {
                        self.pending.insert(req_id, reply);
                        self.submit(payload).into_iter().collect()
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                        Vec::new()
                    }
                }
            }
            Command::Subscribe { payload, reply } => {
                let req_id = self.next_req_id();
                match messages::with_req_id(payload, req_id) {
                    Ok(payload) => {
                        let (tx, rx) = mpsc::channel(self.stream_buffer_size);
                        self.streams.insert(req_id, tx);
                        let _ = reply.send(Ok(Subscription {
                            req_id,
                            receiver: rx,
                        }));
                        self.submit(payload).into_iter().collect()
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                        Vec::new()
                    }
                }
            }
            Command::Forget { req_id } => {
                self.streams.remove(&req_id);
                if let Some(sub_id) = self.sub_ids.remove(&req_id) {
                    let forget_id = self.next_req_id();
                    self.submit(messages::forget_request(&sub_id, forget_id))
                        .into_iter()
                        .collect()
                } else {
                    Vec::new()
                }
            }
            // Close is handled by the I/O loop before reaching here.
            Command::Close => Vec::new(),
        }
    }

    /// Routes one upstream message, returning the payloads to write now
    /// (non-empty only when authorization flushes the wait queue).
    pub(crate) fn handle_message(&mut self, msg: UpstreamMessage) -> Vec<Value> {
        let UpstreamMessage { envelope, value } = msg;
        let mut outs = Vec::new();

        if envelope.msg_type.as_deref() == Some(MSG_TYPE_AUTHORIZE) {
            match &envelope.error {
                None => {
                    if !self.authorized {
                        self.authorized = true;
                        outs.append(&mut self.wait_queue);
                        tracing::info!("upstream session authorized");
                    }
                }
                Some(err) => {
                    // A failed session authorize means nothing queued can
                    // ever be sent. Client-proxied authorize calls have a
                    // pending entry and are resolved below instead.
                    let internal = envelope
                        .req_id
                        .is_none_or(|id| !self.pending.contains_key(&id));
                    if internal {
                        tracing::warn!(code = %err.code, "upstream authorization failed");
                        self.fail_all(&GatewayError::Upstream {
                            code: err.code.clone(),
                            message: err.message.clone(),
                        });
                        return outs;
                    }
                }
            }
        }

        let Some(req_id) = envelope.req_id else {
            return outs;
        };

        if let Some(tx) = self.streams.get(&req_id) {
            if let Some(err) = &envelope.error {
                tracing::warn!(req_id, code = %err.code, "subscription refused upstream");
                // Dropping the sender ends the downstream SSE stream.
                self.streams.remove(&req_id);
                self.sub_ids.remove(&req_id);
            } else {
                if let Some(sub) = &envelope.subscription {
                    self.sub_ids.insert(req_id, sub.id.clone());
                }
                if tx.try_send(value).is_err() {
                    tracing::warn!(req_id, "tick channel full, dropping message");
                }
            }
        } else if let Some(reply) = self.pending.remove(&req_id) {
            let result = match envelope.error {
                Some(err) => Err(err.into()),
                None => Ok(value),
            };
            let _ = reply.send(result);
        }

        outs
    }

    /// Resets authorization and fails state the socket took down with it.
    ///
    /// Queued-but-unsent payloads survive for the next connection; their
    /// pending entries and stream channels are kept alive. Everything
    /// already on the wire fails with [`GatewayError::UpstreamClosed`].
    pub(crate) fn on_disconnected(&mut self) {
        self.authorized = false;

        let queued: HashSet<u64> = self
            .wait_queue
            .iter()
            .filter_map(|v| v.get("req_id").and_then(Value::as_u64))
            .collect();

        let in_flight: Vec<u64> = self
            .pending
            .keys()
            .copied()
            .filter(|id| !queued.contains(id))
            .collect();
        for id in in_flight {
            if let Some(reply) = self.pending.remove(&id) {
                let _ = reply.send(Err(GatewayError::UpstreamClosed));
            }
        }

        // Subscription ids are connection-scoped; live streams died with
        // the socket, queued subscribe requests stay.
        self.sub_ids.clear();
        self.streams.retain(|id, _| queued.contains(id));
    }

    fn fail_all(&mut self, err: &GatewayError) {
        for (_, reply) in self.pending.drain() {
            let cloned = match err {
                GatewayError::Upstream { code, message } => GatewayError::Upstream {
                    code: code.clone(),
                    message: message.clone(),
                },
                _ => GatewayError::UpstreamClosed,
            };
            let _ = reply.send(Err(cloned));
        }
        self.streams.clear();
        self.sub_ids.clear();
        self.wait_queue.clear();
    }
}

/// One resolved iteration of the connected select loop.
enum Incoming {
    Cmd(Option<Command>),
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

/// Runs the connection task until the command channel closes or a
/// [`Command::Close`] arrives.
pub(crate) async fn run(config: UpstreamConfig, mut cmd_rx: mpsc::Receiver<Command>) {
    let mut state = ConnectionState::new(config.stream_buffer_size);
    let mut ws: Option<WsStream> = None;

    loop {
        if ws.is_some() {
            let mut drop_socket = false;
            let mut shutdown = false;

            // Borrow scope: the select arms hold the socket mutably.
            if let Some(stream) = ws.as_mut() {
                let incoming = tokio::select! {
                    cmd = cmd_rx.recv() => Incoming::Cmd(cmd),
                    frame = stream.next() => Incoming::Frame(frame),
                };

                match incoming {
                    Incoming::Cmd(None | Some(Command::Close)) => shutdown = true,
                    Incoming::Cmd(Some(cmd)) => {
                        let outs = state.apply_command(cmd);
                        if send_all(stream, outs).await.is_err() {
                            drop_socket = true;
                        }
                    }
                    Incoming::Frame(Some(Ok(Message::Text(txt)))) => {
                        match UpstreamMessage::parse(txt.as_str()) {
                            Ok(msg) => {
                                let outs = state.handle_message(msg);
                                if send_all(stream, outs).await.is_err() {
                                    drop_socket = true;
                                }
                            }
                            Err(err) => tracing::warn!(%err, "unparseable upstream frame"),
                        }
                    }
                    Incoming::Frame(Some(Ok(Message::Ping(data)))) => {
                        let _ = stream.send(Message::Pong(data)).await;
                    }
                    Incoming::Frame(Some(Ok(Message::Close(_))) | None) => {
                        tracing::info!("upstream connection closed");
                        drop_socket = true;
                    }
                    Incoming::Frame(Some(Err(err))) => {
                        tracing::warn!(%err, "upstream socket error");
                        drop_socket = true;
                    }
                    Incoming::Frame(Some(Ok(_))) => {}
                }
            }

            if drop_socket {
                state.on_disconnected();
                ws = None;
            }
            if shutdown {
                if let Some(mut stream) = ws.take() {
                    let _ = stream.close(None).await;
                }
                break;
            }
        } else {
            // No socket: wait for work, then dial once.
            let Some(cmd) = cmd_rx.recv().await else { break };
            if matches!(cmd, Command::Close) {
                break;
            }
            ws = dial(&config, &mut state).await;
            let outs = state.apply_command(cmd);
            if let Some(stream) = ws.as_mut()
                && send_all(stream, outs).await.is_err()
            {
                state.on_disconnected();
                ws = None;
            }
        }
    }

    tracing::debug!("upstream connection task finished");
}

/// Dials the upstream and sends the `authorize` request.
async fn dial(config: &UpstreamConfig, state: &mut ConnectionState) -> Option<WsStream> {
    match connect_async(config.url.as_str()).await {
        Ok((mut stream, _response)) => {
            let req_id = state.next_req_id();
            let auth = messages::authorize_request(&config.token, req_id);
            if send_all(&mut stream, vec![auth]).await.is_err() {
                tracing::warn!("failed to send upstream authorization");
                return None;
            }
            tracing::info!(url = %config.url, "upstream connected");
            Some(stream)
        }
        Err(err) => {
            tracing::warn!(%err, "upstream connect failed");
            None
        }
    }
}

async fn send_all(
    stream: &mut WsStream,
    payloads: Vec<Value>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    for payload in payloads {
        stream.send(Message::Text(payload.to_string().into())).await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn authorize_ok() -> UpstreamMessage {
        UpstreamMessage::parse(r#"{"msg_type":"authorize","authorize":{"loginid":"CR1"}}"#)
            .unwrap()
    }

    fn call_cmd(payload: Value) -> (Command, oneshot::Receiver<Result<Value, GatewayError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Command::Call {
                payload,
                reply: tx,
            },
            rx,
        )
    }

    fn req_id_of(payload: &Value) -> u64 {
        payload.get("req_id").and_then(Value::as_u64).unwrap()
    }

    #[tokio::test]
    async fn calls_queue_until_authorized_then_flush_in_order() {
        let mut state = ConnectionState::new(8);

        let (cmd_a, _rx_a) = call_cmd(json!({ "ping": 1 }));
        let (cmd_b, _rx_b) = call_cmd(json!({ "time": 1 }));
        assert!(state.apply_command(cmd_a).is_empty());
        assert!(state.apply_command(cmd_b).is_empty());

        let outs = state.handle_message(authorize_ok());
        assert_eq!(outs.len(), 2);
        assert!(outs.first().unwrap().get("ping").is_some());
        assert!(outs.last().unwrap().get("time").is_some());

        // Once authorized, sends pass straight through.
        let (cmd_c, _rx_c) = call_cmd(json!({ "ping": 1 }));
        assert_eq!(state.apply_command(cmd_c).len(), 1);
    }

    #[tokio::test]
    async fn call_resolves_with_matching_response() {
        let mut state = ConnectionState::new(8);
        state.handle_message(authorize_ok());

        let (cmd, mut rx) = call_cmd(json!({ "ping": 1 }));
        let outs = state.apply_command(cmd);
        let req_id = req_id_of(outs.first().unwrap());

        // Unrelated response does not resolve the call.
        let other = UpstreamMessage::parse(r#"{"msg_type":"ping","req_id":9999}"#).unwrap();
        state.handle_message(other);
        assert!(rx.try_recv().is_err());

        let raw = format!(r#"{{"msg_type":"ping","ping":"pong","req_id":{req_id}}}"#);
        state.handle_message(UpstreamMessage::parse(&raw).unwrap());
        let result = rx.try_recv().unwrap().unwrap();
        assert_eq!(result.get("ping").and_then(Value::as_str), Some("pong"));
    }

    #[tokio::test]
    async fn vendor_error_rejects_call() {
        let mut state = ConnectionState::new(8);
        state.handle_message(authorize_ok());

        let (cmd, mut rx) = call_cmd(json!({ "buy": 1 }));
        let outs = state.apply_command(cmd);
        let req_id = req_id_of(outs.first().unwrap());

        let raw = format!(
            r#"{{"msg_type":"buy","error":{{"code":"InsufficientBalance","message":"no"}},"req_id":{req_id}}}"#
        );
        state.handle_message(UpstreamMessage::parse(&raw).unwrap());
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { ref code, .. } if code == "InsufficientBalance"));
    }

    #[tokio::test]
    async fn non_object_payload_rejected_immediately() {
        let mut state = ConnectionState::new(8);
        state.handle_message(authorize_ok());

        let (cmd, mut rx) = call_cmd(json!("just a string"));
        assert!(state.apply_command(cmd).is_empty());
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn subscription_forwards_stream_and_forgets() {
        let mut state = ConnectionState::new(8);
        state.handle_message(authorize_ok());

        let (tx, mut rx) = oneshot::channel();
        let outs = state.apply_command(Command::Subscribe {
            payload: messages::ticks_request("R_100"),
            reply: tx,
        });
        let req_id = req_id_of(outs.first().unwrap());
        let mut sub = rx.try_recv().unwrap().unwrap();
        assert_eq!(sub.req_id, req_id);

        let tick = format!(
            r#"{{"msg_type":"tick","tick":{{"quote":1.23}},"subscription":{{"id":"s-1"}},"req_id":{req_id}}}"#
        );
        state.handle_message(UpstreamMessage::parse(&tick).unwrap());
        let forwarded = sub.receiver.try_recv().unwrap();
        assert!(forwarded.get("tick").is_some());

        // Forget sends the upstream subscription id and ends the stream.
        let outs = state.apply_command(Command::Forget { req_id });
        assert_eq!(
            outs.first().unwrap().get("forget").and_then(Value::as_str),
            Some("s-1")
        );
        state.handle_message(UpstreamMessage::parse(&tick).unwrap());
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscription_error_closes_stream() {
        let mut state = ConnectionState::new(8);
        state.handle_message(authorize_ok());

        let (tx, mut rx) = oneshot::channel();
        let outs = state.apply_command(Command::Subscribe {
            payload: messages::ticks_request("BAD"),
            reply: tx,
        });
        let req_id = req_id_of(outs.first().unwrap());
        let mut sub = rx.try_recv().unwrap().unwrap();

        let raw = format!(
            r#"{{"msg_type":"tick","error":{{"code":"InvalidSymbol","message":"no"}},"req_id":{req_id}}}"#
        );
        state.handle_message(UpstreamMessage::parse(&raw).unwrap());
        assert!(matches!(
            sub.receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_fails_in_flight_keeps_queued() {
        let mut state = ConnectionState::new(8);
        state.handle_message(authorize_ok());

        // Sent call: in flight.
        let (sent_cmd, mut sent_rx) = call_cmd(json!({ "ping": 1 }));
        assert_eq!(state.apply_command(sent_cmd).len(), 1);

        state.on_disconnected();
        assert!(matches!(
            sent_rx.try_recv().unwrap(),
            Err(GatewayError::UpstreamClosed)
        ));

        // Queued call after the drop: survives to the next authorization.
        let (queued_cmd, mut queued_rx) = call_cmd(json!({ "time": 1 }));
        assert!(state.apply_command(queued_cmd).is_empty());
        state.on_disconnected();
        assert!(queued_rx.try_recv().is_err());

        let outs = state.handle_message(authorize_ok());
        assert_eq!(outs.len(), 1);
        assert!(outs.first().unwrap().get("time").is_some());
    }

    #[tokio::test]
    async fn failed_authorization_rejects_everything() {
        let mut state = ConnectionState::new(8);

        let (cmd, mut rx) = call_cmd(json!({ "ping": 1 }));
        state.apply_command(cmd);

        let raw = r#"{"msg_type":"authorize","error":{"code":"InvalidToken","message":"bad"}}"#;
        state.handle_message(UpstreamMessage::parse(raw).unwrap());
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { ref code, .. } if code == "InvalidToken"));

        // Queue was cleared; a later authorize flushes nothing stale.
        assert!(state.handle_message(authorize_ok()).is_empty());
    }
}
