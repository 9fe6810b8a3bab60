//! Shared mock Deriv upstream server for integration tests.
//!
//! Speaks just enough of the vendor protocol: `authorize` gating,
//! `req_id` echo, `ping`, tick subscriptions, `forget`, and a couple of
//! synthetic requests (`fail`, `close`) for error-path tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

/// Token the mock accepts; anything else gets an `InvalidToken` error.
pub const GOOD_TOKEN: &str = "good-token";

/// Upstream-visible actions recorded for assertions.
#[derive(Debug, Default)]
pub struct MockLog {
    /// Subscription ids the gateway asked to forget.
    pub forgotten: Mutex<Vec<String>>,
}

impl MockLog {
    /// Snapshot of the forgotten subscription ids.
    pub fn forgotten_ids(&self) -> Vec<String> {
        self.forgotten.lock().unwrap().clone()
    }
}

/// Starts the mock upstream on an OS-assigned port.
pub async fn spawn_mock_deriv() -> anyhow::Result<(SocketAddr, Arc<MockLog>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let log = Arc::new(MockLog::default());

    let accept_log = Arc::clone(&log);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let conn_log = Arc::clone(&accept_log);
            tokio::spawn(async move {
                let _ = handle_conn(stream, conn_log).await;
            });
        }
    });

    Ok((addr, log))
}

async fn handle_conn(stream: TcpStream, log: Arc<MockLog>) -> anyhow::Result<()> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;
    let mut authorized = false;
    let mut next_sub = 0_u32;

    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(txt) = msg else { continue };
        let Ok(req) = serde_json::from_str::<Value>(txt.as_str()) else {
            continue;
        };
        let req_id = req.get("req_id").cloned().unwrap_or(Value::Null);

        if let Some(token) = req.get("authorize").and_then(Value::as_str) {
            let resp = if token == GOOD_TOKEN {
                authorized = true;
                json!({
                    "msg_type": "authorize",
                    "authorize": { "loginid": "CR1" },
                    "req_id": req_id,
                })
            } else {
                json!({
                    "msg_type": "authorize",
                    "error": { "code": "InvalidToken", "message": "token invalid" },
                    "req_id": req_id,
                })
            };
            send(&mut ws, resp).await?;
            continue;
        }

        if !authorized {
            // The real API refuses everything before authorization.
            send(
                &mut ws,
                json!({
                    "msg_type": "error",
                    "error": { "code": "AuthorizationRequired", "message": "authorize first" },
                    "req_id": req_id,
                }),
            )
            .await?;
            continue;
        }

        if req.get("ping").is_some() {
            send(
                &mut ws,
                json!({ "msg_type": "ping", "ping": "pong", "req_id": req_id }),
            )
            .await?;
        } else if let Some(symbol) = req.get("ticks").and_then(Value::as_str) {
            next_sub += 1;
            let sub_id = format!("sub-{next_sub}");
            for quote in [100.1_f64, 100.2] {
                send(
                    &mut ws,
                    json!({
                        "msg_type": "tick",
                        "tick": { "symbol": symbol, "quote": quote },
                        "subscription": { "id": sub_id },
                        "req_id": req_id,
                    }),
                )
                .await?;
            }
        } else if let Some(sub_id) = req.get("forget").and_then(Value::as_str) {
            log.forgotten.lock().unwrap().push(sub_id.to_string());
            send(
                &mut ws,
                json!({ "msg_type": "forget", "forget": 1, "req_id": req_id }),
            )
            .await?;
        } else if req.get("fail").is_some() {
            send(
                &mut ws,
                json!({
                    "msg_type": "fail",
                    "error": { "code": "TestError", "message": "synthetic failure" },
                    "req_id": req_id,
                }),
            )
            .await?;
        } else if req.get("close").is_some() {
            // Drop the connection without answering.
            break;
        } else {
            send(
                &mut ws,
                json!({ "msg_type": "echo", "echo_req": req, "req_id": req_id }),
            )
            .await?;
        }
    }

    Ok(())
}

async fn send(
    ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
    payload: Value,
) -> anyhow::Result<()> {
    ws.send(Message::Text(payload.to_string().into())).await?;
    Ok(())
}
