//! Per-session handle to the upstream connection task.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use super::connection::{self, Command, UpstreamConfig};
use crate::error::GatewayError;

/// Depth of the command channel between handles and the connection task.
const COMMAND_BUFFER: usize = 64;

/// Client bound to one user session.
///
/// Cheap cloneable handle over the connection task spawned at login. All
/// methods go through the task's command channel; the task owns the
/// socket, the authorization state, and the correlation maps.
#[derive(Debug)]
pub struct DerivClient {
    cmd_tx: mpsc::Sender<Command>,
    call_timeout: Duration,
}

impl DerivClient {
    /// Spawns the connection task for a session.
    ///
    /// The upstream socket is dialed lazily on the first call or
    /// subscribe, not here, so construction never blocks on the network.
    #[must_use]
    pub fn spawn(config: UpstreamConfig, call_timeout: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(connection::run(config, cmd_rx));
        Self {
            cmd_tx,
            call_timeout,
        }
    }

    /// Sends a request and waits for the correlated response.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] if the payload is not a JSON object.
    /// - [`GatewayError::Upstream`] when the vendor answers with an error.
    /// - [`GatewayError::UpstreamClosed`] if the socket dies mid-call.
    /// - [`GatewayError::CallTimeout`] when no response arrives in time.
    pub async fn call(&self, payload: Value) -> Result<Value, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Call { payload, reply })
            .await
            .map_err(|_| GatewayError::UpstreamClosed)?;

        match tokio::time::timeout(self.call_timeout, rx).await {
            Err(_) => Err(GatewayError::CallTimeout),
            Ok(Err(_)) => Err(GatewayError::UpstreamClosed),
            Ok(Ok(result)) => result,
        }
    }

    /// Starts a subscription and returns the stream of matching messages.
    ///
    /// Dropping the returned [`TickStream`] issues an upstream `forget`
    /// for the subscription.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] if the payload is not a JSON object.
    /// - [`GatewayError::UpstreamClosed`] if the connection task is gone.
    pub async fn subscribe(&self, payload: Value) -> Result<TickStream, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe { payload, reply })
            .await
            .map_err(|_| GatewayError::UpstreamClosed)?;

        let subscription = rx.await.map_err(|_| GatewayError::UpstreamClosed)??;
        Ok(TickStream {
            req_id: subscription.req_id,
            inner: ReceiverStream::new(subscription.receiver),
            cmd_tx: self.cmd_tx.clone(),
        })
    }

    /// Closes the upstream socket and ends the connection task.
    ///
    /// Fire-and-forget: pending calls fail with
    /// [`GatewayError::UpstreamClosed`].
    pub fn close(&self) {
        let _ = self.cmd_tx.try_send(Command::Close);
    }
}

/// Stream of messages for one upstream subscription.
///
/// Yields each upstream message verbatim as JSON. Ends when the
/// subscription is refused upstream or the socket closes. On drop the
/// subscription is forgotten upstream.
#[derive(Debug)]
pub struct TickStream {
    req_id: u64,
    inner: ReceiverStream<Value>,
    cmd_tx: mpsc::Sender<Command>,
}

impl Stream for TickStream {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for TickStream {
    fn drop(&mut self) {
        // Best effort: if the channel is full or closed the connection
        // task is gone anyway and the subscription dies with it.
        let _ = self.cmd_tx.try_send(Command::Forget {
            req_id: self.req_id,
        });
    }
}
