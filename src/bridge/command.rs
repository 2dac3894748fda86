//! Commands and their completion futures
//!
//! A Command pairs the request handed to the sandbox with the sending half
//! of a oneshot channel. The caller holds the receiving half as a
//! `CommandFuture`; settling the command is a single send, so nothing the
//! caller does can run in the middle of dispatcher bookkeeping.

use super::error::{BridgeError, BridgeResult};
use super::wire::Envelope;
use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Monotonic identifier for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub u64);

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Command({})", self.0)
    }
}

/// A queued or in-flight request
#[derive(Debug)]
pub struct Command {
    pub id: CommandId,
    pub envelope: Envelope,
    reply: oneshot::Sender<BridgeResult<Value>>,
}

impl Command {
    /// Create a command and the future that observes its outcome
    pub fn new(id: CommandId, envelope: Envelope) -> (Self, CommandFuture) {
        let (tx, rx) = oneshot::channel();
        let command = Self {
            id,
            envelope,
            reply: tx,
        };
        (command, CommandFuture::pending(rx))
    }

    /// Settle the command. Consumes it, so a command settles exactly once.
    ///
    /// Returns false if the caller already dropped its future.
    pub fn settle(self, outcome: BridgeResult<Value>) -> bool {
        self.reply.send(outcome).is_ok()
    }

    /// Whether anyone is still waiting on this command
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_canceled()
    }
}

enum Inner {
    Pending(oneshot::Receiver<BridgeResult<Value>>),
    Ready(Option<BridgeResult<Value>>),
}

/// Future returned by the bridge entry points
///
/// The command is already queued when this is created; polling only
/// observes the result.
pub struct CommandFuture {
    inner: Inner,
}

impl CommandFuture {
    fn pending(rx: oneshot::Receiver<BridgeResult<Value>>) -> Self {
        Self {
            inner: Inner::Pending(rx),
        }
    }

    /// A future that is already settled (used for pre-flight failures)
    pub fn ready(outcome: BridgeResult<Value>) -> Self {
        Self {
            inner: Inner::Ready(Some(outcome)),
        }
    }
}

impl Future for CommandFuture {
    type Output = BridgeResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            Inner::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(BridgeError::Dropped)),
                Poll::Pending => Poll::Pending,
            },
            Inner::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(Err(BridgeError::Dropped)))
            }
        }
    }
}
