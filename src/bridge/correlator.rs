//! Result correlation
//!
//! The sandbox reports every finished script through one entry point.
//! Replies are matched to the command in flight: there is only ever one.

use super::dispatcher::Dispatcher;
use super::error::{BridgeError, BridgeResult};
use super::wire::Reply;
use crate::console_error;
use serde_json::Value;

/// Advances the dispatcher when dropped, so the queue moves on even if
/// settling the command unwinds.
struct AdvanceOnDrop<'a>(&'a mut Dispatcher);

impl Drop for AdvanceOnDrop<'_> {
    fn drop(&mut self) {
        self.0.advance();
    }
}

/// Settle the in-flight command with `reply` and advance the queue
///
/// A reply with nothing in flight is a protocol desync: it is logged and
/// reported, and the queue is left exactly as it was. A reply tagged with
/// some other command's id (one that already timed out) is dropped the
/// same way.
pub fn deliver(dispatcher: &mut Dispatcher, reply: Reply) -> BridgeResult<()> {
    let Some(current) = dispatcher.current_id() else {
        console_error!("[bridge] Unexpected command result: {:?}", reply);
        dispatcher.stats.desyncs += 1;
        return Err(BridgeError::Desync);
    };

    if let Some(id) = reply.id
        && id != current
    {
        console_error!("[bridge] Dropping reply for {} while {} is in flight", id, current);
        dispatcher.stats.desyncs += 1;
        return Err(BridgeError::StaleReply {
            expected: current,
            got: id,
        });
    }

    complete(dispatcher, reply.into_result())
}

/// Fail the in-flight command with a host-side error and advance
///
/// Used when the sandbox did answer but the answer was unreadable.
pub fn reject(dispatcher: &mut Dispatcher, error: BridgeError) -> BridgeResult<()> {
    if dispatcher.current_id().is_none() {
        console_error!("[bridge] Unexpected command failure: {}", error);
        dispatcher.stats.desyncs += 1;
        return Err(BridgeError::Desync);
    }
    complete(dispatcher, Err(error))
}

fn complete(dispatcher: &mut Dispatcher, outcome: BridgeResult<Value>) -> BridgeResult<()> {
    let Some(inflight) = dispatcher.take_current() else {
        return Err(BridgeError::Desync);
    };
    let guard = AdvanceOnDrop(dispatcher);

    let id = inflight.command.id;
    match &outcome {
        Ok(data) => guard.0.trace(format_args!("SUCCESS {} {}", id, data)),
        Err(e) => {
            let traceback = e.remote().map(|r| r.traceback.as_str()).unwrap_or("");
            guard.0.trace(format_args!("ERROR {} {} {}", id, e, traceback));
        }
    }

    guard.0.stats.completed += 1;
    if !inflight.command.settle(outcome) {
        guard.0.trace(format_args!("{} finished with nobody waiting", id));
    }

    drop(guard);
    Ok(())
}
