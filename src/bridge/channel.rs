//! The single-slot channel between host and sandbox
//!
//! One slot carries a script toward the sandbox, a second slot carries one
//! reply back. Neither slot queues: publishing into an occupied slot is an
//! error, because the dispatcher never has more than one command in
//! flight. The slots are a RefCell behind an Rc; everything runs on one
//! thread.
//!
//! `Transport` is the seam the dispatcher publishes through. The in-memory
//! `HostPort` implements it for native builds and tests; the browser build
//! publishes into a window variable instead (see `platform::web`).

use super::command::CommandId;
use super::error::{BridgeError, BridgeResult};
use super::wire::{Envelope, Reply};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Where the dispatcher hands scripts to the sandbox
pub trait Transport {
    /// Publish one envelope. Must not block.
    fn publish(&mut self, envelope: &Envelope) -> BridgeResult<()>;

    /// Withdraw a published envelope the sandbox has not picked up yet
    ///
    /// Called when a command expires. Transports that overwrite on publish
    /// have nothing to do.
    fn retract(&mut self, _id: CommandId) {}
}

/// Create a connected host/sandbox pair
pub fn channel() -> (HostPort, SandboxPort) {
    let inner = Rc::new(RefCell::new(Slots::default()));
    (
        HostPort {
            inner: inner.clone(),
        },
        SandboxPort { inner },
    )
}

#[derive(Default)]
struct Slots {
    script: Option<Envelope>,
    reply: Option<Reply>,
    /// Woken when a script lands in the slot
    script_waker: Option<Waker>,
    published: u64,
}

/// Host half: writes scripts, reads replies
#[derive(Clone)]
pub struct HostPort {
    inner: Rc<RefCell<Slots>>,
}

impl HostPort {
    /// Take the pending reply, if the sandbox posted one
    pub fn take_reply(&self) -> Option<Reply> {
        self.inner.borrow_mut().reply.take()
    }

    /// Total number of scripts published through this channel
    pub fn published(&self) -> u64 {
        self.inner.borrow().published
    }
}

impl Transport for HostPort {
    fn publish(&mut self, envelope: &Envelope) -> BridgeResult<()> {
        let waker = {
            let mut slots = self.inner.borrow_mut();
            if slots.script.is_some() {
                return Err(BridgeError::ChannelOccupied);
            }
            slots.script = Some(envelope.clone());
            slots.published += 1;
            slots.script_waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    fn retract(&mut self, id: CommandId) {
        let mut slots = self.inner.borrow_mut();
        if slots.script.as_ref().is_some_and(|e| e.id == id) {
            slots.script = None;
        }
    }
}

/// Sandbox half: reads scripts, writes replies
pub struct SandboxPort {
    inner: Rc<RefCell<Slots>>,
}

impl SandboxPort {
    /// Take the pending script without waiting
    pub fn take_script(&self) -> Option<Envelope> {
        self.inner.borrow_mut().script.take()
    }

    /// Whether a script is waiting to be read
    pub fn has_script(&self) -> bool {
        self.inner.borrow().script.is_some()
    }

    /// Wait for the next script
    pub fn recv_script(&self) -> RecvScript<'_> {
        RecvScript { port: self }
    }

    /// Post a reply for the host to pick up
    pub fn post_reply(&self, reply: Reply) -> BridgeResult<()> {
        let mut slots = self.inner.borrow_mut();
        if slots.reply.is_some() {
            return Err(BridgeError::ChannelOccupied);
        }
        slots.reply = Some(reply);
        Ok(())
    }
}

/// Future for `SandboxPort::recv_script`
pub struct RecvScript<'a> {
    port: &'a SandboxPort,
}

impl Future for RecvScript<'_> {
    type Output = Envelope;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slots = self.port.inner.borrow_mut();
        match slots.script.take() {
            Some(envelope) => Poll::Ready(envelope),
            None => {
                slots.script_waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
