//! Command bridge into the sandboxed interpreter
//!
//! Host code calls `exec`, `get` or `set`; each call becomes a command in
//! a FIFO queue. The dispatcher hands one command at a time to the sandbox
//! through the channel, and the correlator settles it when the sandbox
//! reports back.
//!
//! ```text
//!   exec/get/set -> Dispatcher -> Channel -> sandbox
//!   sandbox -> deliver -> Correlator -> future settles, queue advances
//! ```
//!
//! Everything is single-threaded: the bridge is an `Rc` handle and can be
//! cloned freely into event handlers.

pub mod channel;
pub mod command;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod harness;
pub mod wire;

pub use channel::{HostPort, SandboxPort, Transport};
pub use command::{Command, CommandFuture, CommandId};
pub use config::BridgeConfig;
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{BridgeError, BridgeResult, RemoteError};
pub use wire::{Envelope, Outcome, Reply};

use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Global that carries `set` values into the sandbox
const VALUE_BINDING: &str = "__bridge_value";

/// Handle to a command queue
#[derive(Clone)]
pub struct Bridge {
    dispatcher: Rc<RefCell<Dispatcher>>,
    config: Rc<BridgeConfig>,
    /// Reply slot of the in-memory channel, when there is one
    replies: Option<HostPort>,
}

impl Bridge {
    /// Create a bridge publishing through `transport`
    pub fn new(config: BridgeConfig, transport: Box<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new(transport)
            .with_timeout(config.timeout_ms)
            .with_debug(config.debug);
        Self {
            dispatcher: Rc::new(RefCell::new(dispatcher)),
            config: Rc::new(config),
            replies: None,
        }
    }

    /// Create a bridge over an in-memory channel
    ///
    /// The returned port is the sandbox's end: it reads published
    /// envelopes and posts replies, which `pump` then delivers.
    pub fn in_memory(config: BridgeConfig) -> (Self, SandboxPort) {
        let (host, sandbox) = channel::channel();
        let mut bridge = Self::new(config, Box::new(host.clone()));
        bridge.replies = Some(host);
        (bridge, sandbox)
    }

    /// Replace the dispatcher's clock (tests, or hosts with their own time)
    pub fn with_now_fn(self, now_fn: fn() -> f64) -> Self {
        self.dispatcher.borrow_mut().set_now_fn(now_fn);
        self
    }

    /// Build a bridge with new settings to take over from this one
    ///
    /// Both would answer to the same callback, so this is refused while
    /// any command is queued or in flight.
    pub fn reconfigured(
        &self,
        config: BridgeConfig,
        transport: Box<dyn Transport>,
    ) -> BridgeResult<Self> {
        let outstanding = self.outstanding();
        if outstanding > 0 {
            return Err(BridgeError::Busy { outstanding });
        }
        Ok(Self::new(config, transport))
    }

        pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run statements in the sandbox
    ///
    /// Resolves with the value the script leaves in the output variable
    /// (`result` unless configured otherwise), or `null` if it left none.
    /// If the script raises, the future fails with `BridgeError::Remote`.
    pub fn exec(&self, script: &str) -> CommandFuture {
        self.submit(script, None)
    }

    /// Read a variable (any expression, really) from the sandbox
    pub fn get(&self, name: &str) -> CommandFuture {
        self.exec(&format!("{} = {}", self.config.output_var, name))
    }

    /// Assign a JSON value to a variable in the sandbox; resolves with `true`
    ///
    /// The value travels as a binding, never as script text.
    pub fn set(&self, name: &str, value: Value) -> CommandFuture {
        let script = format!(
            "{} = {}\n{} = True",
            name, VALUE_BINDING, self.config.output_var
        );
        self.submit(&script, Some(value))
    }

    /// Assign any serializable value
    ///
    /// Values serde_json cannot represent fail here without touching the
    /// queue.
    pub fn set_value<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> CommandFuture {
        match serde_json::to_value(value) {
            Ok(value) => self.set(name, value),
            Err(e) => CommandFuture::ready(Err(BridgeError::Encode(e.to_string()))),
        }
    }

    /// Assign the result of a raw expression; resolves with `true`
    ///
    /// `expr` is spliced verbatim into the script. Nothing checks it.
    pub fn set_raw(&self, name: &str, expr: &str) -> CommandFuture {
        self.exec(&format!(
            "{} = {}\n{} = True",
            name, expr, self.config.output_var
        ))
    }

    fn submit(&self, script: &str, value: Option<Value>) -> CommandFuture {
        let mut dispatcher = self.dispatcher.borrow_mut();
        let id = dispatcher.next_id();
        let mut envelope = Envelope::new(id, script, &self.config.output_var);
        if let Some(value) = value {
            envelope = envelope.with_binding(VALUE_BINDING, value);
        }
        let (command, future) = Command::new(id, envelope);
        dispatcher.enqueue(command);
        future
    }

    /// Result callback: settle the command in flight
    pub fn deliver(&self, reply: Reply) -> BridgeResult<()> {
        correlator::deliver(&mut self.dispatcher.borrow_mut(), reply)
    }

    /// Result callback taking the sandbox's JSON text
    ///
    /// An unreadable reply still ends the command in flight, with a decode
    /// error, since the sandbox has moved on either way.
    pub fn deliver_json(&self, text: &str) -> BridgeResult<()> {
        match Reply::from_json(text) {
            Ok(reply) => self.deliver(reply),
            Err(e) => {
                crate::console_error!("[bridge] {}", e);
                correlator::reject(&mut self.dispatcher.borrow_mut(), e)
            }
        }
    }

    /// Deliver the reply waiting in the in-memory channel, if any
    pub fn pump(&self) -> Option<BridgeResult<()>> {
        let reply = self.replies.as_ref()?.take_reply()?;
        Some(self.deliver(reply))
    }

    /// Periodic housekeeping: expire the command in flight if overdue
    pub fn tick(&self, now: f64) -> Option<CommandId> {
        self.dispatcher.borrow_mut().expire(now)
    }

    pub fn current_id(&self) -> Option<CommandId> {
        self.dispatcher.borrow().current_id()
    }

    pub fn pending(&self) -> usize {
        self.dispatcher.borrow().pending()
    }

    /// Commands queued or in flight
    pub fn outstanding(&self) -> usize {
        let dispatcher = self.dispatcher.borrow();
        dispatcher.pending() + usize::from(dispatcher.current_id().is_some())
    }

    pub fn is_idle(&self) -> bool {
        self.dispatcher.borrow().is_idle()
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.borrow().stats()
    }
}
