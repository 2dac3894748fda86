//! Single-flight command dispatcher
//!
//! Commands run strictly in the order they were enqueued, one at a time.
//! The sandbox executes one script at a time and answers through one
//! callback, so replies are matched to commands by position; a second
//! script in flight would make that matching ambiguous.
//!
//! Invariants:
//! - at most one command is current
//! - a script is published only while the current slot is empty
//! - the queue only moves forward after the current command settles

use super::channel::Transport;
use super::command::{Command, CommandId};
use super::error::BridgeError;
use crate::{console_error, console_log};
use std::collections::VecDeque;

/// Counters for queue activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub enqueued: u64,
    pub published: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub publish_failures: u64,
    pub desyncs: u64,
}

/// The command in flight, with the time it was handed over
#[derive(Debug)]
pub struct InFlight {
    pub command: Command,
    pub published_at: f64,
}

pub struct Dispatcher {
    queue: VecDeque<Command>,
    current: Option<InFlight>,
    transport: Box<dyn Transport>,
    next_id: u64,
    timeout_ms: Option<f64>,
    /// Time source, injectable for tests
    now_fn: fn() -> f64,
    debug: bool,
    pub(crate) stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            transport,
            next_id: 1,
            timeout_ms: None,
            now_fn: crate::platform::now_ms,
            debug: false,
            stats: DispatchStats::default(),
        }
    }

    /// Reject the current command if it runs longer than `timeout_ms`
    pub fn with_timeout(mut self, timeout_ms: Option<f64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_now_fn(mut self, now_fn: fn() -> f64) -> Self {
        self.set_now_fn(now_fn);
        self
    }

    pub fn set_now_fn(&mut self, now_fn: fn() -> f64) {
        self.now_fn = now_fn;
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Allocate the id for the next command
    pub fn next_id(&mut self) -> CommandId {
        let id = CommandId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Queue a command; publish it right away if nothing is in flight
    pub fn enqueue(&mut self, command: Command) {
        self.trace(format_args!("add_cmd {}", command.id));
        self.stats.enqueued += 1;
        self.queue.push_back(command);

        if self.current.is_none() {
            self.promote();
        }
    }

    /// Clear the current slot and publish the next command, if any
    ///
    /// Only the correlator and the timeout path call this, after the
    /// current command has been settled.
    pub(crate) fn advance(&mut self) {
        self.current = None;
        self.promote();
    }

    /// Move the head of the queue into the current slot
    fn promote(&mut self) {
        debug_assert!(self.current.is_none());

        while let Some(command) = self.queue.pop_front() {
            self.trace(format_args!("send_next_cmd {}", command.id));

            match self.transport.publish(&command.envelope) {
                Ok(()) => {
                    self.stats.published += 1;
                    self.current = Some(InFlight {
                        command,
                        published_at: (self.now_fn)(),
                    });
                    return;
                }
                Err(e) => {
                    // The sandbox never saw it, so nothing will answer.
                    console_error!("[bridge] cannot publish {}: {}", command.id, e);
                    self.stats.publish_failures += 1;
                    command.settle(Err(e));
                }
            }
        }
    }

    /// Take the in-flight command out of the current slot
    pub(crate) fn take_current(&mut self) -> Option<InFlight> {
        self.current.take()
    }

    /// Reject the current command if its deadline has passed
    ///
    /// Returns the id of the expired command. Its script is withdrawn from
    /// the transport if still unread; a reply that turns up later carries
    /// the old id and is dropped by the correlator.
    pub fn expire(&mut self, now: f64) -> Option<CommandId> {
        let timeout = self.timeout_ms?;
        let started = self.current.as_ref()?.published_at;
        if now - started < timeout {
            return None;
        }

        let inflight = self.take_current()?;
        let id = inflight.command.id;
        console_error!("[bridge] {} timed out after {} ms", id, timeout);
        self.stats.timed_out += 1;
        inflight.command.settle(Err(BridgeError::TimedOut {
            id,
            after_ms: timeout,
        }));
        self.transport.retract(id);
        self.advance();
        Some(id)
    }

    /// Id of the command in flight
    pub fn current_id(&self) -> Option<CommandId> {
        self.current.as_ref().map(|c| c.command.id)
    }

    /// Number of commands waiting behind the current one
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Ids of waiting commands, in execution order
    pub fn pending_ids(&self) -> Vec<CommandId> {
        self.queue.iter().map(|c| c.id).collect()
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub(crate) fn trace(&self, args: std::fmt::Arguments<'_>) {
        if self.debug {
            console_log!("[bridge] {}", args);
        }
    }
}
