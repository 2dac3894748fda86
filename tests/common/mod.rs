//! A scripted stand-in for the interpreter
//!
//! Understands just enough Python for the tests: assignments, integer and
//! string literals, `True`/`False`/`None`, one binary operator, `raise`,
//! and zero-argument calls registered up front. Dotted names are flat keys.
//! Scripts travel the same way they do in the browser: rendered into the
//! harness, then pulled back out.

#![allow(dead_code)]

use renbridge::Bridge;
use renbridge::bridge::{Envelope, Reply, SandboxPort, harness};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::task::{Context, Poll};

type Raised = (String, String);

pub struct MockSandbox {
    pub globals: HashMap<String, Value>,
    calls: HashMap<String, Result<Value, Raised>>,
    /// Ids of every command run, in order
    pub served: Vec<u64>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self {
            globals: HashMap::new(),
            calls: HashMap::new(),
            served: Vec::new(),
        }
    }

    /// Make `name()` return `value`
    pub fn on_call(&mut self, name: &str, value: Value) {
        self.calls.insert(name.to_string(), Ok(value));
    }

    /// Make `name()` raise
    pub fn on_call_raise(&mut self, name: &str, kind: &str, message: &str) {
        self.calls
            .insert(name.to_string(), Err((kind.to_string(), message.to_string())));
    }

    /// Run one request and build its reply
    pub fn run(&mut self, envelope: &Envelope) -> Reply {
        let source = harness::render(envelope, "_renpy_cmd_callback").unwrap();
        let envelope = harness::extract(&source).unwrap();
        let script = envelope.script().unwrap();
        self.served.push(envelope.id.0);

        for (name, value) in &envelope.bindings {
            self.globals.insert(name.clone(), value.clone());
        }
        self.globals.insert(envelope.output.clone(), Value::Null);

        let statements = script.split(['\n', ';']).map(str::trim);
        for (line, statement) in statements.enumerate() {
            if let Err((kind, message)) = self.statement(statement) {
                let traceback = format!(
                    "Traceback (most recent call last):\n  File \"<string>\", line {}, in <module>\n{}: {}\n",
                    line + 1,
                    kind,
                    message
                );
                return Reply::failure(Some(envelope.id), &kind, &message, &traceback);
            }
        }

        let data = self
            .globals
            .get(&envelope.output)
            .cloned()
            .unwrap_or(Value::Null);
        Reply::success(Some(envelope.id), data)
    }

    fn statement(&mut self, statement: &str) -> Result<(), Raised> {
        if statement.is_empty() || statement == "pass" {
            return Ok(());
        }
        if let Some(rest) = statement.strip_prefix("raise ") {
            let (kind, arg) = rest.split_once('(').unwrap_or((rest, ")"));
            let message = self.eval(arg.trim_end_matches(')'))?;
            let message = message.as_str().map(str::to_string).unwrap_or_default();
            return Err((kind.trim().to_string(), message));
        }
        match statement.split_once(" = ") {
            Some((target, expr)) => {
                let value = self.eval(expr)?;
                self.globals.insert(target.trim().to_string(), value);
            }
            None => {
                self.eval(statement)?;
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &str) -> Result<Value, Raised> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Value::Null);
        }
        if let Some(literal) = quoted(expr) {
            return Ok(json!(literal));
        }
        for op in ['+', '-', '*', '/'] {
            if let Some(at) = expr[1..].find(op).map(|i| i + 1) {
                let lhs = self.eval(&expr[..at])?;
                let rhs = self.eval(&expr[at + 1..])?;
                return arith(op, &lhs, &rhs);
            }
        }
        match expr {
            "True" => return Ok(json!(true)),
            "False" => return Ok(json!(false)),
            "None" => return Ok(Value::Null),
            _ => {}
        }
        if let Ok(n) = expr.parse::<i64>() {
            return Ok(json!(n));
        }
        if let Some(name) = expr.strip_suffix("()") {
            return match self.calls.get(name) {
                Some(outcome) => outcome.clone(),
                None => Err(undefined(name)),
            };
        }
        self.globals.get(expr).cloned().ok_or_else(|| undefined(expr))
    }
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new()
    }
}

fn quoted(expr: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|q| {
        expr.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}

fn undefined(name: &str) -> Raised {
    (
        "NameError".to_string(),
        format!("name '{}' is not defined", name),
    )
}

fn arith(op: char, lhs: &Value, rhs: &Value) -> Result<Value, Raised> {
    let type_error = || {
        (
            "TypeError".to_string(),
            format!("unsupported operand type(s) for {}", op),
        )
    };
    let (a, b) = match (lhs.as_i64(), rhs.as_i64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(type_error()),
    };
    match op {
        '+' => Ok(json!(a + b)),
        '-' => Ok(json!(a - b)),
        '*' => Ok(json!(a * b)),
        '/' if b == 0 => Err((
            "ZeroDivisionError".to_string(),
            "division by zero".to_string(),
        )),
        '/' => Ok(json!(a as f64 / b as f64)),
        _ => Err(type_error()),
    }
}

/// Run the published command, if any, and hand its reply back
///
/// Returns false when nothing was waiting.
pub fn serve_one(bridge: &Bridge, port: &SandboxPort, sandbox: &mut MockSandbox) -> bool {
    let Some(envelope) = port.take_script() else {
        return false;
    };
    // single flight: nothing else may be published until this one settles
    assert!(!port.has_script());
    let reply = sandbox.run(&envelope);
    port.post_reply(reply).unwrap();
    bridge.pump().unwrap().unwrap();
    true
}

/// Serve commands until the queue is empty; returns how many ran
pub fn drain(bridge: &Bridge, port: &SandboxPort, sandbox: &mut MockSandbox) -> usize {
    let mut count = 0;
    while serve_one(bridge, port, sandbox) {
        count += 1;
    }
    assert!(bridge.is_idle());
    count
}

/// Drive `fut` to completion, serving commands whenever it waits on one
pub fn run<F: Future>(
    bridge: &Bridge,
    port: &SandboxPort,
    sandbox: &mut MockSandbox,
    fut: F,
) -> F::Output {
    let mut fut = pin!(fut);
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    loop {
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return out;
        }
        assert!(
            serve_one(bridge, port, sandbox),
            "future is waiting but nothing was published"
        );
    }
}
