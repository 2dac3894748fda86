//! Integration tests for the command bridge
//!
//! Each test wires a bridge to an in-memory channel and answers its
//! commands with a scripted sandbox (see `common`).

mod common;

use common::{MockSandbox, drain, run, serve_one};
use futures::FutureExt;
use renbridge::bridge::{CommandId, Reply};
use renbridge::saves::{self, ImportOutcome};
use renbridge::{Bridge, BridgeConfig, BridgeError};
use serde_json::{Value, json};

fn setup() -> (Bridge, renbridge::bridge::SandboxPort, MockSandbox) {
    let (bridge, port) = Bridge::in_memory(BridgeConfig::default());
    (bridge, port, MockSandbox::new())
}

// ============================================================================
// Basic commands
// ============================================================================

#[test]
fn test_exec_returns_result() {
    let (bridge, port, mut sandbox) = setup();
    let fut = bridge.exec("result = 1+1");
    drain(&bridge, &port, &mut sandbox);
    assert_eq!(fut.now_or_never(), Some(Ok(json!(2))));
}

#[test]
fn test_exec_without_result_is_null() {
    let (bridge, port, mut sandbox) = setup();
    let fut = bridge.exec("x = 3");
    drain(&bridge, &port, &mut sandbox);
    assert_eq!(fut.now_or_never(), Some(Ok(Value::Null)));
    assert_eq!(sandbox.globals["x"], json!(3));
}

#[test]
fn test_zero_division_is_remote_error() {
    let (bridge, port, mut sandbox) = setup();
    let fut = bridge.exec("result = 1/0");
    drain(&bridge, &port, &mut sandbox);

    let err = fut.now_or_never().unwrap().unwrap_err();
    let remote = err.remote().expect("remote error");
    assert_eq!(remote.name, "ZeroDivisionError");
    assert_eq!(remote.message, "division by zero");
    assert!(!remote.traceback.is_empty());
    assert!(remote.traceback.contains("ZeroDivisionError"));
    assert_eq!(err.name(), "ZeroDivisionError");
}

#[test]
fn test_value_error_propagates() {
    let (bridge, port, mut sandbox) = setup();
    let fut = bridge.exec("raise ValueError(\"bad\")");
    drain(&bridge, &port, &mut sandbox);

    let err = fut.now_or_never().unwrap().unwrap_err();
    let remote = err.remote().unwrap();
    assert_eq!(remote.name, "ValueError");
    assert_eq!(remote.message, "bad");
    assert_eq!(err.to_string(), "ValueError: bad");
}

#[test]
fn test_undefined_name_is_name_error() {
    let (bridge, port, mut sandbox) = setup();
    let fut = bridge.get("nope");
    drain(&bridge, &port, &mut sandbox);

    let err = fut.now_or_never().unwrap().unwrap_err();
    assert_eq!(err.name(), "NameError");
}

// ============================================================================
// set / get
// ============================================================================

#[test]
fn test_set_then_get_dotted_name() {
    let (bridge, port, mut sandbox) = setup();
    let set = bridge.set("x.y", json!(5));
    let get = bridge.get("x.y");
    drain(&bridge, &port, &mut sandbox);

    assert_eq!(set.now_or_never(), Some(Ok(json!(true))));
    assert_eq!(get.now_or_never(), Some(Ok(json!(5))));
}

#[test]
fn test_set_get_round_trip_json_values() {
    let (bridge, port, mut sandbox) = setup();
    let values = [
        json!("it's \"quoted\"\nand multiline"),
        json!(null),
        json!(-3),
        json!(2.5),
        json!([1, "two", [3]]),
        json!({"name": "Monika", "affection": 100, "flags": {"poem": true}}),
    ];

    for value in &values {
        let set = bridge.set("persistent.value", value.clone());
        let get = bridge.get("persistent.value");
        drain(&bridge, &port, &mut sandbox);
        assert_eq!(set.now_or_never(), Some(Ok(json!(true))));
        assert_eq!(get.now_or_never(), Some(Ok(value.clone())));
    }
}

#[test]
fn test_set_value_serializes() {
    #[derive(serde::Serialize)]
    struct Player {
        name: &'static str,
        level: u32,
    }

    let (bridge, port, mut sandbox) = setup();
    let set = bridge.set_value("player", &Player { name: "Sayori", level: 2 });
    let get = bridge.get("player");
    drain(&bridge, &port, &mut sandbox);

    assert_eq!(set.now_or_never(), Some(Ok(json!(true))));
    assert_eq!(
        get.now_or_never(),
        Some(Ok(json!({"name": "Sayori", "level": 2})))
    );
}

#[test]
fn test_set_raw_evaluates_expression() {
    let (bridge, port, mut sandbox) = setup();
    let set = bridge.set_raw("x", "2+3");
    let get = bridge.get("x");
    drain(&bridge, &port, &mut sandbox);

    assert_eq!(set.now_or_never(), Some(Ok(json!(true))));
    assert_eq!(get.now_or_never(), Some(Ok(json!(5))));
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_commands_run_in_order_one_at_a_time() {
    let (bridge, port, mut sandbox) = setup();
    let a = bridge.exec("result = 'A'");
    let b = bridge.exec("result = 'B'");
    let c = bridge.exec("result = 'C'");

    // only A is out; B and C wait
    assert_eq!(bridge.current_id(), Some(CommandId(1)));
    assert_eq!(bridge.pending(), 2);

    assert!(serve_one(&bridge, &port, &mut sandbox));
    assert_eq!(bridge.current_id(), Some(CommandId(2)));
    assert_eq!(bridge.pending(), 1);

    assert!(serve_one(&bridge, &port, &mut sandbox));
    assert!(serve_one(&bridge, &port, &mut sandbox));
    assert!(!serve_one(&bridge, &port, &mut sandbox));
    assert!(bridge.is_idle());

    assert_eq!(sandbox.served, vec![1, 2, 3]);
    assert_eq!(a.now_or_never(), Some(Ok(json!("A"))));
    assert_eq!(b.now_or_never(), Some(Ok(json!("B"))));
    assert_eq!(c.now_or_never(), Some(Ok(json!("C"))));
}

#[test]
fn test_many_execs_fifo() {
    let (bridge, port, mut sandbox) = setup();
    let futures: Vec<_> = (0..50)
        .map(|i| bridge.exec(&format!("result = {}", i)))
        .collect();

    assert_eq!(drain(&bridge, &port, &mut sandbox), 50);
    assert_eq!(sandbox.served, (1..=50).collect::<Vec<u64>>());
    for (i, fut) in futures.into_iter().enumerate() {
        assert_eq!(fut.now_or_never(), Some(Ok(json!(i))));
    }

    let stats = bridge.stats();
    assert_eq!(stats.enqueued, 50);
    assert_eq!(stats.published, 50);
    assert_eq!(stats.completed, 50);
}

#[test]
fn test_failure_does_not_stall_queue() {
    let (bridge, port, mut sandbox) = setup();
    let bad = bridge.exec("result = 1/0");
    let good = bridge.exec("result = 7");
    drain(&bridge, &port, &mut sandbox);

    assert!(matches!(bad.now_or_never(), Some(Err(BridgeError::Remote(_)))));
    assert_eq!(good.now_or_never(), Some(Ok(json!(7))));
}

#[test]
fn test_command_enqueued_from_completion_runs_next() {
    let (bridge, port, mut sandbox) = setup();
    let first = bridge.exec("result = 1");
    serve_one(&bridge, &port, &mut sandbox);
    assert!(bridge.is_idle());

    // enqueueing on an idle bridge publishes immediately
    let second = bridge.exec("result = 2");
    assert_eq!(bridge.current_id(), Some(CommandId(2)));
    drain(&bridge, &port, &mut sandbox);

    assert_eq!(first.now_or_never(), Some(Ok(json!(1))));
    assert_eq!(second.now_or_never(), Some(Ok(json!(2))));
}

// ============================================================================
// Stray results
// ============================================================================

#[test]
fn test_deliver_with_nothing_in_flight_is_harmless() {
    let (bridge, port, mut sandbox) = setup();
    assert_eq!(
        bridge.deliver(Reply::success(None, json!(1))),
        Err(BridgeError::Desync)
    );
    assert_eq!(bridge.stats().desyncs, 1);

    let fut = bridge.exec("result = 1+1");
    drain(&bridge, &port, &mut sandbox);
    assert_eq!(fut.now_or_never(), Some(Ok(json!(2))));
}

#[test]
fn test_late_reply_after_timeout_is_dropped() {
    let config = BridgeConfig::from_json(r#"{"timeoutMs": 100}"#).unwrap();
    let (bridge, port) = Bridge::in_memory(config);
    let bridge = bridge.with_now_fn(|| 0.0);
    let mut sandbox = MockSandbox::new();

    let slow = bridge.exec("result = 1");
    let next = bridge.exec("result = 2");
    let stuck = port.take_script().unwrap();

    assert_eq!(bridge.tick(100.0), Some(CommandId(1)));
    assert!(matches!(
        slow.now_or_never(),
        Some(Err(BridgeError::TimedOut { .. }))
    ));

    // the first command's reply turns up while the second is in flight
    let late = sandbox.run(&stuck);
    assert!(matches!(
        bridge.deliver(late),
        Err(BridgeError::StaleReply { .. })
    ));
    assert_eq!(bridge.current_id(), Some(CommandId(2)));

    drain(&bridge, &port, &mut sandbox);
    assert_eq!(next.now_or_never(), Some(Ok(json!(2))));
}

#[test]
fn test_timeout_before_script_is_read_keeps_queue() {
    let config = BridgeConfig::from_json(r#"{"timeoutMs": 100}"#).unwrap();
    let (bridge, port) = Bridge::in_memory(config);
    let bridge = bridge.with_now_fn(|| 0.0);
    let mut sandbox = MockSandbox::new();

    let a = bridge.exec("result = 'a'");
    let b = bridge.exec("result = 'b'");
    let c = bridge.exec("result = 'c'");

    // the sandbox is stuck and never picks up `a`
    assert_eq!(bridge.tick(100.0), Some(CommandId(1)));
    assert!(matches!(
        a.now_or_never(),
        Some(Err(BridgeError::TimedOut { .. }))
    ));
    assert_eq!(bridge.current_id(), Some(CommandId(2)));
    assert_eq!(bridge.pending(), 1);

    assert_eq!(drain(&bridge, &port, &mut sandbox), 2);
    assert_eq!(sandbox.served, vec![2, 3]);
    assert_eq!(b.now_or_never(), Some(Ok(json!("b"))));
    assert_eq!(c.now_or_never(), Some(Ok(json!("c"))));
    assert_eq!(bridge.stats().publish_failures, 0);
}

#[test]
fn test_reconfigure_refused_while_busy() {
    let (bridge, port, mut sandbox) = setup();
    let first = bridge.exec("result = 1");
    let second = bridge.exec("result = 2");

    let (spare, _spare_port) = renbridge::bridge::channel::channel();
    let refused = bridge.reconfigured(BridgeConfig::default(), Box::new(spare.clone()));
    assert!(matches!(
        refused,
        Err(BridgeError::Busy { outstanding: 2 })
    ));

    // the old bridge is untouched and still answers its callers
    drain(&bridge, &port, &mut sandbox);
    assert_eq!(first.now_or_never(), Some(Ok(json!(1))));
    assert_eq!(second.now_or_never(), Some(Ok(json!(2))));

    let config = BridgeConfig::from_json(r#"{"outputVar": "out"}"#).unwrap();
    let replaced = bridge.reconfigured(config, Box::new(spare)).unwrap();
    assert_eq!(replaced.config().output_var, "out");
    assert!(replaced.is_idle());
}

#[test]
fn test_reply_json_from_sandbox() {
    let (bridge, port, _sandbox) = setup();
    let fut = bridge.exec("result = renpy.version()");
    port.take_script().unwrap();

    bridge
        .deliver_json(r#"{"data": "Ren'Py 6.99.12"}"#)
        .unwrap();
    assert_eq!(fut.now_or_never(), Some(Ok(json!("Ren'Py 6.99.12"))));
}

#[test]
fn test_custom_output_var() {
    let config = BridgeConfig::from_json(r#"{"outputVar": "out"}"#).unwrap();
    let (bridge, port) = Bridge::in_memory(config);
    let mut sandbox = MockSandbox::new();

    let fut = bridge.get("2*21");
    drain(&bridge, &port, &mut sandbox);
    assert_eq!(fut.now_or_never(), Some(Ok(json!(42))));
    assert!(sandbox.globals.contains_key("out"));
}

// ============================================================================
// Saves
// ============================================================================

#[test]
fn test_export_saves() {
    let (bridge, port, mut sandbox) = setup();
    sandbox.on_call("renpy.savelocation.zip_saves", json!(true));

    let written = run(&bridge, &port, &mut sandbox, saves::export_saves(&bridge));
    assert_eq!(written, Ok(true));
}

#[test]
fn test_export_without_saves() {
    let (bridge, port, mut sandbox) = setup();
    sandbox.on_call("renpy.savelocation.zip_saves", json!(false));

    let written = run(&bridge, &port, &mut sandbox, saves::export_saves(&bridge));
    assert_eq!(written, Ok(false));
}

#[test]
fn test_import_saves() {
    let (bridge, port, mut sandbox) = setup();
    sandbox.on_call("renpy.savelocation.unzip_saves", json!(true));
    sandbox.on_call("renpy.loadsave.location.scan", Value::Null);

    let mut synced = false;
    let import = saves::import_saves(&bridge, || {
        synced = true;
        async { Ok(()) }
    });
    let outcome = run(&bridge, &port, &mut sandbox, import);

    assert_eq!(outcome, Ok(ImportOutcome::Imported));
    assert!(synced);
    assert_eq!(sandbox.served.len(), 2);
}

#[test]
fn test_import_saves_rescan_failure_is_soft() {
    let (bridge, port, mut sandbox) = setup();
    sandbox.on_call("renpy.savelocation.unzip_saves", json!(true));
    sandbox.on_call_raise("renpy.loadsave.location.scan", "OSError", "busy");

    let import = saves::import_saves(&bridge, || async { Ok(()) });
    let outcome = run(&bridge, &port, &mut sandbox, import).unwrap();

    assert!(matches!(outcome, ImportOutcome::RestartRequired(_)));
    assert_eq!(outcome.message(), "Saves imported - restart game to apply.");
}

#[test]
fn test_import_saves_unzip_failure() {
    let (bridge, port, mut sandbox) = setup();
    sandbox.on_call_raise("renpy.savelocation.unzip_saves", "IOError", "no archive");

    let import = saves::import_saves(&bridge, || async { Ok(()) });
    let err = run(&bridge, &port, &mut sandbox, import).unwrap_err();
    assert_eq!(err.name(), "IOError");
    // nothing after the failed unzip was sent
    assert_eq!(sandbox.served.len(), 1);
}
