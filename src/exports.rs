//! JS-facing entry points
//!
//! The page sees the same globals the interpreter's web build has always
//! offered: `renpy_exec`, `renpy_get` and `renpy_set` returning promises,
//! and the `_renpy_cmd_callback` the harness calls with each reply. Status
//! and progress hooks for the loader live here too.

#![cfg(target_arch = "wasm32")]

use crate::bridge::{Bridge, BridgeConfig, BridgeError, CommandFuture};
use crate::platform::web::{DomStatusView, WindowTransport, js_string};
use crate::status::{DownloadProgress, StatusLine, StatusReporter};
use crate::{console_error, console_log, platform, saves};
use std::cell::RefCell;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

thread_local! {
    static BRIDGE: RefCell<Option<Bridge>> = const { RefCell::new(None) };
    static STATUS: RefCell<Option<StatusReporter<DomStatusView>>> = const { RefCell::new(None) };
    static DOWNLOAD: RefCell<DownloadProgress> = RefCell::new(DownloadProgress::new());
}

/// Create the global bridge and install its result callback
///
/// Replacing an existing bridge is refused while it has commands
/// outstanding, since their replies would reach the new one.
pub fn install(config: BridgeConfig) -> Result<Bridge, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))?;

    let transport = Box::new(WindowTransport::new(&config.command_var, &config.callback));
    let callback_name = config.callback.clone();
    let bridge = match BRIDGE.with(|b| b.borrow().clone()) {
        Some(current) => current
            .reconfigured(config, transport)
            .map_err(error_to_js)?,
        None => Bridge::new(config, transport),
    };

    let handle = bridge.clone();
    let closure = Closure::wrap(Box::new(move |reply: JsValue| {
        let text = match reply.as_string() {
            Some(text) => text,
            None => match js_sys::JSON::stringify(&reply) {
                Ok(text) => String::from(text),
                Err(e) => {
                    console_error!("[bridge] unreadable reply: {:?}", e);
                    return;
                }
            },
        };
        // desync and stale replies are logged by the correlator
        let _ = handle.deliver_json(&text);
    }) as Box<dyn FnMut(JsValue)>);

    js_sys::Reflect::set(
        &window,
        &JsValue::from_str(&callback_name),
        closure.as_ref().unchecked_ref(),
    )?;
    closure.forget(); // lives for page lifetime

    BRIDGE.with(|b| *b.borrow_mut() = Some(bridge.clone()));
    console_log!("[bridge] installed, callback {}", callback_name);
    Ok(bridge)
}

/// The global bridge, installed with defaults on first use
pub fn bridge() -> Result<Bridge, JsValue> {
    if let Some(bridge) = BRIDGE.with(|b| b.borrow().clone()) {
        return Ok(bridge);
    }
    install(BridgeConfig::default())
}

/// Called every frame by the runtime loop
pub fn tick(now: f64) {
    if let Some(bridge) = BRIDGE.with(|b| b.borrow().clone()) {
        bridge.tick(now);
    }
    with_status(|s| s.tick(now));
}

/// Attach the DOM status box, if the page has one
pub fn attach_status() {
    let view = DomStatusView::from_document();
    if view.is_none() {
        console_log!("[status] no status elements, console only");
    }
    STATUS.with(|s| *s.borrow_mut() = view.map(StatusReporter::new));
}

/// Run `f` on the status reporter; false if the page has none
fn with_status(f: impl FnOnce(&mut StatusReporter<DomStatusView>)) -> bool {
    STATUS.with(|s| match s.borrow_mut().as_mut() {
        Some(reporter) => {
            f(reporter);
            true
        }
        None => false,
    })
}

fn to_promise(future: CommandFuture) -> js_sys::Promise {
    wasm_bindgen_futures::future_to_promise(async move {
        let value = future.await.map_err(error_to_js)?;
        json_to_js(&value)
    })
}

fn rejected(error: BridgeError) -> js_sys::Promise {
    js_sys::Promise::reject(&error_to_js(error))
}

fn json_to_js(value: &serde_json::Value) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}

fn js_to_json(value: &JsValue) -> Result<serde_json::Value, BridgeError> {
    if value.is_undefined() || value.is_function() || value.is_symbol() || value.is_bigint() {
        return Err(BridgeError::Encode(format!("{:?}", value)));
    }
    let text = js_sys::JSON::stringify(value)
        .map_err(|e| BridgeError::Encode(format!("{:?}", e)))?;
    serde_json::from_str(&String::from(text)).map_err(|e| BridgeError::Encode(e.to_string()))
}

/// `Error` with `name` set, plus a `traceback` property for remote errors
fn error_to_js(error: BridgeError) -> JsValue {
    let message = match error.remote() {
        Some(remote) => remote.message.clone(),
        None => error.to_string(),
    };
    let js_error = js_sys::Error::new(&message);
    js_error.set_name(error.name());
    if let Some(remote) = error.remote() {
        let _ = js_sys::Reflect::set(
            &js_error,
            &JsValue::from_str("traceback"),
            &JsValue::from_str(&remote.traceback),
        );
    }
    js_error.into()
}

/// Apply page options (`commandVar`, `callback`, `outputVar`, `timeoutMs`,
/// `debug`) and reinstall the bridge. Fails with `BridgeBusyError` while
/// commands are outstanding.
#[wasm_bindgen(js_name = renbridge_configure)]
pub fn configure(options: JsValue) -> Result<(), JsValue> {
    let text = String::from(js_sys::JSON::stringify(&options)?);
    let config = BridgeConfig::from_json(&text).map_err(error_to_js)?;
    install(config)?;
    Ok(())
}

/// Execute Python statements; resolves with the value of `result`
#[wasm_bindgen(js_name = renpy_exec)]
pub fn renpy_exec(script: String) -> js_sys::Promise {
    match bridge() {
        Ok(bridge) => to_promise(bridge.exec(&script)),
        Err(e) => js_sys::Promise::reject(&e),
    }
}

/// Read a variable, e.g. `build.name`
#[wasm_bindgen(js_name = renpy_get)]
pub fn renpy_get(name: String) -> js_sys::Promise {
    match bridge() {
        Ok(bridge) => to_promise(bridge.get(&name)),
        Err(e) => js_sys::Promise::reject(&e),
    }
}

/// Assign a variable. With `raw`, `value` is a Python expression;
/// otherwise it must be representable as JSON.
#[wasm_bindgen(js_name = renpy_set)]
pub fn renpy_set(name: String, value: JsValue, raw: Option<bool>) -> js_sys::Promise {
    let bridge = match bridge() {
        Ok(bridge) => bridge,
        Err(e) => return js_sys::Promise::reject(&e),
    };

    if raw.unwrap_or(false) {
        return to_promise(bridge.set_raw(&name, &js_string(&value)));
    }

    match js_to_json(&value) {
        Ok(value) => to_promise(bridge.set(&name, value)),
        Err(e) => rejected(e),
    }
}

/// Loader hook (`Module.print`)
#[wasm_bindgen(js_name = renbridge_print)]
pub fn print_message(s: String) {
    let now = platform::now_ms();
    if !with_status(|r| r.print_message(&s, now)) {
        console_log!("{}", s);
    }
}

/// Loader hook for fatal errors
#[wasm_bindgen(js_name = renbridge_report_error)]
pub fn report_error(s: String, cause: Option<String>) {
    let reported = with_status(|r| {
        r.report_error(&s, cause.as_ref().map(|c| c as &dyn std::fmt::Display))
    });
    if !reported {
        match cause {
            Some(cause) => console_error!("{}: {}", s, cause),
            None => console_error!("{}", s),
        }
    }
}

/// Send status messages to the console only (while the game sleeps)
#[wasm_bindgen(js_name = renbridge_console_only)]
pub fn console_only(enabled: bool) {
    with_status(|r| r.set_console_only(enabled));
}

/// Loader hook (`Module.setStatus`)
#[wasm_bindgen(js_name = renbridge_set_status)]
pub fn set_status(s: String) {
    let now = platform::now_ms();
    let (line, events) = DOWNLOAD.with(|d| d.borrow_mut().set_status(&s));
    if let StatusLine::Other(text) = line {
        console_log!("{}", text);
    }
    with_status(|r| events.into_iter().for_each(|e| r.apply(e, now)));
}

/// Game archive size, from the response's Content-Length
#[wasm_bindgen(js_name = renbridge_game_size)]
pub fn game_size(size: f64) {
    let now = platform::now_ms();
    let events = DOWNLOAD.with(|d| d.borrow_mut().set_game_size(size as u64));
    with_status(|r| events.into_iter().for_each(|e| r.apply(e, now)));
}

/// Another chunk of the game archive arrived
#[wasm_bindgen(js_name = renbridge_game_bytes)]
pub fn game_bytes(n: f64) {
    let now = platform::now_ms();
    let events = DOWNLOAD.with(|d| d.borrow_mut().add_game_bytes(n as u64));
    with_status(|r| events.into_iter().for_each(|e| r.apply(e, now)));
}

/// The game drew its first frame
#[wasm_bindgen(js_name = presplashEnd)]
pub fn presplash_end() {
    let now = platform::now_ms();
    with_status(|r| r.dismiss(now));
}

/// Pack saves into `savegames.zip`; resolves with whether one was written
#[wasm_bindgen(js_name = renbridge_export_saves)]
pub fn export_saves() -> js_sys::Promise {
    wasm_bindgen_futures::future_to_promise(async move {
        let bridge = bridge()?;
        let written = saves::export_saves(&bridge).await.map_err(error_to_js)?;
        let now = platform::now_ms();
        if written {
            with_status(|r| r.print_message("Saves exported successfully.", now));
        }
        Ok(JsValue::from_bool(written))
    })
}

/// Unpack `savegames.zip`. `sync` is called between unpacking and the
/// rescan and may return a promise (typically wrapping `FS.syncfs`).
#[wasm_bindgen(js_name = renbridge_import_saves)]
pub fn import_saves(sync: js_sys::Function) -> js_sys::Promise {
    wasm_bindgen_futures::future_to_promise(async move {
        let bridge = bridge()?;
        let flush = || async move {
            let ret = sync
                .call0(&JsValue::NULL)
                .map_err(|e| BridgeError::Transport(format!("{:?}", e)))?;
            if let Ok(promise) = ret.dyn_into::<js_sys::Promise>() {
                wasm_bindgen_futures::JsFuture::from(promise)
                    .await
                    .map_err(|e| BridgeError::Transport(format!("{:?}", e)))?;
            }
            Ok(())
        };

        let now = platform::now_ms();
        match saves::import_saves(&bridge, flush).await {
            Ok(outcome) => {
                with_status(|r| r.print_message(outcome.message(), now));
                Ok(JsValue::TRUE)
            }
            Err(e) => {
                let line = format!("Couldn't import the savegames: {}", e);
                with_status(|r| r.print_message(&line, now));
                Err(error_to_js(e))
            }
        }
    })
}
