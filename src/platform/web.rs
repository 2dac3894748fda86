//! Browser platform
//!
//! - `WindowTransport` publishes harness source into the window variable
//!   the interpreter polls
//! - `DomStatusView` drives the page's status box
//! - `js_string` converts page values the way JS `String()` does

use crate::bridge::{BridgeError, BridgeResult, Envelope, Transport, harness};
use crate::status::StatusView;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Publishes scripts by assigning `window[command_var]`
pub struct WindowTransport {
    command_var: String,
    callback: String,
}

impl WindowTransport {
    pub fn new(command_var: &str, callback: &str) -> Self {
        Self {
            command_var: command_var.to_string(),
            callback: callback.to_string(),
        }
    }
}

impl Transport for WindowTransport {
    fn publish(&mut self, envelope: &Envelope) -> BridgeResult<()> {
        let source = harness::render(envelope, &self.callback)?;
        let window =
            web_sys::window().ok_or_else(|| BridgeError::Transport("no window object".into()))?;

        js_sys::Reflect::set(
            &window,
            &JsValue::from_str(&self.command_var),
            &JsValue::from_str(&source),
        )
        .map_err(|e| BridgeError::Transport(format!("cannot set {}: {:?}", self.command_var, e)))?;
        Ok(())
    }
}

/// JS `String(value)`, for splicing page values into raw assignments
pub fn js_string(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    if value.is_null() {
        return "null".to_string();
    }
    if value.is_undefined() {
        return "undefined".to_string();
    }
    String::from(value.unchecked_ref::<js_sys::Object>().to_string())
}

/// Element ids of the status box
const STATUS_DIV: &str = "statusDiv";
const STATUS_TEXT_DIV: &str = "statusTextDiv";
const STATUS_PROGRESS: &str = "statusProgress";

/// The page's status box: a container, a text area and a progress bar
pub struct DomStatusView {
    container: web_sys::HtmlElement,
    text: web_sys::HtmlElement,
    progress: web_sys::HtmlProgressElement,
}

impl DomStatusView {
    /// Find the status elements; `None` if the page does not have them
    pub fn from_document() -> Option<Self> {
        let document = web_sys::window()?.document()?;
        let find = |id: &str| document.get_element_by_id(id);

        Some(Self {
            container: find(STATUS_DIV)?.dyn_into().ok()?,
            text: find(STATUS_TEXT_DIV)?.dyn_into().ok()?,
            progress: find(STATUS_PROGRESS)?.dyn_into().ok()?,
        })
    }

    fn set_progress_display(&self, display: &str) {
        let _ = self.progress.style().set_property("display", display);
    }
}

impl StatusView for DomStatusView {
    fn set_text(&mut self, html: &str) {
        self.text.set_inner_html(html);
    }

    fn show(&mut self) {
        let classes = self.container.class_list();
        let _ = classes.remove_1("hidden");
        let _ = classes.add_1("visible");
        self.text.set_scroll_top(self.text.scroll_height());
        self.set_progress_display("none");
    }

    fn hide(&mut self) {
        let classes = self.container.class_list();
        let _ = classes.remove_1("visible");
        let _ = classes.add_1("hidden");
    }

    fn set_progress(&mut self, done: u64, total: u64) {
        self.progress.set_value(done as f64);
        self.progress.set_max(total as f64);
        self.set_progress_display("block");
    }
}
