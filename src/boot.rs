//! Page startup
//!
//! Runs once when the module loads: read the page's bridge options, install
//! the result callback, find the status box, start the frame loop. The
//! interpreter itself is started by its own loader script.

use crate::bridge::BridgeConfig;
use crate::{console_error, exports, runtime};
use wasm_bindgen::prelude::*;

/// Window property the page may set before loading us
const CONFIG_VAR: &str = "renbridgeConfig";

pub fn boot() {
    let config = match read_config() {
        Ok(config) => config,
        Err(e) => {
            console_error!("[boot] ignoring {}: {}", CONFIG_VAR, e);
            BridgeConfig::default()
        }
    };

    if let Err(e) = exports::install(config) {
        console_error!("[boot] cannot install bridge: {:?}", e);
        return;
    }

    exports::attach_status();

    // Drives command timeouts and the status box timers
    runtime::start();
}

fn read_config() -> Result<BridgeConfig, String> {
    let window = web_sys::window().ok_or_else(|| "No window object".to_string())?;
    let options = js_sys::Reflect::get(&window, &JsValue::from_str(CONFIG_VAR))
        .map_err(|e| format!("{:?}", e))?;
    if options.is_undefined() || options.is_null() {
        return Ok(BridgeConfig::default());
    }

    let text = js_sys::JSON::stringify(&options).map_err(|e| format!("{:?}", e))?;
    BridgeConfig::from_json(&String::from(text)).map_err(|e| e.to_string())
}
