//! renbridge - host-page glue for an interpreter running in WASM
//!
//! The interpreter (a Python runtime compiled with Emscripten) runs its
//! own loop inside the page. This crate is the page's side of the
//! conversation:
//!
//! - `bridge`: a single-flight command queue for running Python from JS
//!   and getting results or exceptions back as promises
//! - `status`: the loader's status box and download progress
//! - `saves`: save-game import/export on top of the bridge
//!
//! Platform support:
//! - Browser (wasm32-unknown-unknown): window globals, DOM status box
//! - Native: everything but the browser glue, for tests and tooling

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod bridge;
pub mod platform;
pub mod saves;
pub mod status;

#[cfg(target_arch = "wasm32")]
pub mod exports;

#[cfg(target_arch = "wasm32")]
mod boot;

#[cfg(target_arch = "wasm32")]
mod runtime;

pub use bridge::{Bridge, BridgeConfig, BridgeError, BridgeResult};

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Install the bridge. This is the WASM entry point.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    init_panic_hook();
    boot::boot();
}

/// Console logging helper
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

#[doc(hidden)]
#[cfg(target_arch = "wasm32")]
pub fn __log(s: &str) {
    log(s);
}

#[doc(hidden)]
#[cfg(target_arch = "wasm32")]
pub fn __error(s: &str) {
    web_sys::console::error_1(&s.into());
}

/// Log to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::__log(&format!($($t)*))
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}

/// Log an error to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => {
        $crate::__error(&format!($($t)*))
    };
}

/// Log an error to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
