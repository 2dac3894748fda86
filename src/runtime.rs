//! Browser frame loop
//!
//! requestAnimationFrame drives a tick that expires overdue commands and
//! runs the status box timers. Nothing here blocks; each tick is a handful
//! of comparisons.

use crate::{console_log, exports};
use std::cell::RefCell;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// State for the animation frame loop
struct RuntimeState {
    /// Callback for requestAnimationFrame (stored to prevent GC)
    frame_closure: Option<Closure<dyn FnMut(f64)>>,
    running: bool,
    frame_count: u64,
}

thread_local! {
    static STATE: RefCell<RuntimeState> = const { RefCell::new(RuntimeState {
        frame_closure: None,
        running: false,
        frame_count: 0,
    }) };
}

/// Start the frame loop
pub fn start() {
    let already = STATE.with(|state| {
        let mut state = state.borrow_mut();
        std::mem::replace(&mut state.running, true)
    });
    if already {
        console_log!("[runtime] Already running");
        return;
    }

    request_animation_frame();
}

fn request_animation_frame() {
    let Some(window) = web_sys::window() else {
        console_log!("[runtime] No window object");
        return;
    };

    let closure = Closure::wrap(Box::new(move |timestamp: f64| {
        frame_tick(timestamp);
    }) as Box<dyn FnMut(f64)>);

    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        // replacing drops last frame's closure, which has already run
        state.frame_closure = Some(closure);
    });
}

/// Called every frame by requestAnimationFrame
fn frame_tick(timestamp: f64) {
    let should_continue = STATE.with(|state| {
        let mut state = state.borrow_mut();
        if !state.running {
            return false;
        }
        state.frame_count += 1;
        if state.frame_count == 1 {
            console_log!("[runtime] First frame");
        }
        true
    });

    if !should_continue {
        return;
    }

    // rAF timestamps share performance.now()'s clock
    exports::tick(timestamp);

    request_animation_frame();
}
