//! Platform layer
//!
//! The bridge, status reporter and progress tracker are platform-agnostic.
//! Only this module knows about the host environment:
//!
//! - Browser (wasm32-unknown-unknown): window variables, DOM, performance.now
//! - Native: monotonic clock only, for tests and tooling

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Milliseconds on a monotonic clock
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

/// Milliseconds on a monotonic clock
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}
