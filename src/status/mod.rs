//! Status reporting
//!
//! The host page has a small status box: a log of messages and a progress
//! bar. It pops up when something is printed and fades out after a few
//! seconds of quiet. Once an error has been reported the box stays up and
//! ignores further progress, so the error remains readable.
//!
//! Timers are driven by `tick(now)` from the runtime loop rather than by
//! callbacks, so the reporter is plain state and testable natively.

pub mod progress;

pub use progress::{DownloadProgress, ProgressEvent, StatusLine};

use crate::console_log;

/// Quiet period before the status box hides itself
pub const STATUS_TIMEOUT_MS: f64 = 5000.0;

/// Delay between hiding the box and dropping its text (the fade-out)
pub const CLEAR_DELAY_MS: f64 = 250.0;

/// Minimum spacing between progress bar updates
pub const PROGRESS_INTERVAL_MS: f64 = 32.0;

/// Loader chatter that belongs in the console, not the status box
const CONSOLE_ONLY_PREFIXES: &[&str] = &[
    "warning: ",
    "wasm streaming compile failed",
    "falling back to ArrayBuffer",
];

const ERROR_HINT: &str =
    "More information may be available in the browser console or contained in the log.";

/// The widget the reporter drives
pub trait StatusView {
    /// Replace the log contents (already HTML-escaped)
    fn set_text(&mut self, html: &str);

    /// Show the box, scrolled to the bottom, with the progress bar hidden
    fn show(&mut self);

    /// Hide the box
    fn hide(&mut self);

    /// Show the progress bar at `done` of `total`
    fn set_progress(&mut self, done: u64, total: u64);

    /// Write a line to the console
    fn console(&mut self, line: &str) {
        console_log!("{}", line);
    }
}

pub struct StatusReporter<V: StatusView> {
    view: V,
    text: String,
    error_reported: bool,
    /// Mirror everything to the console and leave the box alone
    console_only: bool,
    hide_at: Option<f64>,
    clear_at: Option<f64>,
    last_progress: f64,
}

impl<V: StatusView> StatusReporter<V> {
    pub fn new(view: V) -> Self {
        Self {
            view,
            text: String::new(),
            error_reported: false,
            console_only: false,
            hide_at: None,
            clear_at: None,
            last_progress: 0.0,
        }
    }

    pub fn set_console_only(&mut self, console_only: bool) {
        self.console_only = console_only;
    }

    /// Print a message that will eventually be hidden
    pub fn print_message(&mut self, s: &str, now: f64) {
        if CONSOLE_ONLY_PREFIXES.iter().any(|p| s.starts_with(p)) {
            self.view.console(s);
            return;
        }

        self.print_common(s);
        self.start_timeout(now);
    }

    /// Report an error; the box stays up from now on
    pub fn report_error(&mut self, s: &str, cause: Option<&dyn std::fmt::Display>) {
        let mut message = s.to_string();
        if let Some(cause) = cause {
            crate::console_error!("{}: {}", s, cause);
            message.push_str(": ");
            message.push_str(&cause.to_string());
        }
        message.push('\n');
        message.push_str(ERROR_HINT);

        self.print_common(&message);
        self.error_reported = true;
    }

    /// Update the progress bar, at most once per `PROGRESS_INTERVAL_MS`
    ///
    /// The first and last updates always go through.
    pub fn progress(&mut self, done: u64, total: u64, now: f64) {
        if self.error_reported {
            return;
        }
        if now < self.last_progress + PROGRESS_INTERVAL_MS && done < total && done > 1 {
            return;
        }
        self.last_progress = now;

        self.hide_at = None;
        self.view.show();
        self.view.set_progress(done, total);
        self.start_timeout(now);
    }

    /// Feed one event from the download tracker
    pub fn apply(&mut self, event: ProgressEvent, now: f64) {
        match event {
            ProgressEvent::Message(s) => self.print_message(s, now),
            ProgressEvent::Progress { done, total } => self.progress(done, total, now),
        }
    }

    /// Hide right away (the game's first frame is up)
    pub fn dismiss(&mut self, now: f64) {
        self.hide_at = None;
        self.hide(now);
    }

    /// Run expired timers
    pub fn tick(&mut self, now: f64) {
        if self.hide_at.is_some_and(|t| now >= t) {
            self.hide_at = None;
            self.hide(now);
        }
        if self.clear_at.is_some_and(|t| now >= t) {
            self.clear_at = None;
            self.text.clear();
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_reported
    }

    /// Current log contents
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    fn hide(&mut self, now: f64) {
        if self.error_reported {
            return;
        }
        self.view.hide();
        self.clear_at = Some(now + CLEAR_DELAY_MS);
    }

    fn start_timeout(&mut self, now: f64) {
        self.hide_at = Some(now + STATUS_TIMEOUT_MS);
    }

    fn print_common(&mut self, s: &str) {
        self.hide_at = None;
        self.clear_at = None;
        self.last_progress = 0.0;

        if !self.text.is_empty() {
            self.text.push_str("<br>");
        }

        if s.is_empty() && !self.error_reported {
            self.text.clear();
            return;
        }

        for line in s.split('\n').filter(|l| !l.is_empty()) {
            self.view.console(line);
        }

        if self.console_only {
            return;
        }

        self.text.push_str(&escape_html(s));
        self.view.set_text(&self.text);
        self.view.show();
    }
}

/// Escape for innerHTML, turning newlines into line breaks
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("<br />"),
            c => out.push(c),
        }
    }
    out
}
