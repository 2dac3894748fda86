//! Bridge configuration
//!
//! Every field has a default matching what the interpreter's web loop
//! expects, so an empty options object is a valid config.

use super::error::{BridgeError, BridgeResult};
use serde::Deserialize;

/// Window variable the interpreter polls for scripts
pub const DEFAULT_COMMAND_VAR: &str = "_renpy_cmd";

/// Global function the interpreter calls with each reply
pub const DEFAULT_CALLBACK: &str = "_renpy_cmd_callback";

/// Variable holding a script's return value
pub const DEFAULT_OUTPUT_VAR: &str = "result";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    pub command_var: String,
    pub callback: String,
    pub output_var: String,
    /// Per-command deadline. `None` waits forever, like the interpreter's
    /// own loop does.
    pub timeout_ms: Option<f64>,
    /// Trace every queue transition to the console
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_var: DEFAULT_COMMAND_VAR.to_string(),
            callback: DEFAULT_CALLBACK.to_string(),
            output_var: DEFAULT_OUTPUT_VAR.to_string(),
            timeout_ms: None,
            debug: false,
        }
    }
}

impl BridgeConfig {
    /// Parse from a JSON options object
    pub fn from_json(text: &str) -> BridgeResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| BridgeError::Decode(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> BridgeResult<()> {
        for (field, value) in [
            ("commandVar", &self.command_var),
            ("callback", &self.callback),
            ("outputVar", &self.output_var),
        ] {
            if !is_identifier(value) {
                return Err(BridgeError::Decode(format!(
                    "config: {} is not an identifier: {:?}",
                    field, value
                )));
            }
        }
        if let Some(ms) = self.timeout_ms
            && !(ms.is_finite() && ms > 0.0)
        {
            return Err(BridgeError::Decode(format!(
                "config: timeoutMs must be positive, got {}",
                ms
            )));
        }
        Ok(())
    }
}

/// These names are spliced into source on both sides of the boundary
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
