//! What crosses the sandbox boundary
//!
//! Requests travel as an `Envelope` serialized to JSON and then base64.
//! The script body inside the envelope is base64 again, so neither layer
//! ever needs quoting: the base64 alphabet has no quote, backslash or
//! newline characters. Values assigned by `set` travel as JSON bindings
//! instead of being spliced into script text.
//!
//! Replies come back as JSON, either `{"data": ...}` or
//! `{"error": ..., "name": ..., "traceback": ...}`, optionally tagged with
//! the `id` of the envelope they answer.

use super::command::CommandId;
use super::error::{BridgeError, BridgeResult, RemoteError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structured request for the sandbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Echoed back in the reply
    pub id: CommandId,
    /// Base64 of the UTF-8 script body
    pub source: String,
    /// Variable whose value becomes the reply's `data`
    pub output: String,
    /// Globals to define before the script runs
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub bindings: Map<String, Value>,
}

impl Envelope {
    pub fn new(id: CommandId, script: &str, output: &str) -> Self {
        Self {
            id,
            source: STANDARD.encode(script.as_bytes()),
            output: output.to_string(),
            bindings: Map::new(),
        }
    }

    /// Add a global binding visible to the script
    pub fn with_binding(mut self, name: &str, value: Value) -> Self {
        self.bindings.insert(name.to_string(), value);
        self
    }

    /// Decode the script body
    pub fn script(&self) -> BridgeResult<String> {
        let bytes = STANDARD
            .decode(&self.source)
            .map_err(|e| BridgeError::Decode(format!("script body: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| BridgeError::Decode(format!("script body: {}", e)))
    }

    /// Serialize for the channel: base64 of the JSON form
    pub fn to_transport(&self) -> BridgeResult<String> {
        let json = serde_json::to_vec(self).map_err(|e| BridgeError::Encode(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Inverse of `to_transport`
    pub fn from_transport(payload: &str) -> BridgeResult<Self> {
        let json = STANDARD
            .decode(payload.trim())
            .map_err(|e| BridgeError::Decode(format!("envelope: {}", e)))?;
        serde_json::from_slice(&json).map_err(|e| BridgeError::Decode(format!("envelope: {}", e)))
    }
}

/// Outcome of running a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Failure {
        error: String,
        name: String,
        #[serde(default)]
        traceback: String,
    },
    Success {
        #[serde(default)]
        data: Value,
    },
}

/// A reply from the sandbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CommandId>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Reply {
    pub fn success(id: Option<CommandId>, data: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Success { data },
        }
    }

    pub fn failure(id: Option<CommandId>, name: &str, error: &str, traceback: &str) -> Self {
        Self {
            id,
            outcome: Outcome::Failure {
                error: error.to_string(),
                name: name.to_string(),
                traceback: traceback.to_string(),
            },
        }
    }

    /// Decode a reply from its JSON text
    pub fn from_json(text: &str) -> BridgeResult<Self> {
        serde_json::from_str(text).map_err(|e| BridgeError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> BridgeResult<String> {
        serde_json::to_string(self).map_err(|e| BridgeError::Encode(e.to_string()))
    }

    /// Convert into the value a caller's future settles with
    pub fn into_result(self) -> BridgeResult<Value> {
        match self.outcome {
            Outcome::Success { data } => Ok(data),
            Outcome::Failure {
                error,
                name,
                traceback,
            } => Err(BridgeError::Remote(RemoteError {
                name,
                message: error,
                traceback,
            })),
        }
    }
}
