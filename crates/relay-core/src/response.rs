//! Chat response value object for the non-streaming path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::upstream::UpstreamError;

/// `ext` key under which a detected in-band error is embedded. The HTTP
/// status stays 200 when this key is present; the transport envelope never
/// changes shape based on upstream outcome.
pub const EXT_UPSTREAM_ERROR: &str = "upstream_error";

/// The assembled result of a non-streaming chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The conversation this exchange belongs to.
    pub conversation_id: String,
    /// Persisted id of the user's message row.
    pub user_message_id: String,
    /// Persisted id of the assistant's message row.
    pub assistant_message_id: String,
    /// Concatenated assistant output.
    pub message: String,
    /// Extension payload; in-band errors land under
    /// [`EXT_UPSTREAM_ERROR`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ext: BTreeMap<String, Value>,
}

impl ChatResponse {
    /// Embeds an in-band upstream error under the fixed ext key.
    pub fn set_upstream_error(&mut self, error: &UpstreamError) {
        let value = serde_json::to_value(error).unwrap_or(Value::Null);
        let _ = self.ext.insert(EXT_UPSTREAM_ERROR.to_string(), value);
    }

    /// The embedded upstream error, if any.
    #[must_use]
    pub fn upstream_error(&self) -> Option<&Value> {
        self.ext.get(EXT_UPSTREAM_ERROR)
    }
}
