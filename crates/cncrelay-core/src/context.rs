//! Command context carried from the call boundary to the transport
//!
//! A context is created where a command originates (UI, plugin, job runner)
//! and travels with it through dispatch. Only `meta` may change afterwards,
//! and only to record provenance.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form metadata attached to a command
pub type Meta = Map<String, Value>;

/// Meta key listing the expansion hooks that already processed a command
pub const META_PROCESSED_BY: &str = "processedBy";

/// Meta key flagging a motion command that keeps running until cancelled
pub const META_CONTINUOUS: &str = "continuous";

/// Meta key flagging a watchdog heartbeat
pub const META_HEARTBEAT: &str = "heartbeat";

/// Meta key correlating a jog-cancel with the session it completes
pub const META_COMPLETES_ID: &str = "completesId";

/// Meta key carrying the reason a jog session stopped
pub const META_STOP_REASON: &str = "stopReason";

/// Where a command came from and how to report on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandContext {
    /// Identifier used to reattach results to the request
    pub command_id: String,
    /// Originating client, plugin, or job
    pub source_id: String,
    /// Provenance and routing metadata
    #[serde(default)]
    pub meta: Meta,
    /// Text shown to the operator in place of the raw command
    pub display_text: String,
}

impl CommandContext {
    /// Create a context with a generated command id
    pub fn new(source_id: impl Into<String>, display_text: impl Into<String>) -> Self {
        Self {
            command_id: generate_command_id(),
            source_id: source_id.into(),
            meta: Meta::new(),
            display_text: display_text.into(),
        }
    }

    /// Use an explicit command id
    pub fn with_command_id(mut self, command_id: impl Into<String>) -> Self {
        self.command_id = command_id.into();
        self
    }

    /// Attach a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Whether the named hook is recorded as having processed this command
    pub fn processed_by(&self, hook: &str) -> bool {
        self.meta
            .get(META_PROCESSED_BY)
            .and_then(Value::as_array)
            .is_some_and(|hooks| hooks.iter().any(|h| h.as_str() == Some(hook)))
    }

    /// Record that the named hook processed this command
    pub fn mark_processed_by(&mut self, hook: &str) {
        if self.processed_by(hook) {
            return;
        }
        let entry = self
            .meta
            .entry(META_PROCESSED_BY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(hooks) = entry {
            hooks.push(Value::String(hook.to_string()));
        }
    }
}

/// Generate a fresh command id
pub fn generate_command_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_unique_ids() {
        let a = CommandContext::new("ui", "G0 X0");
        let b = CommandContext::new("ui", "G0 X0");
        assert_ne!(a.command_id, b.command_id);
        assert!(a.meta.is_empty());
    }

    #[test]
    fn test_processed_by_marks_once() {
        let mut ctx = CommandContext::new("plugin", "M6 T2");
        assert!(!ctx.processed_by("toolchanger"));

        ctx.mark_processed_by("toolchanger");
        ctx.mark_processed_by("toolchanger");
        ctx.mark_processed_by("tool-setter");

        assert!(ctx.processed_by("toolchanger"));
        assert!(ctx.processed_by("tool-setter"));
        let hooks = ctx.meta[META_PROCESSED_BY].as_array().map(Vec::len);
        assert_eq!(hooks, Some(2));
    }

    #[test]
    fn test_serializes_camel_case() {
        let ctx = CommandContext::new("job", "line 10").with_command_id("abc");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["commandId"], "abc");
        assert_eq!(json["sourceId"], "job");
        assert_eq!(json["displayText"], "line 10");
    }
}
