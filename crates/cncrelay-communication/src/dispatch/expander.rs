//! Command expansion hooks

use async_trait::async_trait;
use cncrelay_core::CommandContext;
use std::sync::Arc;

/// A hook that turns one command into the ordered commands to send
///
/// Hooks are registered on the dispatcher and run in registration order,
/// each one over the output of the previous. Macro expansion is the typical
/// use: one line in, many lines out. Return an empty list to swallow the
/// command.
#[async_trait]
pub trait CommandExpander: Send + Sync {
    /// Name recorded in the context's provenance metadata
    fn name(&self) -> &str;

    /// Expand a single command
    async fn expand(&self, command: &str, context: &CommandContext)
        -> Result<Vec<String>, String>;

    /// Check if this hook is enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Arc-wrapped expander for thread-safe sharing
pub type ExpanderHandle = Arc<dyn CommandExpander>;
