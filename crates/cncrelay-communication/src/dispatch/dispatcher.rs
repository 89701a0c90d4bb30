//! Pre-send command policy
//!
//! Every command passes through [`CommandDispatcher::process`] before it may
//! reach the transport:
//!
//! - `(MSG,CLEAR)` clears the plugin message and is acknowledged on the spot
//! - a tool change to the tool already in the spindle is acknowledged without
//!   being sent
//! - a genuine tool change raises the tool-changing flag, is expanded, and
//!   gets a trailing completion marker
//! - everything else goes straight through the expansion hooks

use cncrelay_core::{AppEvent, CommandContext, CommandEvent, DispatchError, SharedState};
use cncrelay_gcode::parse_tool_change;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::expander::ExpanderHandle;

/// Control string that clears the plugin message
pub const CLEAR_MESSAGE_COMMAND: &str = "(MSG,CLEAR)";

/// Comment appended after a tool change sequence; no machine effect
pub const TOOL_CHANGE_COMPLETE_MARKER: &str = "(TOOL CHANGE COMPLETE)";

/// Dispatch policy switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Fall back to the last reported tool when the live status has none
    pub trust_cached_tool: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            trust_cached_tool: true,
        }
    }
}

/// Result produced without involving the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Command identifier from the context
    pub command_id: String,
    /// Originating source from the context
    pub source_id: String,
    /// Text shown to the operator
    pub display_text: String,
    /// Whether the command counts as succeeded
    pub success: bool,
}

/// What to do with a processed command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Whether `commands` should be handed to the transport
    pub should_continue: bool,
    /// Synthetic result when the command was handled here
    pub result: Option<CommandResult>,
    /// Commands to send, in order
    pub commands: Vec<String>,
}

impl DispatchOutcome {
    fn handled(result: CommandResult) -> Self {
        Self {
            should_continue: false,
            result: Some(result),
            commands: Vec::new(),
        }
    }

    fn forward(commands: Vec<String>) -> Self {
        Self {
            should_continue: !commands.is_empty(),
            result: None,
            commands,
        }
    }
}

/// Command dispatch pipeline
pub struct CommandDispatcher {
    state: SharedState,
    expanders: Vec<ExpanderHandle>,
    config: DispatchConfig,
    pending_tool: Mutex<Option<u32>>,
}

impl CommandDispatcher {
    /// Create a dispatcher with no expansion hooks
    pub fn new(state: SharedState, config: DispatchConfig) -> Self {
        Self {
            state,
            expanders: Vec::new(),
            config,
            pending_tool: Mutex::new(None),
        }
    }

    /// Register an expansion hook; hooks run in registration order
    pub fn register(&mut self, expander: ExpanderHandle) -> &mut Self {
        tracing::debug!("Registered expansion hook '{}'", expander.name());
        self.expanders.push(expander);
        self
    }

    /// Registered hooks
    pub fn expanders(&self) -> &[ExpanderHandle] {
        &self.expanders
    }

    /// Dispatch configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The tool currently in the spindle, as far as we know
    pub fn current_tool(&self) -> Option<u32> {
        let reported = self.state.machine_status().and_then(|s| s.tool);
        match reported {
            Some(tool) => Some(tool),
            None if self.config.trust_cached_tool => self.state.last_known_tool(),
            None => None,
        }
    }

    /// Apply the pre-send policy to one command
    ///
    /// Hook failures propagate unchanged; nothing is retried here.
    pub async fn process(
        &self,
        command: &str,
        context: &mut CommandContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(DispatchError::EmptyCommand);
        }

        if is_clear_message(command) {
            self.state.set_plugin_message(None);
            return Ok(DispatchOutcome::handled(self.acknowledge_locally(
                context,
                &context.display_text,
            )));
        }

        let tool_change = parse_tool_change(command);
        if !tool_change.matched {
            return Ok(DispatchOutcome::forward(self.expand(command, context).await?));
        }

        if let Some(tool) = tool_change.tool_number {
            if self.current_tool() == Some(tool) {
                tracing::info!("Tool {} already loaded, skipping {}", tool, command);
                let text = format!("{} (tool {} already loaded, skipped)", command, tool);
                return Ok(DispatchOutcome::handled(
                    self.acknowledge_locally(context, &text),
                ));
            }
        }

        self.state.set_tool_changing(true);
        let mut commands = match self.expand(command, context).await {
            Ok(commands) => commands,
            Err(e) => {
                self.state.set_tool_changing(false);
                return Err(e);
            }
        };
        *self.pending_tool.lock() = tool_change.tool_number;
        commands.push(TOOL_CHANGE_COMPLETE_MARKER.to_string());
        Ok(DispatchOutcome::forward(commands))
    }

    /// Note that the transport acknowledged `command`
    ///
    /// Acknowledging the completion marker ends the tool change: the flag is
    /// cleared and the requested tool becomes the last known tool. Returns
    /// whether it was the marker.
    pub fn acknowledge(&self, command: &str) -> bool {
        if command.trim() != TOOL_CHANGE_COMPLETE_MARKER {
            return false;
        }
        if let Some(tool) = self.pending_tool.lock().take() {
            self.state.set_last_known_tool(Some(tool));
        }
        self.state.set_tool_changing(false);
        true
    }

    async fn expand(
        &self,
        command: &str,
        context: &mut CommandContext,
    ) -> Result<Vec<String>, DispatchError> {
        let mut commands = vec![command.to_string()];
        for expander in &self.expanders {
            if !expander.is_enabled() || context.processed_by(expander.name()) {
                continue;
            }
            let mut expanded = Vec::with_capacity(commands.len());
            for cmd in &commands {
                match expander.expand(cmd, context).await {
                    Ok(out) => expanded.extend(out),
                    Err(message) => {
                        tracing::warn!("Expansion hook '{}' failed: {}", expander.name(), message);
                        let error = DispatchError::Expansion {
                            hook: expander.name().to_string(),
                            message,
                        };
                        self.state
                            .bus()
                            .emit(AppEvent::Command(CommandEvent::Failed {
                                command_id: context.command_id.clone(),
                                source_id: context.source_id.clone(),
                                error: error.to_string(),
                            }));
                        return Err(error);
                    }
                }
            }
            context.mark_processed_by(expander.name());
            commands = expanded;
        }
        Ok(commands)
    }

    fn acknowledge_locally(&self, context: &CommandContext, display_text: &str) -> CommandResult {
        let bus = self.state.bus();
        bus.emit(AppEvent::Command(CommandEvent::Pending {
            command_id: context.command_id.clone(),
            source_id: context.source_id.clone(),
            display_text: display_text.to_string(),
        }));
        bus.emit(AppEvent::Command(CommandEvent::Completed {
            command_id: context.command_id.clone(),
            source_id: context.source_id.clone(),
            display_text: display_text.to_string(),
        }));
        CommandResult {
            command_id: context.command_id.clone(),
            source_id: context.source_id.clone(),
            display_text: display_text.to_string(),
            success: true,
        }
    }
}

fn is_clear_message(command: &str) -> bool {
    let normalized: String = command
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    normalized == CLEAR_MESSAGE_COMMAND
}
