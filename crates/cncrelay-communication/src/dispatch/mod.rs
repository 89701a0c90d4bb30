//! Command dispatch pipeline

mod dispatcher;
mod expander;

pub use dispatcher::{
    CommandDispatcher, CommandResult, DispatchConfig, DispatchOutcome, CLEAR_MESSAGE_COMMAND,
    TOOL_CHANGE_COMPLETE_MARKER,
};
pub use expander::{CommandExpander, ExpanderHandle};
