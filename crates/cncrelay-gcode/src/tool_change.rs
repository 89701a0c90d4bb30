//! Canonical tool-change matcher
//!
//! The single place that decides whether a command is an `M6` tool change and
//! which tool it asks for. Both the dispatch pipeline and the modal analyzer
//! go through here so they can never disagree.

use crate::words::{parse_words, Word};

/// Result of matching a command against the tool-change pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolChange {
    /// Tool requested by a `T` word on the same line
    pub tool_number: Option<u32>,
    /// Whether the line contains `M6` / `M06`
    pub matched: bool,
}

/// Match `M6`/`M06` in any order and spacing relative to a `T<number>` word
///
/// `M6 T3`, `T3M06`, and `t3 m6` all match with tool 3; a bare `M6` matches
/// with no tool number. `M60`/`M61` do not match.
pub fn parse_tool_change(command: &str) -> ToolChange {
    parse_tool_change_words(&parse_words(command))
}

/// Same as [`parse_tool_change`] for an already tokenized line
pub fn parse_tool_change_words(words: &[Word]) -> ToolChange {
    let matched = words.iter().any(|w| w.is('M', 6));
    if !matched {
        return ToolChange::default();
    }
    let tool_number = words
        .iter()
        .find(|w| w.letter == 'T')
        .and_then(Word::code);
    ToolChange {
        tool_number,
        matched,
    }
}

/// Whether the command is a tool change
pub fn is_tool_change(command: &str) -> bool {
    parse_tool_change(command).matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_any_order_and_spacing() {
        for cmd in ["M6 T3", "M06T3", "T3 M6", "t3m06", "  T 3   M 6  "] {
            let tc = parse_tool_change(cmd);
            assert!(tc.matched, "{cmd} should match");
            assert_eq!(tc.tool_number, Some(3), "{cmd} should request tool 3");
        }
    }

    #[test]
    fn test_bare_m6() {
        let tc = parse_tool_change("M6");
        assert!(tc.matched);
        assert_eq!(tc.tool_number, None);
    }

    #[test]
    fn test_non_tool_changes() {
        assert!(!is_tool_change("T3"));
        assert!(!is_tool_change("M60"));
        assert!(!is_tool_change("M61 Q2"));
        assert!(!is_tool_change("(M6 T2) G0 X0"));
        assert!(!is_tool_change("G1 X6 F600"));
    }
}
