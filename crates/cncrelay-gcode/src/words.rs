//! G-code word tokenizer
//!
//! Splits a program line into `(letter, value)` pairs in left-to-right order
//! after removing parenthetical and semicolon comments.

use regex::Regex;
use std::sync::OnceLock;

/// A single address word such as `G1`, `X-10.5`, or `T3`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    /// Upper-cased address letter
    pub letter: char,
    /// Numeric value
    pub value: f64,
}

impl Word {
    /// Integer code of the word (`G01` -> 1)
    ///
    /// `None` for fractional codes like `G54.1`, negative values, and values
    /// that do not fit a `u32`.
    pub fn code(&self) -> Option<u32> {
        if !(0.0..=f64::from(u32::MAX)).contains(&self.value) {
            return None;
        }
        let rounded = self.value.round();
        if (self.value - rounded).abs() > 1e-9 {
            return None;
        }
        Some(rounded as u32)
    }

    /// Whether this is the given letter with the given integer code
    pub fn is(&self, letter: char, code: u32) -> bool {
        self.letter == letter && self.code() == Some(code)
    }
}

/// Remove `( ... )` and `; ...` comments from a line
///
/// An unterminated parenthesis comments out the rest of the line.
pub fn strip_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;
    for c in line.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            ';' if depth == 0 => break,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Extract the address words of a line in source order
pub fn parse_words(line: &str) -> Vec<Word> {
    static WORD_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = WORD_REGEX.get_or_init(|| {
        Regex::new(r"([A-Za-z])\s*([+-]?(?:\d+\.?\d*|\.\d+))").expect("invalid regex pattern")
    });

    let cleaned = strip_comments(line);
    regex
        .captures_iter(&cleaned)
        .filter_map(|caps| {
            let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
            let value = caps.get(2)?.as_str().parse::<f64>().ok()?;
            Some(Word { letter, value })
        })
        .collect()
}

/// First value for `letter` on the line
pub fn find_word(words: &[Word], letter: char) -> Option<f64> {
    words.iter().find(|w| w.letter == letter).map(|w| w.value)
}

/// Format a coordinate or feed for emission: at most four decimals, no trailing zeros
pub fn format_number(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    let mut text = format!("{:.4}", rounded);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_words_in_order() {
        let words = parse_words("G91 X10 y-2.5 F600");
        let letters: Vec<char> = words.iter().map(|w| w.letter).collect();
        assert_eq!(letters, vec!['G', 'X', 'Y', 'F']);
        assert_eq!(words[2].value, -2.5);
    }

    #[test]
    fn test_parse_words_without_spaces() {
        let words = parse_words("M6T12");
        assert!(words[0].is('M', 6));
        assert!(words[1].is('T', 12));
    }

    #[test]
    fn test_comments_are_ignored() {
        assert_eq!(strip_comments("G0 X1 (rapid X2) Y3 ; Z4"), "G0 X1  Y3 ");
        assert_eq!(strip_comments("G1 (unterminated X5"), "G1 ");
        let words = parse_words("(T5 M6) G0 X1");
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn test_word_code() {
        assert_eq!(Word { letter: 'G', value: 1.0 }.code(), Some(1));
        assert_eq!(Word { letter: 'G', value: 54.1 }.code(), None);
        assert_eq!(Word { letter: 'X', value: -1.0 }.code(), None);
        assert_eq!(Word { letter: 'T', value: f64::NAN }.code(), None);
    }

    #[test]
    fn test_oversized_code_is_rejected() {
        let words = parse_words("T99999999999 M6");
        assert_eq!(words[0].code(), None);
        assert_eq!(words[1].code(), Some(6));

        let max = Word {
            letter: 'T',
            value: f64::from(u32::MAX),
        };
        assert_eq!(max.code(), Some(u32::MAX));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(10.5), "10.5");
        assert_eq!(format_number(-0.00001), "0");
        assert_eq!(format_number(1.23456), "1.2346");
        assert_eq!(format_number(-3.25), "-3.25");
    }
}
