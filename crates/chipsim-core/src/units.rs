//! Unit-qualified positions
//!
//! Scripting APIs take coordinates as strings carrying their unit (`"5um"`).
//! Callers may hand over bare numbers, strings that already carry a unit
//! (or a design variable expression), or nested lists of either.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A coordinate or size as accepted by the geometry builders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    /// Bare number, unit is appended when formatted
    Number(f64),
    /// Already unit-qualified value or expression, passed through unchanged
    Text(String),
    /// Nested sequence, formatted element-wise
    List(Vec<Position>),
}

impl Position {
    /// True only for a bare number that is exactly zero
    pub fn is_zero(&self) -> bool {
        matches!(self, Position::Number(v) if *v == 0.0)
    }

    /// The text value, if this is a single string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Position::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for Position {
    fn from(value: f64) -> Self {
        Position::Number(value)
    }
}

impl From<i32> for Position {
    fn from(value: i32) -> Self {
        Position::Number(f64::from(value))
    }
}

impl From<&str> for Position {
    fn from(value: &str) -> Self {
        Position::Text(value.to_string())
    }
}

impl From<String> for Position {
    fn from(value: String) -> Self {
        Position::Text(value)
    }
}

impl<T: Into<Position>> From<Vec<T>> for Position {
    fn from(values: Vec<T>) -> Self {
        Position::List(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Number(v) => write!(f, "{}", v),
            Position::Text(s) => write!(f, "{}", s),
            Position::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Append `units` to every bare number in `position`
///
/// Strings are returned unchanged and lists are formatted recursively, so the
/// result never contains a `Position::Number`.
pub fn format_position(position: &Position, units: &str) -> Position {
    match position {
        Position::Number(v) => Position::Text(format!("{}{}", v, units)),
        Position::Text(s) => Position::Text(s.clone()),
        Position::List(items) => Position::List(
            items
                .iter()
                .map(|item| format_position(item, units))
                .collect(),
        ),
    }
}

/// Format a scalar as `"<value> <units>"`, the form used by vector parameters
pub fn format_length(value: f64, units: &str) -> String {
    format!("{} {}", value, units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_position(&5.into(), "um"), Position::from("5um"));
        assert_eq!(format_position(&0.25.into(), "mm"), Position::from("0.25mm"));
    }

    #[test]
    fn test_format_list() {
        let formatted = format_position(&vec![1, 2].into(), "um");
        assert_eq!(formatted, Position::from(vec!["1um", "2um"]));
    }

    #[test]
    fn test_string_passthrough() {
        assert_eq!(format_position(&"3um".into(), "um"), Position::from("3um"));
        assert_eq!(
            format_position(&"$height".into(), "nm"),
            Position::from("$height")
        );
    }

    #[test]
    fn test_nested_list() {
        let nested = Position::List(vec![
            Position::from(1),
            Position::List(vec![Position::from(2), Position::from("3mm")]),
        ]);
        let formatted = format_position(&nested, "um");
        assert_eq!(formatted.to_string(), "[1um, [2um, 3mm]]");
    }

    #[test]
    fn test_is_zero() {
        assert!(Position::from(0.0).is_zero());
        assert!(Position::from(-0.0).is_zero());
        assert!(!Position::from("0um").is_zero());
        assert!(!Position::from(1e-12).is_zero());
    }

    #[test]
    fn test_format_length() {
        assert_eq!(format_length(0.2, "um"), "0.2 um");
        assert_eq!(format_length(-3.0, "mm"), "-3 mm");
    }
}
