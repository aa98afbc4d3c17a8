//! Argument tokens of the scripting API
//!
//! The automation API takes nested lists of loosely typed values, e.g.
//! `["NAME:BoxParameters", "XPosition:=", "0um", ...]`. [`Token`] models one
//! such value. Its `Display` renders the value as a Python literal, which is
//! the form the desktop's script console accepts.

use chipsim_core::Position;
use std::fmt;

/// A single argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// No value (void return)
    Null,
    /// String
    Str(String),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Nested list
    List(Vec<Token>),
}

/// Build a `Vec<Token>` from heterogeneous values
#[macro_export]
macro_rules! tokens {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::token::Token::from($value)),*]
    };
}

impl Token {
    /// String value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Items, if this is a list
    pub fn as_list(&self) -> Option<&[Token]> {
        match self {
            Token::List(items) => Some(items),
            _ => None,
        }
    }

    /// Collect the string items of a list
    ///
    /// A single string yields a one-element vector; anything else is empty.
    pub fn into_strings(self) -> Vec<String> {
        match self {
            Token::Str(s) => vec![s],
            Token::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Token::Str(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::Str(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Str(value)
    }
}

impl From<&String> for Token {
    fn from(value: &String) -> Self {
        Token::Str(value.clone())
    }
}

impl From<bool> for Token {
    fn from(value: bool) -> Self {
        Token::Bool(value)
    }
}

impl From<i64> for Token {
    fn from(value: i64) -> Self {
        Token::Int(value)
    }
}

impl From<i32> for Token {
    fn from(value: i32) -> Self {
        Token::Int(i64::from(value))
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token::Int(i64::from(value))
    }
}

impl From<usize> for Token {
    fn from(value: usize) -> Self {
        Token::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Token {
    fn from(value: f64) -> Self {
        Token::Float(value)
    }
}

impl From<Vec<Token>> for Token {
    fn from(items: Vec<Token>) -> Self {
        Token::List(items)
    }
}

impl From<Vec<String>> for Token {
    fn from(items: Vec<String>) -> Self {
        Token::List(items.into_iter().map(Token::Str).collect())
    }
}

impl From<Position> for Token {
    fn from(position: Position) -> Self {
        match position {
            Position::Number(v) => Token::Float(v),
            Position::Text(s) => Token::Str(s),
            Position::List(items) => Token::List(items.into_iter().map(Token::from).collect()),
        }
    }
}

fn write_str_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '"' => write!(f, "\\\"")?,
            '\n' => write!(f, "\\n")?,
            _ => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => write!(f, "None"),
            Token::Str(s) => write_str_literal(f, s),
            Token::Int(v) => write!(f, "{}", v),
            Token::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Token::Float(v) => write!(f, "{}", v),
            Token::Bool(true) => write!(f, "True"),
            Token::Bool(false) => write!(f, "False"),
            Token::List(items) => {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_literals() {
        let list = Token::List(tokens!["NAME:X", "Flag:=", true, 3, 2.5, 4.0]);
        assert_eq!(
            list.to_string(),
            r#"["NAME:X", "Flag:=", True, 3, 2.5, 4.0]"#
        );
        assert_eq!(Token::Null.to_string(), "None");
        assert_eq!(Token::from("\"\"").to_string(), r#""\"\"""#);
    }

    #[test]
    fn test_into_strings() {
        let names = Token::List(tokens!["Rectangle1", "Rectangle2"]);
        assert_eq!(names.into_strings(), vec!["Rectangle1", "Rectangle2"]);
        assert_eq!(Token::from("Box1").into_strings(), vec!["Box1"]);
        assert!(Token::Null.into_strings().is_empty());
    }

    #[test]
    fn test_from_position() {
        let token = Token::from(Position::from(vec!["1um", "2um"]));
        assert_eq!(token, Token::List(tokens!["1um", "2um"]));
    }
}
