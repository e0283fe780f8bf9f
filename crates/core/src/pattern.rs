//! SMARTS query patterns.
//!
//! The structure-match primitive consumes SMARTS query molecules. This
//! module only performs checks that can be made without a chemistry
//! toolkit: anything that passes is forwarded to the matching engine
//! byte-for-byte, apart from trimming surrounding whitespace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A SMARTS pattern that passed static checks.
///
/// The wrapped string is exactly what will be bound into the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Pattern(String);

/// Reasons a pattern string is rejected before it reaches the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    Empty,
    Whitespace { position: usize },
    ForbiddenCharacter { character: char, position: usize },
    Unbalanced { open: char, position: usize },
    UnexpectedClose { close: char, position: usize },
    /// The string is written in a different notation (e.g. an InChI).
    WrongNotation { notation: String },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Empty => write!(f, "pattern is empty"),
            PatternError::Whitespace { position } => {
                write!(f, "whitespace inside pattern at offset {}", position)
            }
            PatternError::ForbiddenCharacter {
                character,
                position,
            } => write!(
                f,
                "character {:?} at offset {} cannot appear in a SMARTS pattern",
                character, position
            ),
            PatternError::Unbalanced { open, position } => {
                write!(f, "'{}' at offset {} is never closed", open, position)
            }
            PatternError::UnexpectedClose { close, position } => {
                write!(f, "unmatched '{}' at offset {}", close, position)
            }
            PatternError::WrongNotation { notation } => {
                write!(f, "string is written in {} notation, not SMARTS", notation)
            }
        }
    }
}

impl std::error::Error for PatternError {}

impl Pattern {
    /// Parse a raw pattern string.
    ///
    /// Surrounding whitespace is trimmed; nothing else is rewritten.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }
        if trimmed.starts_with("InChI=") {
            return Err(PatternError::WrongNotation {
                notation: "InChI".to_string(),
            });
        }

        let mut stack: Vec<(char, usize)> = Vec::new();
        for (position, character) in trimmed.char_indices() {
            if character.is_whitespace() {
                return Err(PatternError::Whitespace { position });
            }
            if !character.is_ascii()
                || character.is_ascii_control()
                || matches!(character, '\'' | '"' | '\\' | '`')
            {
                return Err(PatternError::ForbiddenCharacter {
                    character,
                    position,
                });
            }
            match character {
                '[' | '(' => stack.push((character, position)),
                ']' | ')' => {
                    let expected = if character == ']' { '[' } else { '(' };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return Err(PatternError::UnexpectedClose {
                                close: character,
                                position,
                            })
                        }
                    }
                }
                _ => {}
            }
        }
        if let Some((open, position)) = stack.pop() {
            return Err(PatternError::Unbalanced { open, position });
        }

        Ok(Pattern(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Pattern {
    type Error = PatternError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Pattern::parse(&raw)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.0
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a multi-pattern argument on whitespace and parse each part.
///
/// SMARTS never contains whitespace, so whitespace is an unambiguous
/// separator for composite functions taking several patterns.
pub fn parse_list(raw: &str) -> Result<Vec<Pattern>, PatternError> {
    raw.split_whitespace().map(Pattern::parse).collect()
}
