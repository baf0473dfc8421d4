//! Expression parser error type
//!
//! Located error information for grammar failures. A parse failure on a
//! locally-built expression is an internal-consistency error (the text was
//! produced by the same code that owns the grammar), so callers log and
//! surface it rather than recovering.

use std::fmt;

/// Phase of expression parsing an error originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// The grammar rejected the raw expression text
    Grammar,
    /// The concrete parse tree had an unexpected shape
    TreeWalk,
    /// A percent-hex escape failed to decode
    Escape,
}

impl ParseStage {
    fn as_str(self) -> &'static str {
        match self {
            ParseStage::Grammar => "grammar",
            ParseStage::TreeWalk => "parse tree",
            ParseStage::Escape => "escape decoding",
        }
    }
}

/// Parse error carrying its originating stage and, when known, a location
/// within the expression text
#[derive(Debug, Clone)]
pub struct ParseError {
    pub stage: ParseStage,
    pub message: String,
    /// 0-based (line, column) within the expression text
    pub location: Option<(usize, usize)>,
}

impl ParseError {
    pub fn new(stage: ParseStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            location: None,
        }
    }

    /// Attach a 0-based location
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some((line, column));
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some((line, column)) => write!(
                f,
                "{} error at line {}, column {}: {}",
                self.stage.as_str(),
                line + 1,
                column + 1,
                self.message
            ),
            None => write!(f, "{} error: {}", self.stage.as_str(), self.message),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for crate::FacetError {
    fn from(err: ParseError) -> Self {
        crate::FacetError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_and_without_location() {
        let err = ParseError::new(ParseStage::Grammar, "unexpected token").at(0, 4);
        assert_eq!(
            err.to_string(),
            "grammar error at line 1, column 5: unexpected token"
        );

        let err = ParseError::new(ParseStage::Escape, "truncated escape in '%2'");
        assert_eq!(
            err.to_string(),
            "escape decoding error: truncated escape in '%2'"
        );
    }
}
