/*!
Filter-expression module

Handles the textual form of the filter state: a small boolean query language
with comparison and membership terms, parsed by a grammar-generated (pest)
parser into the typed [`FilterExpr`] AST.

## Architecture

1. **Serialization**: the filter store builds expression text from its
   per-attribute state ([`FilterExpr::to_query_string`] provides the same
   serialization for an existing tree).

2. **Parsing**: the pest grammar (`filter.pest`) produces a concrete parse
   tree, which [`builder`] converts into the typed AST, percent-hex-decoding
   identifiers and string literals along the way.

3. **Annotation**: leaf nodes are annotated with each attribute's coerced
   type from the schema before the tree is sent to the aggregation endpoint.

Attribute identifiers are dotted paths (`meta.clinical.age`), which the
grammar cannot tokenize directly; they are percent-hex-encoded before being
embedded in expression text and decoded again after parsing, so
`decode(encode(x)) == x` end to end.
*/

use pest::Parser;
use tracing::error;

use crate::{FacetError, Result};

pub mod ast;
pub mod builder;
pub mod error;

pub use ast::{CmpOp, Comparison, FilterExpr, Membership};
pub use error::{ParseError, ParseStage};

#[derive(pest_derive::Parser)]
#[grammar = "expr/filter.pest"]
struct ExpressionParser;

/// Parse filter-expression text into a typed AST.
///
/// Expression text is normally produced by this crate's own serializer, so a
/// grammar failure here is an internal-consistency error: it is logged and
/// surfaced to the caller rather than swallowed.
pub fn parse_expression(text: &str) -> Result<FilterExpr> {
    let mut pairs = ExpressionParser::parse(Rule::expression, text).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos((line, column)) => (line, column),
            pest::error::LineColLocation::Span((line, column), _) => (line, column),
        };
        let parse_error = ParseError::new(
            ParseStage::Grammar,
            format!("rejected filter expression: {}", e.variant.message()),
        )
        .at(line.saturating_sub(1), column.saturating_sub(1));
        error!("{}", parse_error);
        FacetError::from(parse_error)
    })?;

    let root = pairs
        .next()
        .ok_or_else(|| FacetError::InternalError("empty parse result".to_string()))?;
    builder::build_expression(root).map_err(FacetError::from)
}

/// Percent-hex-encode a string so it fits the grammar's identifier and
/// string tokens: every byte outside `[A-Za-z0-9]` becomes `%XX`.
pub fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Inverse of [`percent_encode`]
pub fn percent_decode(encoded: &str) -> std::result::Result<String, ParseError> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3).ok_or_else(|| {
                ParseError::new(
                    ParseStage::Escape,
                    format!("truncated escape in '{}'", encoded),
                )
            })?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| {
                ParseError::new(
                    ParseStage::Escape,
                    format!("invalid escape '%{}' in '{}'", hex, encoded),
                )
            })?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| {
        ParseError::new(
            ParseStage::Escape,
            format!("escape sequence in '{}' is not UTF-8", encoded),
        )
    })
}
