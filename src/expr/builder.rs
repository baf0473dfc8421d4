//! AST builder - converts the pest parse tree to a typed AST
//!
//! Walks the concrete parse tree produced by the grammar and builds a
//! [`FilterExpr`], percent-hex-decoding identifiers and string literals and
//! collapsing single-operand and/or nodes so the tree round-trips
//! structurally through serialization.

use pest::iterators::Pair;

use super::ast::{CmpOp, FilterExpr};
use super::error::{ParseError, ParseStage};
use super::{percent_decode, Rule};
use crate::histogram::FacetValue;

/// Build a [`FilterExpr`] from the parse tree root (an `expression` node)
pub fn build_expression(pair: Pair<Rule>) -> Result<FilterExpr, ParseError> {
    let or_expr = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::or_expr)
        .ok_or_else(|| unexpected("expected or_expr under expression"))?;
    build_or(or_expr)
}

fn build_or(pair: Pair<Rule>) -> Result<FilterExpr, ParseError> {
    let operands = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::and_expr)
        .map(build_and)
        .collect::<Result<Vec<_>, _>>()?;
    if operands.is_empty() {
        return Err(unexpected("empty disjunction"));
    }
    Ok(FilterExpr::or(operands))
}

fn build_and(pair: Pair<Rule>) -> Result<FilterExpr, ParseError> {
    let operands = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::unary_expr)
        .map(build_unary)
        .collect::<Result<Vec<_>, _>>()?;
    if operands.is_empty() {
        return Err(unexpected("empty conjunction"));
    }
    Ok(FilterExpr::and(operands))
}

fn build_unary(pair: Pair<Rule>) -> Result<FilterExpr, ParseError> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| unexpected("empty unary expression"))?;
    match first.as_rule() {
        Rule::not_op => {
            let operand = inner
                .next()
                .ok_or_else(|| unexpected("'not' without operand"))?;
            Ok(FilterExpr::Not(Box::new(build_unary(operand)?)))
        }
        Rule::primary => build_primary(first),
        rule => Err(unexpected(&format!(
            "unexpected node '{:?}' in unary expression",
            rule
        ))),
    }
}

fn build_primary(pair: Pair<Rule>) -> Result<FilterExpr, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| unexpected("empty primary expression"))?;
    match inner.as_rule() {
        Rule::comparison => build_comparison(inner),
        Rule::membership => build_membership(inner),
        Rule::or_expr => build_or(inner),
        rule => Err(unexpected(&format!(
            "unexpected node '{:?}' in primary expression",
            rule
        ))),
    }
}

fn build_comparison(pair: Pair<Rule>) -> Result<FilterExpr, ParseError> {
    let location = pair.line_col();
    let mut inner = pair.into_inner();
    let identifier = expect(inner.next(), Rule::identifier, location)?;
    let operator = expect(inner.next(), Rule::cmp_op, location)?;
    let literal = inner
        .next()
        .ok_or_else(|| located("comparison missing value", location))?;

    let operator = CmpOp::from_str(operator.as_str())
        .ok_or_else(|| located("unknown comparison operator", location))?;
    Ok(FilterExpr::cmp(
        percent_decode(identifier.as_str())?,
        operator,
        build_literal(literal)?,
    ))
}

fn build_membership(pair: Pair<Rule>) -> Result<FilterExpr, ParseError> {
    let location = pair.line_col();
    let mut identifier = None;
    let mut negated = false;
    let mut values = Vec::new();

    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::identifier => identifier = Some(percent_decode(child.as_str())?),
            Rule::not_op => negated = true,
            Rule::in_op => {}
            Rule::value_list => {
                for literal in child.into_inner() {
                    values.push(build_literal(literal)?);
                }
            }
            _ => {}
        }
    }

    let identifier =
        identifier.ok_or_else(|| located("membership missing identifier", location))?;
    Ok(FilterExpr::membership(identifier, negated, values))
}

fn build_literal(pair: Pair<Rule>) -> Result<FacetValue, ParseError> {
    let location = pair.line_col();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| located("empty literal", location))?;
    match inner.as_rule() {
        Rule::number => inner
            .as_str()
            .parse::<f64>()
            .map(FacetValue::Number)
            .map_err(|_| located("invalid number literal", location)),
        Rule::boolean => Ok(FacetValue::Bool(inner.as_str() == "true")),
        Rule::string => {
            let quoted = inner.as_str();
            let content = &quoted[1..quoted.len() - 1];
            Ok(FacetValue::String(percent_decode(content)?))
        }
        rule => Err(located(
            &format!("unexpected literal node '{:?}'", rule),
            location,
        )),
    }
}

fn expect<'a>(
    pair: Option<Pair<'a, Rule>>,
    rule: Rule,
    location: (usize, usize),
) -> Result<Pair<'a, Rule>, ParseError> {
    match pair {
        Some(p) if p.as_rule() == rule => Ok(p),
        _ => Err(located(&format!("expected {:?}", rule), location)),
    }
}

fn unexpected(message: &str) -> ParseError {
    ParseError::new(ParseStage::TreeWalk, message)
}

fn located(message: &str, (line, column): (usize, usize)) -> ParseError {
    unexpected(message).at(line.saturating_sub(1), column.saturating_sub(1))
}
