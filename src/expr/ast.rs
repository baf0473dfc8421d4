//! Filter-expression AST
//!
//! The boolean-expression tree produced from filter state and sent to the
//! aggregation endpoint. Leaves are comparison and membership terms over an
//! attribute identifier; interior nodes are and/or/not. The tree is
//! serde-serializable (the JSON wire form) and re-serializable to the
//! textual grammar via [`FilterExpr::to_query_string`], which must
//! round-trip through the parser.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::histogram::{FacetValue, NULL_LABEL};
use crate::schema::{AttributeSchema, CoerceType};
use crate::Result;

use super::percent_encode;

/// Comparison operator on an ordered attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Lt => "<",
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
        }
    }

    pub fn from_str(token: &str) -> Option<Self> {
        match token {
            ">=" => Some(CmpOp::Ge),
            ">" => Some(CmpOp::Gt),
            "<=" => Some(CmpOp::Le),
            "<" => Some(CmpOp::Lt),
            "=" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            _ => None,
        }
    }
}

/// Comparison leaf: `identifier op value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub identifier: String,
    pub operator: CmpOp,
    pub value: FacetValue,
    /// Coerced type from the schema, annotated after parsing; `None` for
    /// `object`-typed attributes (passthrough, no coercion hint).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub value_type: Option<CoerceType>,
}

/// Membership leaf: `identifier [not] in [values...]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub identifier: String,
    pub negated: bool,
    pub values: Vec<FacetValue>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub value_type: Option<CoerceType>,
}

/// A boolean filter-expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    #[serde(rename = "and")]
    And(Vec<FilterExpr>),
    #[serde(rename = "or")]
    Or(Vec<FilterExpr>),
    #[serde(rename = "not")]
    Not(Box<FilterExpr>),
    #[serde(rename = "comparison")]
    Cmp(Comparison),
    #[serde(rename = "membership")]
    In(Membership),
}

impl FilterExpr {
    /// Comparison leaf without a type annotation
    pub fn cmp(identifier: impl Into<String>, operator: CmpOp, value: impl Into<FacetValue>) -> Self {
        FilterExpr::Cmp(Comparison {
            identifier: identifier.into(),
            operator,
            value: value.into(),
            value_type: None,
        })
    }

    /// Membership leaf without a type annotation
    pub fn membership(
        identifier: impl Into<String>,
        negated: bool,
        values: Vec<FacetValue>,
    ) -> Self {
        FilterExpr::In(Membership {
            identifier: identifier.into(),
            negated,
            values,
            value_type: None,
        })
    }

    /// Conjunction that collapses a single operand to itself
    pub fn and(mut operands: Vec<FilterExpr>) -> Self {
        if operands.len() == 1 {
            operands.pop().unwrap()
        } else {
            FilterExpr::And(operands)
        }
    }

    /// Disjunction that collapses a single operand to itself
    pub fn or(mut operands: Vec<FilterExpr>) -> Self {
        if operands.len() == 1 {
            operands.pop().unwrap()
        } else {
            FilterExpr::Or(operands)
        }
    }

    /// Annotate every leaf with the coerced type of its attribute, looked up
    /// in the schema. Unknown identifiers are a configuration error and fail
    /// fast. `object`-typed attributes are a passthrough and stay untyped.
    pub fn annotate_types(&mut self, schema: &AttributeSchema) -> Result<()> {
        match self {
            FilterExpr::And(operands) | FilterExpr::Or(operands) => {
                for operand in operands {
                    operand.annotate_types(schema)?;
                }
            }
            FilterExpr::Not(operand) => operand.annotate_types(schema)?,
            FilterExpr::Cmp(leaf) => {
                let coerce = schema.get(&leaf.identifier)?.coerce_to_type;
                if leaf.value_type.is_none() && coerce != CoerceType::Object {
                    leaf.value_type = Some(coerce);
                }
            }
            FilterExpr::In(leaf) => {
                let coerce = schema.get(&leaf.identifier)?.coerce_to_type;
                if leaf.value_type.is_none() && coerce != CoerceType::Object {
                    leaf.value_type = Some(coerce);
                }
            }
        }
        Ok(())
    }

    /// Serialize to the textual grammar. Identifiers and string literals are
    /// percent-hex-encoded; parsing the result with
    /// [`super::parse_expression`] yields a structurally equivalent tree
    /// (modulo type annotations, which are re-applied after parsing).
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        match self {
            FilterExpr::And(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" and ");
                    }
                    // or binds looser than and, so an or operand needs parens
                    if matches!(operand, FilterExpr::Or(_)) {
                        out.push('(');
                        operand.write(out);
                        out.push(')');
                    } else {
                        operand.write(out);
                    }
                }
            }
            FilterExpr::Or(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" or ");
                    }
                    operand.write(out);
                }
            }
            FilterExpr::Not(operand) => {
                out.push_str("not (");
                operand.write(out);
                out.push(')');
            }
            FilterExpr::Cmp(leaf) => {
                out.push_str(&percent_encode(&leaf.identifier));
                out.push(' ');
                out.push_str(leaf.operator.as_str());
                out.push(' ');
                write_literal(&leaf.value, out);
            }
            FilterExpr::In(leaf) => {
                out.push_str(&percent_encode(&leaf.identifier));
                if leaf.negated {
                    out.push_str(" not in [");
                } else {
                    out.push_str(" in [");
                }
                for (i, value) in leaf.values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_literal(value, out);
                }
                out.push(']');
            }
        }
    }

    /// Evaluate against a single record. `lookup` returns the coerced value
    /// for an attribute identifier, or `None` when the record has no usable
    /// value (which compares as false and carries the `__null__` label in
    /// membership tests).
    pub fn matches<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<FacetValue>,
    {
        match self {
            FilterExpr::And(operands) => operands.iter().all(|e| e.matches(lookup)),
            FilterExpr::Or(operands) => operands.iter().any(|e| e.matches(lookup)),
            FilterExpr::Not(operand) => !operand.matches(lookup),
            FilterExpr::Cmp(leaf) => match lookup(&leaf.identifier) {
                None => false,
                Some(value) => {
                    let ordering = FacetValue::natural_cmp(&value, &leaf.value);
                    match leaf.operator {
                        CmpOp::Ge => ordering != Ordering::Less,
                        CmpOp::Gt => ordering == Ordering::Greater,
                        CmpOp::Le => ordering != Ordering::Greater,
                        CmpOp::Lt => ordering == Ordering::Less,
                        CmpOp::Eq => ordering == Ordering::Equal,
                        CmpOp::Ne => ordering != Ordering::Equal,
                    }
                }
            },
            FilterExpr::In(leaf) => {
                let label = match lookup(&leaf.identifier) {
                    Some(value) => value.to_string(),
                    None => NULL_LABEL.to_string(),
                };
                let contained = leaf.values.iter().any(|v| v.to_string() == label);
                contained != leaf.negated
            }
        }
    }
}

fn write_literal(value: &FacetValue, out: &mut String) {
    match value {
        FacetValue::Number(n) => out.push_str(&format!("{}", n)),
        FacetValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        FacetValue::String(s) => {
            out.push('"');
            out.push_str(&percent_encode(s));
            out.push('"');
        }
    }
}
