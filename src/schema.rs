//! Attribute schema
//!
//! Static per-attribute descriptors loaded once at startup: the type every
//! raw record value is coerced to, optional ordinal binning parameters, and
//! an optional interpretation override. Every attribute referenced by a
//! histogram or a filter must have an entry here; lookups of unknown
//! identifiers fail fast rather than being ignored.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::histogram::FacetValue;
use crate::{FacetError, Result};

/// Three-way comparator used wherever bin bounds are compared
pub type BoundCmp = fn(&FacetValue, &FacetValue) -> Ordering;

/// Lexicographic ordering over the display form of a value, used for
/// string-typed attributes.
pub fn lexicographic_cmp(a: &FacetValue, b: &FacetValue) -> Ordering {
    match (a, b) {
        (FacetValue::String(x), FacetValue::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Target type for raw record values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoerceType {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    ObjectId,
    Object,
}

impl CoerceType {
    /// Wire name as it appears in schema JSON and AST type annotations
    pub fn as_str(&self) -> &'static str {
        match self {
            CoerceType::String => "string",
            CoerceType::Number => "number",
            CoerceType::Integer => "integer",
            CoerceType::Boolean => "boolean",
            CoerceType::Date => "date",
            CoerceType::ObjectId => "objectid",
            CoerceType::Object => "object",
        }
    }
}

/// Override for how an attribute's bins are laid out and filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpretation {
    Ordinal,
    Categorical,
}

/// One attribute descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub coerce_to_type: CoerceType,
    /// Lower edge of the ordinal binning span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_bound: Option<f64>,
    /// Upper edge of the ordinal binning span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_bound: Option<f64>,
    /// Number of equal-width partitions across the span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_bins: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<Interpretation>,
    /// Values routed to their own categorical bucket even on ordinal
    /// attributes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_bins: Vec<String>,
}

impl Attribute {
    /// Minimal categorical attribute of the given type
    pub fn categorical(coerce_to_type: CoerceType) -> Self {
        Self {
            coerce_to_type,
            low_bound: None,
            high_bound: None,
            num_bins: None,
            interpretation: None,
            special_bins: Vec::new(),
        }
    }

    /// Ordinal attribute binned into `num_bins` equal-width partitions over
    /// `[low, high]`
    pub fn ordinal(coerce_to_type: CoerceType, low: f64, high: f64, num_bins: usize) -> Self {
        Self {
            coerce_to_type,
            low_bound: Some(low),
            high_bound: Some(high),
            num_bins: Some(num_bins),
            interpretation: None,
            special_bins: Vec::new(),
        }
    }

    /// Effective interpretation: the explicit override when present,
    /// otherwise ordinal exactly when binning parameters are configured.
    pub fn interpretation(&self) -> Interpretation {
        if let Some(interpretation) = self.interpretation {
            return interpretation;
        }
        if self.low_bound.is_some() && self.high_bound.is_some() && self.num_bins.is_some() {
            Interpretation::Ordinal
        } else {
            Interpretation::Categorical
        }
    }

    pub fn is_ordinal(&self) -> bool {
        self.interpretation() == Interpretation::Ordinal
    }

    /// Comparator for this attribute's bin bounds: lexicographic for
    /// string-like types, natural (numeric) otherwise.
    pub fn comparator(&self) -> BoundCmp {
        match self.coerce_to_type {
            CoerceType::String | CoerceType::ObjectId | CoerceType::Date => lexicographic_cmp,
            _ => FacetValue::natural_cmp,
        }
    }
}

/// The complete attribute table, keyed by dotted-path identifier
/// (e.g. `meta.clinical.age`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSchema {
    attributes: HashMap<String, Attribute>,
}

impl AttributeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a schema from its configuration JSON object
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| FacetError::SchemaError(format!("invalid attribute schema: {}", e)))
    }

    pub fn insert(&mut self, identifier: impl Into<String>, attribute: Attribute) {
        self.attributes.insert(identifier.into(), attribute);
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.attributes.contains_key(identifier)
    }

    /// Look up an attribute, failing fast on unknown identifiers: the schema
    /// is assumed complete and static, so a miss is a configuration error.
    pub fn get(&self, identifier: &str) -> Result<&Attribute> {
        self.attributes.get(identifier).ok_or_else(|| {
            FacetError::SchemaError(format!("unknown attribute identifier '{}'", identifier))
        })
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
