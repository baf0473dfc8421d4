//! Histogram wire types
//!
//! Defines the typed form of the aggregation endpoint's histogram response:
//! scalar facet values, bins (ordinal interval vs categorical label, decided
//! once at deserialization), and the per-attribute histogram map with its
//! `__passedFilters__` total.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::rangeset::Range;
use crate::{FacetError, Result};

/// Reserved categorical label for missing, malformed, or out-of-span values.
pub const NULL_LABEL: &str = "__null__";

/// Pseudo-attribute whose single "count" bin carries the total number of
/// records matching the current filter.
pub const PASSED_FILTERS: &str = "__passedFilters__";

/// A scalar value appearing in histogram responses: bin bounds, categorical
/// labels, and comparison literals. Bins are numbers/strings only on the
/// wire; booleans appear once coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl FacetValue {
    /// Natural three-way ordering: numbers numerically, strings
    /// lexicographically, booleans false-before-true. Mixed variants order
    /// by kind (number, string, bool) so sorting stays total.
    pub fn natural_cmp(a: &FacetValue, b: &FacetValue) -> Ordering {
        match (a, b) {
            (FacetValue::Number(x), FacetValue::Number(y)) => {
                x.partial_cmp(y).unwrap_or(Ordering::Equal)
            }
            (FacetValue::String(x), FacetValue::String(y)) => x.cmp(y),
            (FacetValue::Bool(x), FacetValue::Bool(y)) => x.cmp(y),
            _ => a.kind_rank().cmp(&b.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            FacetValue::Number(_) => 0,
            FacetValue::String(_) => 1,
            FacetValue::Bool(_) => 2,
        }
    }

    /// Numeric view, when this value is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FacetValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for FacetValue {
    fn from(n: f64) -> Self {
        FacetValue::Number(n)
    }
}

impl From<&str> for FacetValue {
    fn from(s: &str) -> Self {
        FacetValue::String(s.to_string())
    }
}

impl From<String> for FacetValue {
    fn from(s: String) -> Self {
        FacetValue::String(s)
    }
}

impl fmt::Display for FacetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetValue::Bool(b) => write!(f, "{}", b),
            FacetValue::Number(n) => write!(f, "{}", n),
            FacetValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// One count bucket for an attribute.
///
/// The variant is decided once when the aggregation response is
/// deserialized: a bin with both bounds is ordinal (half-open
/// `[low, high)`; the last bin of a facet is closed on the right by the
/// binning stage), anything else is categorical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bin {
    Ordinal {
        #[serde(rename = "lowBound")]
        low: FacetValue,
        #[serde(rename = "highBound")]
        high: FacetValue,
        count: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        label: Option<String>,
    },
    Categorical {
        label: String,
        count: u64,
    },
}

impl Bin {
    /// Convenience constructor for an ordinal bin with a derived label
    pub fn ordinal(low: impl Into<FacetValue>, high: impl Into<FacetValue>, count: u64) -> Self {
        Bin::Ordinal {
            low: low.into(),
            high: high.into(),
            count,
            label: None,
        }
    }

    /// Convenience constructor for a categorical bin
    pub fn categorical(label: impl Into<String>, count: u64) -> Self {
        Bin::Categorical {
            label: label.into(),
            count,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Bin::Ordinal { count, .. } => *count,
            Bin::Categorical { count, .. } => *count,
        }
    }

    pub fn is_ordinal(&self) -> bool {
        matches!(self, Bin::Ordinal { .. })
    }

    /// Display label: the explicit label when present, otherwise derived
    /// from the interval bounds for ordinal bins.
    pub fn label(&self) -> String {
        match self {
            Bin::Categorical { label, .. } => label.clone(),
            Bin::Ordinal {
                label: Some(label), ..
            } => label.clone(),
            Bin::Ordinal { low, high, .. } => format!("[{} - {})", low, high),
        }
    }

    /// The bin's interval extent; `None` for categorical bins.
    pub fn extent(&self) -> Option<Range<FacetValue>> {
        match self {
            Bin::Ordinal { low, high, .. } => Some(Range::new(low.clone(), high.clone())),
            Bin::Categorical { .. } => None,
        }
    }

    /// True for the reserved missing/unknown bucket
    pub fn is_null_bucket(&self) -> bool {
        matches!(self, Bin::Categorical { label, .. } if label == NULL_LABEL)
    }
}

/// A complete histogram response: ordered bins per attribute plus the
/// `__passedFilters__` record total.
///
/// The server guarantees that within one facet all ordinal bins precede all
/// categorical bins; ingest enforces that so divider computation downstream
/// can rely on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    facets: BTreeMap<String, Vec<Bin>>,
    passed_filters: u64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one attribute's bin sequence, rejecting an ordinal bin that
    /// follows a categorical one.
    pub fn insert_facet(&mut self, attribute: impl Into<String>, bins: Vec<Bin>) -> Result<()> {
        let attribute = attribute.into();
        let mut seen_categorical = false;
        for bin in &bins {
            if bin.is_ordinal() {
                if seen_categorical {
                    return Err(FacetError::SchemaError(format!(
                        "facet '{}': ordinal bin after categorical bin",
                        attribute
                    )));
                }
            } else {
                seen_categorical = true;
            }
        }
        self.facets.insert(attribute, bins);
        Ok(())
    }

    pub fn bins(&self, attribute: &str) -> &[Bin] {
        self.facets.get(attribute).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.facets.keys().map(String::as_str)
    }

    /// The authoritative count of records matching the current filter
    pub fn passed_filters(&self) -> u64 {
        self.passed_filters
    }

    pub fn set_passed_filters(&mut self, count: u64) {
        self.passed_filters = count;
    }

    /// Look up a bin by display label within one facet
    pub fn find_bin(&self, attribute: &str, label: &str) -> Option<&Bin> {
        self.bins(attribute).iter().find(|b| b.label() == label)
    }

    /// Parse an aggregation response object
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let map: BTreeMap<String, Vec<Bin>> = serde_json::from_value(value)
            .map_err(|e| FacetError::ParseError(format!("invalid histogram response: {}", e)))?;
        Self::from_map(map)
    }

    fn from_map(mut map: BTreeMap<String, Vec<Bin>>) -> Result<Self> {
        let passed_filters = map
            .remove(PASSED_FILTERS)
            .and_then(|bins| bins.first().map(Bin::count))
            .unwrap_or(0);
        let mut histogram = Histogram {
            facets: BTreeMap::new(),
            passed_filters,
        };
        for (attribute, bins) in map {
            histogram.insert_facet(attribute, bins)?;
        }
        Ok(histogram)
    }

    /// Serialize back to the flat response object
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (attribute, bins) in &self.facets {
            map.insert(
                attribute.clone(),
                serde_json::to_value(bins).expect("bins serialize"),
            );
        }
        map.insert(
            PASSED_FILTERS.to_string(),
            serde_json::json!([{ "label": "count", "count": self.passed_filters }]),
        );
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bin_variant_decided_at_parse_time() {
        let bins: Vec<Bin> = serde_json::from_value(json!([
            {"lowBound": 0.0, "highBound": 10.0, "count": 5},
            {"label": "__null__", "count": 2}
        ]))
        .unwrap();
        assert!(bins[0].is_ordinal());
        assert!(!bins[1].is_ordinal());
        assert!(bins[1].is_null_bucket());
        assert_eq!(bins[0].label(), "[0 - 10)");
    }

    #[test]
    fn test_histogram_response_round_trip() {
        let response = json!({
            "meta.clinical.age": [
                {"lowBound": 0.0, "highBound": 10.0, "count": 5},
                {"lowBound": 10.0, "highBound": 20.0, "count": 3},
                {"label": "__null__", "count": 2}
            ],
            "__passedFilters__": [{"label": "count", "count": 10}]
        });
        let histogram = Histogram::from_value(response).unwrap();
        assert_eq!(histogram.passed_filters(), 10);
        assert_eq!(histogram.bins("meta.clinical.age").len(), 3);

        let back = Histogram::from_value(histogram.to_value()).unwrap();
        assert_eq!(back, histogram);
    }

    #[test]
    fn test_ordinal_after_categorical_rejected() {
        let response = json!({
            "bad": [
                {"label": "x", "count": 1},
                {"lowBound": 0.0, "highBound": 1.0, "count": 1}
            ]
        });
        assert!(Histogram::from_value(response).is_err());
    }

    #[test]
    fn test_facet_value_ordering() {
        use FacetValue::*;
        assert_eq!(
            FacetValue::natural_cmp(&Number(1.0), &Number(2.0)),
            Ordering::Less
        );
        assert_eq!(
            FacetValue::natural_cmp(&String("a".into()), &String("b".into())),
            Ordering::Less
        );
        assert_eq!(FacetValue::natural_cmp(&Bool(false), &Bool(true)), Ordering::Less);
    }
}
