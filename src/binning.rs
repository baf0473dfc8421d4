//! Histogram aggregation
//!
//! The binning stage of the aggregation endpoint, structured as a map phase
//! (per record and attribute: extract the dotted-path value, coerce it to
//! the attribute's declared type, compute its bin) and a reduce phase
//! (sum emissions by attribute and bin). Coercion failures and out-of-span
//! values never abort the pass; they land in the reserved `__null__`
//! bucket. Every passing record also increments the `__passedFilters__`
//! total, which is how the record count comes out of the same scan.
//!
//! `bin_records` optionally applies a [`FilterExpr`] so the filtered-set
//! histogram is produced by the same code path as the overview histogram.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::trace;

use crate::expr::FilterExpr;
use crate::histogram::{Bin, FacetValue, Histogram, NULL_LABEL};
use crate::schema::{Attribute, AttributeSchema, CoerceType};
use crate::Result;

/// Bin identity during the reduce phase: an ordinal partition index or a
/// categorical label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum BinKey {
    Ordinal(usize),
    Categorical(String),
}

/// Walk a dotted path (`meta.clinical.age`) into a JSON record
fn extract_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Coerce a raw JSON value to the attribute's declared type.
///
/// `None` means the value is missing or un-coercible and belongs in the
/// `__null__` bucket; coercion never raises an error.
fn coerce(value: &Value, target: CoerceType) -> Option<FacetValue> {
    if value.is_null() {
        return None;
    }
    match target {
        CoerceType::String | CoerceType::ObjectId => match value {
            Value::String(s) => Some(FacetValue::String(s.clone())),
            Value::Number(n) => Some(FacetValue::String(n.to_string())),
            Value::Bool(b) => Some(FacetValue::String(b.to_string())),
            _ => None,
        },
        CoerceType::Number => match value {
            Value::Number(n) => n.as_f64().map(FacetValue::Number),
            Value::String(s) => s.trim().parse::<f64>().ok().map(FacetValue::Number),
            Value::Bool(b) => Some(FacetValue::Number(if *b { 1.0 } else { 0.0 })),
            _ => None,
        },
        CoerceType::Integer => match value {
            Value::Number(n) => n.as_f64().map(|f| FacetValue::Number(f.trunc())),
            Value::String(s) => s.trim().parse::<i64>().ok().map(|i| FacetValue::Number(i as f64)),
            _ => None,
        },
        CoerceType::Boolean => match value {
            Value::Bool(b) => Some(FacetValue::Bool(*b)),
            Value::String(s) => match s.as_str() {
                "true" => Some(FacetValue::Bool(true)),
                "false" => Some(FacetValue::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        CoerceType::Date => {
            // Normalize to ISO date strings so lexicographic comparison
            // matches chronological order.
            let s = value.as_str()?;
            let prefix = s.get(..10).unwrap_or(s);
            let date = NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;
            Some(FacetValue::String(date.format("%Y-%m-%d").to_string()))
        }
        CoerceType::Object => Some(FacetValue::String(value.to_string())),
    }
}

/// Compute the bin for a coerced value under one attribute's configuration
fn bin_key(attribute: &Attribute, value: Option<&FacetValue>) -> BinKey {
    let Some(value) = value else {
        return BinKey::Categorical(NULL_LABEL.to_string());
    };

    let label = value.to_string();
    if attribute.special_bins.iter().any(|s| s == &label) {
        return BinKey::Categorical(label);
    }

    if attribute.is_ordinal() {
        let (Some(low), Some(high), Some(num_bins)) = (
            attribute.low_bound,
            attribute.high_bound,
            attribute.num_bins,
        ) else {
            return BinKey::Categorical(label);
        };
        let Some(v) = value.as_number() else {
            return BinKey::Categorical(NULL_LABEL.to_string());
        };
        if v < low || v > high || num_bins == 0 {
            return BinKey::Categorical(NULL_LABEL.to_string());
        }
        let width = (high - low) / num_bins as f64;
        // The last bin is closed on the right.
        let index = (((v - low) / width).floor() as usize).min(num_bins - 1);
        BinKey::Ordinal(index)
    } else {
        BinKey::Categorical(label)
    }
}

/// Scan records and aggregate per-bin counts for every schema attribute.
///
/// When `filter` is given, records it rejects contribute nothing, so the
/// result is the filtered-set histogram; with no filter this produces the
/// overview histogram. Each invocation is independent and idempotent for
/// the same (records, filter) pair.
pub fn bin_records(
    records: &[Value],
    schema: &AttributeSchema,
    filter: Option<&FilterExpr>,
) -> Result<Histogram> {
    let mut counts: BTreeMap<(String, BinKey), u64> = BTreeMap::new();
    let mut passed: u64 = 0;

    for record in records {
        if let Some(filter) = filter {
            let lookup = |identifier: &str| {
                schema.get(identifier).ok().and_then(|attribute| {
                    extract_path(record, identifier)
                        .and_then(|raw| coerce(raw, attribute.coerce_to_type))
                })
            };
            if !filter.matches(&lookup) {
                continue;
            }
        }
        passed += 1;

        // Map phase: one emission per (attribute, bin).
        for identifier in schema.identifiers() {
            let attribute = schema.get(identifier)?;
            let value = extract_path(record, identifier)
                .and_then(|raw| coerce(raw, attribute.coerce_to_type));
            if value.is_none() {
                trace!(identifier, "value missing or un-coercible, using null bucket");
            }
            let key = bin_key(attribute, value.as_ref());
            // Reduce phase: sum by (attribute, bin).
            *counts.entry((identifier.to_string(), key)).or_insert(0) += 1;
        }
    }

    assemble(schema, counts, passed)
}

/// Turn reduced counts into the ordered wire histogram: every configured
/// ordinal partition (zero counts included), then categorical bins sorted
/// by label with `__null__` last.
fn assemble(
    schema: &AttributeSchema,
    counts: BTreeMap<(String, BinKey), u64>,
    passed: u64,
) -> Result<Histogram> {
    let mut histogram = Histogram::new();
    histogram.set_passed_filters(passed);

    for identifier in schema.identifiers() {
        let attribute = schema.get(identifier)?;
        let mut bins = Vec::new();

        if attribute.is_ordinal() {
            if let (Some(low), Some(high), Some(num_bins)) = (
                attribute.low_bound,
                attribute.high_bound,
                attribute.num_bins,
            ) {
                let width = (high - low) / num_bins as f64;
                for index in 0..num_bins {
                    let count = counts
                        .get(&(identifier.to_string(), BinKey::Ordinal(index)))
                        .copied()
                        .unwrap_or(0);
                    bins.push(Bin::ordinal(
                        low + width * index as f64,
                        low + width * (index + 1) as f64,
                        count,
                    ));
                }
            }
        }

        let mut categorical: Vec<(&str, u64)> = counts
            .iter()
            .filter_map(|((id, key), count)| match key {
                BinKey::Categorical(label) if id == identifier => {
                    Some((label.as_str(), *count))
                }
                _ => None,
            })
            .collect();
        // BTreeMap iteration is already label-sorted; move __null__ last.
        categorical.sort_by_key(|(label, _)| *label == NULL_LABEL);
        for (label, count) in categorical {
            bins.push(Bin::categorical(label, count));
        }

        if !bins.is_empty() {
            histogram.insert_facet(identifier, bins)?;
        }
    }
    Ok(histogram)
}
