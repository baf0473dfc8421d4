//! Filter-state store
//!
//! Holds per-attribute inclusion state over bin labels and ranges. Absence
//! of an entry means "no filter" (every bin included); exclusions are stored
//! as normalized range lists for ordinal bins and label lists for
//! categorical bins, with an allow-list mode (`include_values`) that is
//! mutually exclusive with the deny-list. Every mutation notifies
//! subscribers, prunes empty entries, and leaves the store consistent from
//! the caller's perspective.
//!
//! The store serializes to the textual filter grammar and runs the full
//! build → parse → decode → annotate pipeline to produce the wire AST.

use std::collections::BTreeMap;

use tracing::debug;

use crate::expr::{self, percent_encode, FilterExpr};
use crate::histogram::{Bin, FacetValue, Histogram, NULL_LABEL};
use crate::rangeset::{self, Range};
use crate::schema::AttributeSchema;
use crate::Result;

/// Derived inclusion state of one bin under the current filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinStatus {
    Included,
    Excluded,
    /// An ordinal bin whose extent is partly covered by excluded ranges
    Partial,
}

/// Change notification emitted after every mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    /// One attribute's filter spec changed
    Attribute(String),
    /// Any change; always follows the attribute-scoped notification
    All,
}

/// Per-attribute filter spec. `include_values` and `exclude_values` never
/// coexist: switching modes drops the other list.
#[derive(Debug, Clone, Default, PartialEq)]
struct AttrFilter {
    exclude_ranges: Vec<Range<FacetValue>>,
    include_values: Option<Vec<String>>,
    exclude_values: Vec<String>,
    exclude_attribute: bool,
}

impl AttrFilter {
    fn is_empty(&self) -> bool {
        self.exclude_ranges.is_empty()
            && self.include_values.is_none()
            && self.exclude_values.is_empty()
            && !self.exclude_attribute
    }
}

/// The filter-state store
pub struct FilterStore {
    schema: AttributeSchema,
    specs: BTreeMap<String, AttrFilter>,
    listeners: Vec<Box<dyn Fn(&FilterChange)>>,
}

impl FilterStore {
    /// Empty store: every bin of every attribute starts included
    pub fn new(schema: AttributeSchema) -> Self {
        Self {
            schema,
            specs: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Seed from the complete-facet histogram. Semantically identical to
    /// [`new`](Self::new) (absence of an entry already means "all
    /// included"); additionally verifies that every histogram attribute has
    /// a schema entry, which is the place configuration errors surface
    /// first.
    pub fn from_histogram(schema: AttributeSchema, histogram: &Histogram) -> Result<Self> {
        for attribute in histogram.attributes() {
            schema.get(attribute)?;
        }
        Ok(Self::new(schema))
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Register a change listener. The core is single-threaded; listeners
    /// run synchronously at the end of each mutation.
    pub fn subscribe(&mut self, listener: impl Fn(&FilterChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&self, attribute: &str) {
        debug!(attribute, "filter state changed");
        let scoped = FilterChange::Attribute(attribute.to_string());
        for listener in &self.listeners {
            listener(&scoped);
        }
        for listener in &self.listeners {
            listener(&FilterChange::All);
        }
    }

    /// Prune-then-notify epilogue shared by every mutation
    fn finish_mutation(&mut self, attribute: &str) {
        if self.specs.get(attribute).is_some_and(AttrFilter::is_empty) {
            self.specs.remove(attribute);
        }
        self.notify(attribute);
    }

    fn spec_mut(&mut self, attribute: &str) -> Result<&mut AttrFilter> {
        self.schema.get(attribute)?;
        Ok(self.specs.entry(attribute.to_string()).or_default())
    }

    /// Whether any attribute currently has an active filter
    pub fn is_unfiltered(&self) -> bool {
        self.specs.is_empty()
    }

    // -------------------------------------------------------------------------
    // Bin status
    // -------------------------------------------------------------------------

    /// Derive the inclusion state of a bin under the current filter
    pub fn bin_status(&self, attribute: &str, bin: &Bin) -> Result<BinStatus> {
        let descriptor = self.schema.get(attribute)?;
        let Some(spec) = self.specs.get(attribute) else {
            return Ok(BinStatus::Included);
        };
        if spec.exclude_attribute {
            return Ok(BinStatus::Excluded);
        }

        let label = bin.label();
        if spec.exclude_values.iter().any(|l| l == &label) {
            return Ok(BinStatus::Excluded);
        }
        if let Some(include) = &spec.include_values {
            if !include.iter().any(|l| l == &label) {
                return Ok(BinStatus::Excluded);
            }
        }

        if let Some(extent) = bin.extent() {
            if !spec.exclude_ranges.is_empty() {
                let cmp = descriptor.comparator();
                let remaining =
                    rangeset::subtract(vec![extent.clone()], &spec.exclude_ranges, &cmp);
                return Ok(if remaining == vec![extent] {
                    BinStatus::Included
                } else if remaining.is_empty() {
                    BinStatus::Excluded
                } else {
                    BinStatus::Partial
                });
            }
        }
        Ok(BinStatus::Included)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Re-include a previously excluded bin label
    pub fn include_value(&mut self, attribute: &str, label: &str) -> Result<()> {
        let spec = self.spec_mut(attribute)?;
        spec.include_values = None;
        spec.exclude_values.retain(|l| l != label);
        self.finish_mutation(attribute);
        Ok(())
    }

    /// Exclude a bin label
    pub fn remove_value(&mut self, attribute: &str, label: &str) -> Result<()> {
        let spec = self.spec_mut(attribute)?;
        spec.include_values = None;
        if !spec.exclude_values.iter().any(|l| l == label) {
            spec.exclude_values.push(label.to_string());
        }
        self.finish_mutation(attribute);
        Ok(())
    }

    /// Re-include a range by subtracting it from the excluded ranges
    pub fn include_range(
        &mut self,
        attribute: &str,
        low: Option<FacetValue>,
        high: Option<FacetValue>,
    ) -> Result<()> {
        let cmp = self.schema.get(attribute)?.comparator();
        let spec = self.spec_mut(attribute)?;
        let ranges = std::mem::take(&mut spec.exclude_ranges);
        spec.exclude_ranges = rangeset::subtract(ranges, &[Range { low, high }], &cmp);
        self.finish_mutation(attribute);
        Ok(())
    }

    /// Exclude a range by merging it into the excluded ranges
    pub fn remove_range(
        &mut self,
        attribute: &str,
        low: Option<FacetValue>,
        high: Option<FacetValue>,
    ) -> Result<()> {
        let cmp = self.schema.get(attribute)?.comparator();
        let spec = self.spec_mut(attribute)?;
        let ranges = std::mem::take(&mut spec.exclude_ranges);
        spec.exclude_ranges = rangeset::union(ranges, vec![Range { low, high }], &cmp);
        self.finish_mutation(attribute);
        Ok(())
    }

    /// Keep only `[low, high)`: the excluded ranges become the complement
    pub fn select_range(
        &mut self,
        attribute: &str,
        low: FacetValue,
        high: FacetValue,
    ) -> Result<()> {
        let spec = self.spec_mut(attribute)?;
        *spec = AttrFilter {
            exclude_ranges: vec![Range::below(low), Range::at_least(high)],
            ..AttrFilter::default()
        };
        self.finish_mutation(attribute);
        Ok(())
    }

    /// Keep only the given labels (exclusive allow-list)
    pub fn select_values(&mut self, attribute: &str, labels: Vec<String>) -> Result<()> {
        let spec = self.spec_mut(attribute)?;
        spec.exclude_values.clear();
        spec.include_values = Some(labels);
        self.finish_mutation(attribute);
        Ok(())
    }

    /// Exclude or re-include the whole attribute
    pub fn set_attribute_excluded(&mut self, attribute: &str, excluded: bool) -> Result<()> {
        let spec = self.spec_mut(attribute)?;
        spec.exclude_attribute = excluded;
        self.finish_mutation(attribute);
        Ok(())
    }

    /// Delete the attribute's filter spec entirely: every bin included again
    pub fn clear_filters(&mut self, attribute: &str) -> Result<()> {
        self.schema.get(attribute)?;
        self.specs.remove(attribute);
        self.notify(attribute);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------------

    /// Build the textual boolean filter expression, or `None` when no filter
    /// is active.
    ///
    /// Ordinal exclusions become double-negated range terms (the grammar
    /// only needs `>=` and `<` to express exclusion of a band, including
    /// open-ended ones); value exclusions become membership terms. All
    /// per-attribute terms are joined with `and`. Identifiers and string
    /// literals are percent-hex-encoded.
    pub fn to_expression(&self) -> Option<String> {
        let mut terms: Vec<String> = Vec::new();
        for (attribute, spec) in &self.specs {
            let id = percent_encode(attribute);

            if spec.exclude_attribute {
                // Empty allow-list: matches nothing.
                terms.push(format!("{} in []", id));
                continue;
            }

            for range in &spec.exclude_ranges {
                let term = match (&range.low, &range.high) {
                    (Some(low), Some(high)) => format!(
                        "(not ({} >= {}) or not ({} < {}))",
                        id,
                        literal_text(low),
                        id,
                        literal_text(high)
                    ),
                    (Some(low), None) => format!("not ({} >= {})", id, literal_text(low)),
                    (None, Some(high)) => format!("not ({} < {})", id, literal_text(high)),
                    // An unbounded excluded range excludes every ordinal
                    // value; only the null bucket can survive.
                    (None, None) => format!("{} in [\"{}\"]", id, percent_encode(NULL_LABEL)),
                };
                terms.push(term);
            }

            if let Some(include) = &spec.include_values {
                terms.push(format!("{} in [{}]", id, label_list(include)));
            } else if !spec.exclude_values.is_empty() {
                terms.push(format!("{} not in [{}]", id, label_list(&spec.exclude_values)));
            }
        }

        if terms.is_empty() {
            None
        } else {
            Some(terms.join(" and "))
        }
    }

    /// Produce the wire AST: build the expression text, parse it back with
    /// the grammar, and annotate leaf types from the schema. `None` when no
    /// filter is active.
    pub fn to_ast(&self) -> Result<Option<FilterExpr>> {
        let Some(text) = self.to_expression() else {
            return Ok(None);
        };
        let mut ast = expr::parse_expression(&text)?;
        ast.annotate_types(&self.schema)?;
        Ok(Some(ast))
    }
}

fn literal_text(value: &FacetValue) -> String {
    match value {
        FacetValue::Number(n) => format!("{}", n),
        FacetValue::Bool(b) => format!("{}", b),
        FacetValue::String(s) => format!("\"{}\"", percent_encode(s)),
    }
}

fn label_list(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!("\"{}\"", percent_encode(l)))
        .collect::<Vec<_>>()
        .join(", ")
}
