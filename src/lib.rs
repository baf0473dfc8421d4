/*!
# gallery-facets - Faceted filtering & histogram binning

The framework-free core of a faceted image-gallery browser: per-attribute
histograms with ordinal and categorical bins, a filter-state store that turns
bin/range toggles into a boolean filter expression, and the server-side
binning stage that recomputes histograms under that filter.

## Example

```rust
use gallery_facets::{Attribute, AttributeSchema, CoerceType, FacetValue, FilterStore};

# fn main() -> gallery_facets::Result<()> {
let mut schema = AttributeSchema::new();
schema.insert("meta.clinical.age", Attribute::ordinal(CoerceType::Number, 0.0, 90.0, 9));

let mut filters = FilterStore::new(schema);
filters.remove_range(
    "meta.clinical.age",
    Some(FacetValue::Number(0.0)),
    Some(FacetValue::Number(20.0)),
)?;

let ast = filters.to_ast()?.expect("a filter is active");
let wire = serde_json::to_value(&ast).unwrap();
# let _ = wire;
# Ok(())
# }
```

## Architecture

Data flows in a loop between the browser-side state and the aggregation
endpoint:

1. the aggregation pass ([`binning`]) scans records and emits per-bin counts
   plus the `__passedFilters__` total;
2. [`HistogramScale`](scale::HistogramScale) lays the bins out for drawing;
3. user toggles mutate the [`FilterStore`](filters::FilterStore), which keeps
   excluded ranges normalized through [`rangeset`];
4. the store serializes its state to the filter grammar ([`expr`]), parses it
   back into a typed AST, annotates leaf types from the [`schema`], and the
   AST is sent back to the aggregation pass.

The core is single-threaded and does no I/O; rendering, transport, and
storage are external consumers of these types.

## Core Components

- [`rangeset`] - interval-set algebra over half-open ranges
- [`histogram`] - wire types for bins and histogram responses
- [`schema`] - static attribute descriptors and coercion types
- [`scale`] - bin layout geometry for rendering
- [`filters`] - the filter-state store and its serializer
- [`expr`] - the filter-expression grammar, parser, and AST
- [`binning`] - the aggregation endpoint's binning stage
*/

pub mod binning;
pub mod expr;
pub mod filters;
pub mod histogram;
pub mod rangeset;
pub mod scale;
pub mod schema;

// Re-export key types for convenience
pub use binning::bin_records;
pub use expr::{CmpOp, FilterExpr};
pub use filters::{BinStatus, FilterChange, FilterStore};
pub use histogram::{Bin, FacetValue, Histogram, NULL_LABEL, PASSED_FILTERS};
pub use rangeset::Range;
pub use scale::{BinRect, HistogramKind, HistogramScale};
pub use schema::{Attribute, AttributeSchema, CoerceType, Interpretation};

/// Main library error type
#[derive(thiserror::Error, Debug)]
pub enum FacetError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, FacetError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::{json, Value};

    fn clinical_schema() -> AttributeSchema {
        let mut schema = AttributeSchema::new();
        schema.insert(
            "meta.clinical.age",
            Attribute::ordinal(CoerceType::Number, 0.0, 90.0, 9),
        );
        schema.insert(
            "meta.clinical.sex",
            Attribute::categorical(CoerceType::String),
        );
        schema
    }

    fn patient(age: Value, sex: Value) -> Value {
        json!({"meta": {"clinical": {"age": age, "sex": sex}}})
    }

    /// Records shaped so the overview histogram matches the documented
    /// scenario: ages spread over 10-year bins plus two records with no
    /// usable age.
    fn scenario_records() -> Vec<Value> {
        let mut records = Vec::new();
        for age in [2, 4, 6, 8, 9] {
            records.push(patient(json!(age), json!("male")));
        }
        for age in [12, 15, 18] {
            records.push(patient(json!(age), json!("female")));
        }
        for age in [25, 44, 61] {
            records.push(patient(json!(age), json!("female")));
        }
        records.push(patient(json!(null), json!("male")));
        records.push(patient(json!("unknown"), json!("female")));
        records
    }

    #[test]
    fn test_age_scenario_range_merge_and_server_round_trip() {
        let schema = clinical_schema();
        let records = scenario_records();

        let overview = bin_records(&records, &schema, None).unwrap();
        let age_bins = overview.bins("meta.clinical.age");
        assert_eq!(age_bins[0].count(), 5); // [0, 10)
        assert_eq!(age_bins[1].count(), 3); // [10, 20)
        let null_bin = age_bins.iter().find(|b| b.is_null_bucket()).unwrap();
        assert_eq!(null_bin.count(), 2);

        let mut filters = FilterStore::from_histogram(schema.clone(), &overview).unwrap();
        // Exclude [0, 10) then [10, 20): the two ranges merge into one.
        filters
            .remove_range(
                "meta.clinical.age",
                Some(FacetValue::Number(0.0)),
                Some(FacetValue::Number(10.0)),
            )
            .unwrap();
        filters
            .remove_range(
                "meta.clinical.age",
                Some(FacetValue::Number(10.0)),
                Some(FacetValue::Number(20.0)),
            )
            .unwrap();

        // A synthetic bin straddling the merged range is fully excluded.
        let straddling = Bin::ordinal(5.0, 15.0, 0);
        assert_eq!(
            filters.bin_status("meta.clinical.age", &straddling).unwrap(),
            BinStatus::Excluded
        );

        // Exactly the two excluded bins are marked; the null bucket is not.
        for bin in age_bins {
            let status = filters.bin_status("meta.clinical.age", bin).unwrap();
            let extent_low = bin.extent().and_then(|r| r.low.and_then(|v| v.as_number()));
            match extent_low {
                Some(low) if low < 20.0 => assert_eq!(status, BinStatus::Excluded),
                _ => assert_eq!(status, BinStatus::Included),
            }
        }

        // Applying the AST server-side drains exactly those bins.
        let ast = filters.to_ast().unwrap().unwrap();
        let filtered = bin_records(&records, &schema, Some(&ast)).unwrap();
        let filtered_bins = filtered.bins("meta.clinical.age");
        assert_eq!(filtered_bins[0].count(), 0);
        assert_eq!(filtered_bins[1].count(), 0);
        assert_eq!(filtered_bins[2].count(), 1);
        let null_bin = filtered_bins.iter().find(|b| b.is_null_bucket()).unwrap();
        assert_eq!(null_bin.count(), 2);
        assert_eq!(filtered.passed_filters(), 5);
    }

    #[test]
    fn test_sex_scenario_membership_exclusion() {
        let schema = clinical_schema();

        let mut records = Vec::new();
        for _ in 0..40 {
            records.push(patient(json!(30), json!("male")));
        }
        for _ in 0..55 {
            records.push(patient(json!(30), json!("female")));
        }
        for _ in 0..5 {
            records.push(patient(json!(30), json!(null)));
        }

        let overview = bin_records(&records, &schema, None).unwrap();
        assert_eq!(
            overview.find_bin("meta.clinical.sex", "male").unwrap().count(),
            40
        );
        assert_eq!(
            overview.find_bin("meta.clinical.sex", "female").unwrap().count(),
            55
        );

        let mut filters = FilterStore::from_histogram(schema.clone(), &overview).unwrap();
        filters.remove_value("meta.clinical.sex", "male").unwrap();
        filters.remove_value("meta.clinical.sex", "female").unwrap();

        // Only the null bucket stays included.
        assert_eq!(
            filters
                .bin_status("meta.clinical.sex", &Bin::categorical(NULL_LABEL, 5))
                .unwrap(),
            BinStatus::Included
        );

        let ast = filters.to_ast().unwrap().unwrap();
        match &ast {
            FilterExpr::In(leaf) => {
                assert!(leaf.negated);
                assert_eq!(
                    leaf.values,
                    vec![FacetValue::from("male"), FacetValue::from("female")]
                );
            }
            other => panic!("expected a membership exclusion, got {:?}", other),
        }

        let filtered = bin_records(&records, &schema, Some(&ast)).unwrap();
        assert_eq!(filtered.passed_filters(), 5);
    }

    #[test]
    fn test_filter_loop_with_scale_layout() {
        // The full browser loop: aggregate, lay out, toggle, re-aggregate.
        let schema = clinical_schema();
        let records = scenario_records();
        let overview = bin_records(&records, &schema, None).unwrap();

        let mut scale = HistogramScale::new();
        scale.update(overview.bins("meta.clinical.age"), &[], 10.0, 400.0);
        scale.set_height(120.0);
        assert_eq!(scale.divider_index(), 9);

        // Click on the first bar: translate its position back to a bin and
        // exclude that bin's extent.
        let clicked = scale.position_to_bin(scale.bin_to_position(0));
        assert_eq!(clicked, 0);

        let mut filters = FilterStore::from_histogram(schema.clone(), &overview).unwrap();
        filters
            .remove_range(
                "meta.clinical.age",
                Some(FacetValue::Number(0.0)),
                Some(FacetValue::Number(10.0)),
            )
            .unwrap();

        let ast = filters.to_ast().unwrap().unwrap();
        let filtered = bin_records(&records, &schema, Some(&ast)).unwrap();
        scale.update(
            overview.bins("meta.clinical.age"),
            filtered.bins("meta.clinical.age"),
            10.0,
            400.0,
        );
        scale.set_height(120.0);

        let overview_rect = scale.get_bin_rect("[0 - 10)", HistogramKind::Overview).unwrap();
        let filtered_rect = scale
            .get_bin_rect("[0 - 10)", HistogramKind::FilteredSet)
            .unwrap();
        assert!(overview_rect.height > 0.0);
        assert_eq!(filtered_rect.height, 0.0);
    }

    #[test]
    fn test_ast_wire_form_round_trips_through_json() {
        let schema = clinical_schema();
        let mut filters = FilterStore::new(schema);
        filters.remove_value("meta.clinical.sex", "male").unwrap();
        filters
            .remove_range(
                "meta.clinical.age",
                Some(FacetValue::Number(0.0)),
                Some(FacetValue::Number(10.0)),
            )
            .unwrap();

        let ast = filters.to_ast().unwrap().unwrap();
        let wire = serde_json::to_value(&ast).unwrap();
        let back: FilterExpr = serde_json::from_value(wire).unwrap();
        assert_eq!(back, ast);
    }
}
