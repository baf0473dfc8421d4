//! Interval-set algebra over half-open ranges
//!
//! Provides pure functions for combining lists of `[low, high)` ranges:
//! normalization (sort, drop inverted, merge overlapping), union,
//! subtraction, and intersection. All operations take an explicit three-way
//! comparator so the same code serves numeric and lexicographic bounds.
//!
//! A range with an absent `low` bound extends to −∞, an absent `high` bound
//! to +∞, and the empty range `{}` covers everything.

use std::cmp::Ordering;

/// A half-open interval `[low, high)`, possibly unbounded on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct Range<T> {
    /// Inclusive lower bound; `None` means unbounded below.
    pub low: Option<T>,
    /// Exclusive upper bound; `None` means unbounded above.
    pub high: Option<T>,
}

impl<T> Range<T> {
    /// Create a bounded range `[low, high)`
    pub fn new(low: T, high: T) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    /// Create a range covering everything
    pub fn unbounded() -> Self {
        Self {
            low: None,
            high: None,
        }
    }

    /// Ray `[low, +∞)`
    pub fn at_least(low: T) -> Self {
        Self {
            low: Some(low),
            high: None,
        }
    }

    /// Ray `(−∞, high)`
    pub fn below(high: T) -> Self {
        Self {
            low: None,
            high: Some(high),
        }
    }
}

/// Compare two lower bounds, treating `None` as −∞
fn cmp_low<T, F>(a: Option<&T>, b: Option<&T>, cmp: &F) -> Ordering
where
    F: Fn(&T, &T) -> Ordering,
{
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => cmp(x, y),
    }
}

/// Compare two upper bounds, treating `None` as +∞
fn cmp_high<T, F>(a: Option<&T>, b: Option<&T>, cmp: &F) -> Ordering
where
    F: Fn(&T, &T) -> Ordering,
{
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => cmp(x, y),
    }
}

/// True when an upper bound reaches (or passes) a lower bound, i.e. the
/// interval ending at `high` overlaps or touches the interval starting at
/// `low`. Either bound absent means unbounded, which always reaches.
fn high_reaches_low<T, F>(high: Option<&T>, low: Option<&T>, cmp: &F) -> bool
where
    F: Fn(&T, &T) -> Ordering,
{
    match (high, low) {
        (None, _) | (_, None) => true,
        (Some(h), Some(l)) => cmp(h, l) != Ordering::Less,
    }
}

/// True when the range is inverted (`high < low`) and therefore empty.
///
/// Inverted ranges are silently dropped during normalization rather than
/// reported as errors.
fn is_inverted<T, F>(range: &Range<T>, cmp: &F) -> bool
where
    F: Fn(&T, &T) -> Ordering,
{
    match (&range.low, &range.high) {
        (Some(low), Some(high)) => cmp(high, low) == Ordering::Less,
        _ => false,
    }
}

/// Normalize a range list: drop inverted ranges, sort by lower bound
/// (ties broken by upper bound), and merge every overlapping or adjacent
/// pair into one range.
///
/// When two ranges merge, the combined range takes the smaller lower bound
/// and the larger upper bound; an absent bound is "more open" and wins.
/// The result is sorted and pairwise disjoint.
pub fn normalize<T, F>(ranges: Vec<Range<T>>, cmp: &F) -> Vec<Range<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    let mut ranges: Vec<Range<T>> = ranges
        .into_iter()
        .filter(|r| !is_inverted(r, cmp))
        .collect();

    ranges.sort_by(|a, b| {
        cmp_low(a.low.as_ref(), b.low.as_ref(), cmp)
            .then_with(|| cmp_high(a.high.as_ref(), b.high.as_ref(), cmp))
    });

    let mut merged: Vec<Range<T>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            // Ranges are sorted by lower bound, so this range overlaps or
            // touches the previous one exactly when the running high reaches
            // this range's low.
            Some(prev) if high_reaches_low(prev.high.as_ref(), range.low.as_ref(), cmp) => {
                if cmp_high(range.high.as_ref(), prev.high.as_ref(), cmp) == Ordering::Greater {
                    prev.high = range.high;
                }
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Union of two range lists: concatenate then normalize.
pub fn union<T, F>(a: Vec<Range<T>>, b: Vec<Range<T>>, cmp: &F) -> Vec<Range<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    let mut all = a;
    all.extend(b);
    normalize(all, cmp)
}

/// Remove a single range from a single range, yielding 0, 1, or 2 fragments.
fn subtract_one<T, F>(a: Range<T>, b: &Range<T>, cmp: &F) -> Vec<Range<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    // No overlap: b ends at or before a starts, or b starts at or after a
    // ends. Unbounded ends always overlap.
    let b_ends_before_a = match (&b.high, &a.low) {
        (Some(bh), Some(al)) => cmp(bh, al) != Ordering::Greater,
        _ => false,
    };
    let b_starts_after_a = match (&b.low, &a.high) {
        (Some(bl), Some(ah)) => cmp(bl, ah) != Ordering::Less,
        _ => false,
    };
    if b_ends_before_a || b_starts_after_a {
        return vec![a];
    }

    let mut fragments = Vec::with_capacity(2);

    // Left fragment [a.low, b.low) survives when b starts after a.
    if cmp_low(b.low.as_ref(), a.low.as_ref(), cmp) == Ordering::Greater {
        fragments.push(Range {
            low: a.low.clone(),
            high: b.low.clone(),
        });
    }
    // Right fragment [b.high, a.high) survives when b ends before a.
    if cmp_high(b.high.as_ref(), a.high.as_ref(), cmp) == Ordering::Less {
        fragments.push(Range {
            low: b.high.clone(),
            high: a.high.clone(),
        });
    }
    fragments
}

/// Subtract range list `b` from range list `a`.
///
/// Every range in `a` is reduced by every overlapping range in `b`; a
/// covering `b` range removes an `a` range entirely, an interior `b` range
/// splits an `a` range into two fragments, and a `b` range overlapping one
/// end truncates. The result is normalized.
pub fn subtract<T, F>(a: Vec<Range<T>>, b: &[Range<T>], cmp: &F) -> Vec<Range<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    let b = normalize(b.to_vec(), cmp);
    let mut result = Vec::new();
    for range in normalize(a, cmp) {
        let mut fragments = vec![range];
        for cut in &b {
            let mut next = Vec::with_capacity(fragments.len());
            for fragment in fragments {
                next.extend(subtract_one(fragment, cut, cmp));
            }
            fragments = next;
            if fragments.is_empty() {
                break;
            }
        }
        result.extend(fragments);
    }
    normalize(result, cmp)
}

/// Intersection of two range lists: pairwise intersect, drop empty results,
/// normalize the survivors.
pub fn intersection<T, F>(a: &[Range<T>], b: &[Range<T>], cmp: &F) -> Vec<Range<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    let mut result = Vec::new();
    for ra in a {
        for rb in b {
            let low = match cmp_low(ra.low.as_ref(), rb.low.as_ref(), cmp) {
                Ordering::Less => rb.low.clone(),
                _ => ra.low.clone(),
            };
            let high = match cmp_high(ra.high.as_ref(), rb.high.as_ref(), cmp) {
                Ordering::Greater => rb.high.clone(),
                _ => ra.high.clone(),
            };
            let candidate = Range { low, high };
            let empty = match (&candidate.low, &candidate.high) {
                (Some(l), Some(h)) => cmp(h, l) != Ordering::Greater,
                _ => false,
            };
            if !empty {
                result.push(candidate);
            }
        }
    }
    normalize(result, cmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(a: &f64, b: &f64) -> Ordering {
        a.partial_cmp(b).unwrap_or(Ordering::Equal)
    }

    fn r(low: f64, high: f64) -> Range<f64> {
        Range::new(low, high)
    }

    #[test]
    fn test_normalize_sorts_and_merges() {
        let input = vec![r(10.0, 20.0), r(0.0, 10.0), r(15.0, 25.0)];
        let result = normalize(input, &num);
        assert_eq!(result, vec![r(0.0, 25.0)]);
    }

    #[test]
    fn test_normalize_keeps_disjoint_ranges() {
        let input = vec![r(20.0, 30.0), r(0.0, 10.0)];
        let result = normalize(input, &num);
        assert_eq!(result, vec![r(0.0, 10.0), r(20.0, 30.0)]);
    }

    #[test]
    fn test_normalize_drops_inverted() {
        let input = vec![r(10.0, 5.0), r(0.0, 1.0)];
        let result = normalize(input, &num);
        assert_eq!(result, vec![r(0.0, 1.0)]);
    }

    #[test]
    fn test_normalize_idempotent() {
        let input = vec![r(5.0, 15.0), r(0.0, 10.0), r(30.0, 40.0)];
        let once = normalize(input, &num);
        let twice = normalize(once.clone(), &num);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_open_bound_wins_merge() {
        let input = vec![Range::below(10.0), r(5.0, 20.0)];
        let result = normalize(input, &num);
        assert_eq!(result, vec![Range::below(20.0)]);

        let input = vec![r(0.0, 10.0), Range::at_least(5.0)];
        let result = normalize(input, &num);
        assert_eq!(result, vec![Range::at_least(0.0)]);
    }

    #[test]
    fn test_union_commutative() {
        let a = vec![r(0.0, 10.0), r(20.0, 30.0)];
        let b = vec![r(5.0, 25.0)];
        assert_eq!(
            union(a.clone(), b.clone(), &num),
            union(b, a, &num)
        );
    }

    #[test]
    fn test_subtract_no_overlap() {
        let a = vec![r(0.0, 10.0)];
        let b = vec![r(20.0, 30.0)];
        assert_eq!(subtract(a.clone(), &b, &num), a);
    }

    #[test]
    fn test_subtract_covering_range_removes() {
        let a = vec![r(5.0, 10.0)];
        let b = vec![r(0.0, 20.0)];
        assert_eq!(subtract(a, &b, &num), vec![]);
    }

    #[test]
    fn test_subtract_splits_range() {
        let a = vec![r(0.0, 30.0)];
        let b = vec![r(10.0, 20.0)];
        assert_eq!(subtract(a, &b, &num), vec![r(0.0, 10.0), r(20.0, 30.0)]);
    }

    #[test]
    fn test_subtract_truncates_one_end() {
        let a = vec![r(0.0, 20.0)];
        let b = vec![r(10.0, 30.0)];
        assert_eq!(subtract(a, &b, &num), vec![r(0.0, 10.0)]);

        let a = vec![r(10.0, 30.0)];
        let b = vec![r(0.0, 20.0)];
        assert_eq!(subtract(a, &b, &num), vec![r(20.0, 30.0)]);
    }

    #[test]
    fn test_subtract_unbounded_cut() {
        let a = vec![r(0.0, 100.0)];
        let b = vec![Range::at_least(50.0)];
        assert_eq!(subtract(a, &b, &num), vec![r(0.0, 50.0)]);
    }

    #[test]
    fn test_subtract_union_leaves_no_overlap() {
        let a = vec![r(0.0, 10.0), r(40.0, 50.0)];
        let b = vec![r(5.0, 45.0)];
        let u = union(a.clone(), b.clone(), &num);
        let diff = subtract(u, &b, &num);
        // What remains must be inside A and disjoint from B.
        assert_eq!(intersection(&diff, &b, &num), vec![]);
        assert_eq!(subtract(diff.clone(), &a, &num), vec![]);
    }

    #[test]
    fn test_intersection_basic() {
        let a = vec![r(0.0, 20.0)];
        let b = vec![r(10.0, 30.0)];
        assert_eq!(intersection(&a, &b, &num), vec![r(10.0, 20.0)]);
    }

    #[test]
    fn test_intersection_disjoint_is_empty() {
        let a = vec![r(0.0, 10.0)];
        let b = vec![r(10.0, 20.0)]; // touching at 10, half-open so empty
        assert_eq!(intersection(&a, &b, &num), vec![]);
    }

    #[test]
    fn test_unbounded_range_intersects_everything() {
        let a = vec![Range::unbounded()];
        let b = vec![r(3.0, 7.0), r(9.0, 11.0)];
        assert_eq!(intersection(&a, &b, &num), b);
        assert_eq!(union(a.clone(), b, &num), a);
    }

    #[test]
    fn test_lexicographic_comparator() {
        let lex = |a: &String, b: &String| a.cmp(b);
        let a = vec![Range::new("apple".to_string(), "melon".to_string())];
        let b = vec![Range::new("banana".to_string(), "cherry".to_string())];
        let result = subtract(a, &b, &lex);
        assert_eq!(
            result,
            vec![
                Range::new("apple".to_string(), "banana".to_string()),
                Range::new("cherry".to_string(), "melon".to_string()),
            ]
        );
    }
}
