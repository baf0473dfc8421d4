//! Histogram bin layout
//!
//! [`HistogramScale`] turns one attribute's overview and filtered-set bin
//! counts into drawing geometry: x positions for ordinal and categorical
//! bins (ordinal bars packed edge to edge, categorical bars spaced 1.5×
//! apart beyond a divider), a clamped bar size, and a y scale whose ceiling
//! the user may lower below the true maximum. The scale owns only this
//! transient geometry; histogram data is passed in on every update.

use crate::histogram::Bin;

/// Which of the two parallel histograms a query refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramKind {
    /// Counts across the entire unfiltered record set
    Overview,
    /// Counts across records matching the active filter
    FilteredSet,
}

/// Drawing rectangle for one bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Bin layout geometry for a single attribute
#[derive(Debug, Clone, Default)]
pub struct HistogramScale {
    overview: Vec<Bin>,
    filtered_set: Vec<Bin>,

    em_size: f64,
    ideal_width: f64,
    width: f64,
    height: f64,
    bar_size: f64,

    ordinal_count: usize,
    categorical_count: usize,
    divider_index: usize,
    divider_position: f64,

    /// Running min lower bound across ordinal bins
    low_bound: Option<f64>,
    /// Running max upper bound across ordinal bins
    high_bound: Option<f64>,

    real_y_max: u64,
    custom_y_max: Option<u64>,
}

impl HistogramScale {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute layout from fresh histogram data and layout parameters.
    ///
    /// `em_size` is the unit length all sizes derive from; `ideal_width` is
    /// the target total width before bar-size clamping.
    pub fn update(
        &mut self,
        overview: &[Bin],
        filtered_set: &[Bin],
        em_size: f64,
        ideal_width: f64,
    ) {
        self.overview = overview.to_vec();
        self.filtered_set = filtered_set.to_vec();
        self.em_size = em_size;
        self.ideal_width = ideal_width;

        self.ordinal_count = 0;
        self.categorical_count = 0;
        self.low_bound = None;
        self.high_bound = None;
        self.real_y_max = 0;
        self.divider_index = 0;

        // Bins are ordinal-first (server guarantee), so the first
        // categorical bin marks the divider.
        let mut divider_seen = false;
        for (index, bin) in overview.iter().enumerate() {
            match bin {
                Bin::Ordinal { low, high, .. } => {
                    self.ordinal_count += 1;
                    if let Some(low) = low.as_number() {
                        self.low_bound =
                            Some(self.low_bound.map_or(low, |current: f64| current.min(low)));
                    }
                    if let Some(high) = high.as_number() {
                        self.high_bound =
                            Some(self.high_bound.map_or(high, |current: f64| current.max(high)));
                    }
                }
                Bin::Categorical { .. } => {
                    if !divider_seen {
                        self.divider_index = index;
                        divider_seen = true;
                    }
                    self.categorical_count += 1;
                }
            }
            self.real_y_max = self.real_y_max.max(bin.count());
        }
        if !divider_seen {
            self.divider_index = overview.len();
        }

        // A previously set ceiling above the new true max reverts to
        // automatic scaling.
        if let Some(custom) = self.custom_y_max {
            if custom > self.real_y_max {
                self.custom_y_max = None;
            }
        }

        // Left-axis gutter, then bars: ordinal bars edge to edge with a
        // half-bar lead-in, categorical bars at 1.5x spacing.
        let gutter = 3.0 * em_size;
        let slots = 0.5 + self.ordinal_count as f64 + 1.5 * self.categorical_count as f64;
        let raw_bar = if slots > 0.0 {
            (ideal_width - gutter) / slots
        } else {
            em_size
        };
        self.bar_size = raw_bar.clamp(em_size, 3.0 * em_size);
        self.width = gutter + self.bar_size * slots;
        self.divider_position = gutter + self.bar_size * (0.5 + self.ordinal_count as f64);
    }

    /// Drawing height used by the y scale; set by the rendering caller.
    pub fn set_height(&mut self, height: f64) {
        self.height = height;
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Total laid-out width after bar-size clamping
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn bar_size(&self) -> f64 {
        self.bar_size
    }

    /// Index of the first categorical bin
    pub fn divider_index(&self) -> usize {
        self.divider_index
    }

    /// X coordinate of the ordinal/categorical boundary
    pub fn divider_position(&self) -> f64 {
        self.divider_position
    }

    /// Overall `[min low, max high]` span across the ordinal bins, when any
    pub fn ordinal_span(&self) -> Option<(f64, f64)> {
        match (self.low_bound, self.high_bound) {
            (Some(low), Some(high)) => Some((low, high)),
            _ => None,
        }
    }

    /// Largest overview bin count seen in the last update
    pub fn real_y_max(&self) -> u64 {
        self.real_y_max
    }

    /// Effective y ceiling: the user ceiling when set, else the true max
    pub fn y_max(&self) -> u64 {
        self.custom_y_max.unwrap_or(self.real_y_max).max(1)
    }

    /// Set the user y ceiling, clamped to `[1, real_y_max]`
    pub fn set_y_max(&mut self, y_max: u64) {
        self.custom_y_max = Some(y_max.clamp(1, self.real_y_max.max(1)));
    }

    /// Revert to automatic y scaling
    pub fn clear_y_max(&mut self) {
        self.custom_y_max = None;
    }

    /// Pixel height of a count value under the current ceiling
    pub fn y(&self, value: f64) -> f64 {
        self.height * value / self.y_max() as f64
    }

    /// Center x coordinate of a bin by index
    pub fn bin_to_position(&self, bin_index: usize) -> f64 {
        let gutter = 3.0 * self.em_size;
        if bin_index < self.divider_index {
            gutter + self.bar_size * (0.75 + bin_index as f64)
        } else {
            self.divider_position
                + self.bar_size * (1.5 * (bin_index - self.divider_index) as f64 + 0.75)
        }
    }

    /// Nearest bin index for an x coordinate (inverse of
    /// [`bin_to_position`](Self::bin_to_position))
    pub fn position_to_bin(&self, x: f64) -> isize {
        let gutter = 3.0 * self.em_size;
        if x < self.divider_position {
            ((x - gutter) / self.bar_size - 0.75).round() as isize
        } else {
            self.divider_index as isize
                + (((x - self.divider_position) / self.bar_size - 0.75) / 1.5).round() as isize
        }
    }

    /// Drawing rectangle for a named bin from either histogram.
    ///
    /// The bin's x position always comes from the overview layout; the bar
    /// height comes from the requested histogram (0 when the bin is absent
    /// there) and is capped so it never exceeds the current ceiling.
    /// Returns `None` when the label is unknown to the overview histogram.
    pub fn get_bin_rect(&self, label: &str, which: HistogramKind) -> Option<BinRect> {
        let index = self.overview.iter().position(|b| b.label() == label)?;
        let bins = match which {
            HistogramKind::Overview => &self.overview,
            HistogramKind::FilteredSet => &self.filtered_set,
        };
        let count = bins
            .iter()
            .find(|b| b.label() == label)
            .map(Bin::count)
            .unwrap_or(0);
        let capped = count.min(self.y_max());
        let bar_height = self.y(capped as f64);
        Some(BinRect {
            x: self.bin_to_position(index) - self.bar_size / 2.0,
            y: self.height - bar_height,
            width: self.bar_size,
            height: bar_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Bin;

    fn sample_bins() -> Vec<Bin> {
        vec![
            Bin::ordinal(0.0, 10.0, 5),
            Bin::ordinal(10.0, 20.0, 3),
            Bin::ordinal(20.0, 30.0, 8),
            Bin::categorical("__null__", 2),
        ]
    }

    fn sample_scale() -> HistogramScale {
        let mut scale = HistogramScale::new();
        scale.update(&sample_bins(), &[], 10.0, 400.0);
        scale
    }

    #[test]
    fn test_partition_and_divider() {
        let scale = sample_scale();
        assert_eq!(scale.divider_index(), 3);
        assert_eq!(scale.real_y_max(), 8);
        assert_eq!(scale.ordinal_span(), Some((0.0, 30.0)));
        // gutter 30 + bar * (0.5 + 3)
        let expected = 30.0 + scale.bar_size() * 3.5;
        assert!((scale.divider_position() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_bar_size_clamped() {
        let mut scale = HistogramScale::new();
        // Very narrow layout: bar size clamps to em_size
        scale.update(&sample_bins(), &[], 10.0, 50.0);
        assert_eq!(scale.bar_size(), 10.0);
        // Very wide layout: bar size clamps to 3 * em_size
        scale.update(&sample_bins(), &[], 10.0, 10_000.0);
        assert_eq!(scale.bar_size(), 30.0);
    }

    #[test]
    fn test_position_round_trip() {
        let scale = sample_scale();
        for index in 0..4 {
            let position = scale.bin_to_position(index);
            assert_eq!(scale.position_to_bin(position), index as isize);
            let again = scale.bin_to_position(scale.position_to_bin(position) as usize);
            assert!((again - position).abs() < 1e-9);
        }
    }

    #[test]
    fn test_y_max_clamping() {
        let mut scale = sample_scale();
        scale.set_y_max(0);
        assert_eq!(scale.y_max(), 1);
        scale.set_y_max(100);
        assert_eq!(scale.y_max(), 8);
        scale.set_y_max(4);
        assert_eq!(scale.y_max(), 4);
    }

    #[test]
    fn test_shrinking_data_resets_custom_y_max() {
        let mut scale = sample_scale();
        scale.set_y_max(6);
        assert_eq!(scale.y_max(), 6);
        // New data tops out below the custom ceiling: back to automatic.
        let small = vec![Bin::ordinal(0.0, 10.0, 2)];
        scale.update(&small, &[], 10.0, 400.0);
        assert_eq!(scale.y_max(), 2);
    }

    #[test]
    fn test_bin_rect_capped_at_ceiling() {
        let mut scale = sample_scale();
        scale.set_height(100.0);
        scale.set_y_max(4);

        // Count 8 exceeds the ceiling of 4: bar fills the full height.
        let rect = scale
            .get_bin_rect("[20 - 30)", HistogramKind::Overview)
            .unwrap();
        assert!((rect.height - 100.0).abs() < 1e-9);
        assert!((rect.y - 0.0).abs() < 1e-9);

        // Count 3 under a ceiling of 4.
        let rect = scale
            .get_bin_rect("[10 - 20)", HistogramKind::Overview)
            .unwrap();
        assert!((rect.height - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_bin_rect_absent_from_filtered_set() {
        let mut scale = HistogramScale::new();
        let filtered = vec![Bin::ordinal(0.0, 10.0, 1)];
        scale.update(&sample_bins(), &filtered, 10.0, 400.0);
        scale.set_height(80.0);

        let rect = scale
            .get_bin_rect("[10 - 20)", HistogramKind::FilteredSet)
            .unwrap();
        assert_eq!(rect.height, 0.0);

        assert!(scale.get_bin_rect("no-such-bin", HistogramKind::Overview).is_none());
    }
}
