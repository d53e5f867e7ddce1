//! Page geometry for the single-page report.
//!
//! The layout is an explicit configuration value instead of a set of numbers
//! scattered through drawing calls: page size, margin and the region
//! fractions live here, and the composer derives every rectangle from them.
//! The page is split into a map column spanning the full usable height and a
//! side column holding the description block on top of the credit block.

const MM_PER_INCH: f64 = 25.4;

/// A4 portrait page with the three-region PM2.5 report layout.
///
/// All lengths are millimetres. The defaults reproduce the report geometry:
/// 0.5 in margin, map column twice as wide as the side column, description
/// occupying the top three quarters of the side column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageLayout {
    /// Page width in millimetres.
    pub page_width: f64,
    /// Page height in millimetres.
    pub page_height: f64,
    /// Uniform page margin in millimetres.
    pub margin: f64,
    /// Relative width of the map column.
    pub map_column_weight: usize,
    /// Relative width of the side (description + credit) column.
    pub side_column_weight: usize,
    /// Fraction of the side column height taken by the description region.
    pub description_height_ratio: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            margin: 12.7,
            map_column_weight: 2,
            side_column_weight: 1,
            description_height_ratio: 0.75,
        }
    }
}

impl PageLayout {
    /// Width of the area inside the margins.
    pub fn usable_width(&self) -> f64 {
        self.page_width - 2.0 * self.margin
    }

    /// Height of the area inside the margins.
    pub fn usable_height(&self) -> f64 {
        self.page_height - 2.0 * self.margin
    }

    /// Column weights in the order expected by the page element.
    pub fn column_weights(&self) -> [usize; 2] {
        [self.map_column_weight, self.side_column_weight]
    }

    /// Width of the map region in millimetres.
    pub fn map_width(&self) -> f64 {
        let total = (self.map_column_weight + self.side_column_weight) as f64;
        self.usable_width() * self.map_column_weight as f64 / total
    }

    /// Height of the description region in millimetres.
    pub fn description_height(&self) -> f64 {
        self.usable_height() * self.description_height_ratio
    }

    /// Height of the credit region in millimetres.
    pub fn credit_height(&self) -> f64 {
        self.usable_height() - self.description_height()
    }

    /// Aspect of the map region as (width, height) in inches, the unit the
    /// raster generator sizes its output with.
    pub fn map_size_inches(&self) -> (f64, f64) {
        (
            self.map_width() / MM_PER_INCH,
            self.usable_height() / MM_PER_INCH,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::PageLayout;

    #[test]
    fn map_region_is_two_thirds_of_usable_width() {
        let layout = PageLayout::default();
        let expected = layout.usable_width() * 2.0 / 3.0;
        assert!((layout.map_width() - expected).abs() < 1e-9);
    }

    #[test]
    fn side_column_splits_three_quarters_to_description() {
        let layout = PageLayout::default();
        assert!((layout.description_height() - layout.usable_height() * 0.75).abs() < 1e-9);
        assert!((layout.credit_height() - layout.usable_height() * 0.25).abs() < 1e-9);
    }

    #[test]
    fn regions_cover_the_side_column_exactly() {
        let layout = PageLayout::default();
        let sum = layout.description_height() + layout.credit_height();
        assert!((sum - layout.usable_height()).abs() < 1e-9);
    }

    #[test]
    fn map_aspect_in_inches_matches_millimetre_geometry() {
        let layout = PageLayout::default();
        let (w, h) = layout.map_size_inches();
        assert!((w * 25.4 - layout.map_width()).abs() < 1e-9);
        assert!((h * 25.4 - layout.usable_height()).abs() < 1e-9);
        assert!(w > 0.0 && h > 0.0);
    }
}
