use crate::geometry::CURVE_DEDUP_TOLERANCE;

/// Tuning constants for anchor detection. These are fixed configuration,
/// not request parameters; the defaults match the behavior observed on
/// hand-drawn kolam photographs.
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// Gaussian sigma applied before edge extraction for the circle pass.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Radius range of the circle accumulator, in pixels.
    pub circle_min_radius: u32,
    pub circle_max_radius: u32,
    /// Angular sampling step of the accumulator, in degrees.
    pub circle_angle_step: u32,
    /// Minimum accumulator votes for a circle center.
    pub circle_vote_threshold: u32,
    /// Minimum separation between reported circle centers.
    pub circle_min_center_distance: f64,
    /// FAST-9 corner score threshold.
    pub corner_threshold: u8,
    /// Upper bound on reported corners.
    pub max_corners: usize,
    /// Minimum separation between reported corners.
    pub corner_min_distance: f64,
    /// Blob component area band, in pixels.
    pub blob_min_area: usize,
    pub blob_max_area: usize,
    /// Minimum circularity (4*pi*A/P^2) for a blob to count as a dot.
    pub blob_min_circularity: f64,
    /// Neighborhood radius of the candidate clustering pass.
    pub cluster_radius: f64,
    /// Inset of the synthetic fallback grid, as a fraction of min(w, h).
    pub grid_margin_ratio: f64,
    /// Foreground-density cuts selecting the fallback grid dimension:
    /// above `density_complex` -> 5, above `density_medium` -> 4, else 3.
    pub density_complex: f64,
    pub density_medium: f64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        AnchorConfig {
            blur_sigma: 1.4,
            canny_low: 50.0,
            canny_high: 150.0,
            circle_min_radius: 2,
            circle_max_radius: 15,
            circle_angle_step: 10,
            circle_vote_threshold: 12,
            circle_min_center_distance: 20.0,
            corner_threshold: 20,
            max_corners: 100,
            corner_min_distance: 15.0,
            blob_min_area: 10,
            blob_max_area: 200,
            blob_min_circularity: 0.3,
            cluster_radius: 15.0,
            grid_margin_ratio: 0.1,
            density_complex: 0.3,
            density_medium: 0.15,
        }
    }
}

/// Tuning constants for line/curve inference.
#[derive(Debug, Clone)]
pub struct PathConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Accumulator votes required before a line direction is considered.
    pub hough_vote_threshold: u32,
    pub hough_suppression_radius: u32,
    /// Minimum recovered segment length, in pixels.
    pub min_line_length: f64,
    /// Largest gap bridged while walking a voted line.
    pub max_line_gap: f64,
    /// Accent hue band, split across the wrap-around: hue <= low or
    /// hue >= high (degrees in [0, 360)).
    pub accent_hue_low: f64,
    pub accent_hue_high: f64,
    pub accent_min_saturation: f64,
    pub accent_min_value: f64,
    /// Curve strategies only run when the accent mask has more matches
    /// than this. Curves need colored-ink evidence.
    pub color_gate_min_pixels: usize,
    /// Minimum contour area for the circularity-band curve pass.
    pub contour_min_area: f64,
    /// Curved-but-not-circular circularity band.
    pub circularity_low: f64,
    pub circularity_high: f64,
    /// Polygon approximation epsilon as a fraction of contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Minimum accent-mask contour area for the centroid curve pass.
    pub accent_contour_min_area: f64,
    /// Width of the border band, as a fraction of the image dimension.
    pub border_band_ratio: f64,
    pub curve_dedup_tolerance: f64,
}

impl Default for PathConfig {
    fn default() -> Self {
        PathConfig {
            canny_low: 50.0,
            canny_high: 150.0,
            hough_vote_threshold: 40,
            hough_suppression_radius: 8,
            min_line_length: 30.0,
            max_line_gap: 15.0,
            accent_hue_low: 20.0,
            accent_hue_high: 340.0,
            accent_min_saturation: 0.2,
            accent_min_value: 0.2,
            color_gate_min_pixels: 100,
            contour_min_area: 100.0,
            circularity_low: 0.1,
            circularity_high: 0.8,
            approx_epsilon_ratio: 0.02,
            accent_contour_min_area: 50.0,
            border_band_ratio: 0.1,
            curve_dedup_tolerance: CURVE_DEDUP_TOLERANCE,
        }
    }
}

/// Tuning constants for symmetry recreation.
#[derive(Debug, Clone)]
pub struct RecreateConfig {
    /// Only anchor pairs closer than this (canvas units) are tested for
    /// a connecting stroke.
    pub pair_distance_max: f64,
    /// Interior samples taken along each candidate segment.
    pub samples_per_pair: usize,
    /// Mean channel intensity below which a sample counts as ink.
    pub ink_threshold: f64,
    /// Half-width of the neighborhood averaged around each sample.
    pub sample_radius: u32,
    /// Upper bound on anchors joined by the random-loop fallback.
    pub max_loop_anchors: usize,
}

impl Default for RecreateConfig {
    fn default() -> Self {
        RecreateConfig {
            pair_distance_max: 150.0,
            samples_per_pair: 15,
            ink_threshold: 200.0,
            sample_radius: 1,
            max_loop_anchors: 15,
        }
    }
}

/// Aggregate configuration for one request pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub anchors: AnchorConfig,
    pub paths: PathConfig,
    pub recreate: RecreateConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let cfg = PipelineConfig::default();
        assert!(cfg.anchors.circle_min_radius < cfg.anchors.circle_max_radius);
        assert!(cfg.anchors.density_medium < cfg.anchors.density_complex);
        assert!(cfg.paths.circularity_low < cfg.paths.circularity_high);
        assert!(cfg.paths.accent_hue_low < cfg.paths.accent_hue_high);
        assert!(cfg.recreate.max_loop_anchors > 0);
    }
}
