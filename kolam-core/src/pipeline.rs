use image::RgbImage;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::anchor_detector;
use crate::config::PipelineConfig;
use crate::geometry::{
    dedup_curves, dedup_lines, PathElement, Pattern, Point, CANVAS_SIZE, CURVE_DEDUP_TOLERANCE,
};
use crate::metrics::{self, Metrics};
use crate::path_detector;
use crate::renderer;
use crate::symmetry;

/// Detection response consumed by the external transport layer. All
/// coordinates are expressed in the fixed 500x500 canvas frame, which is
/// also exactly what a `KolamRequest` accepts, so a detection can be fed
/// straight back into `create_kolam`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub dots: Vec<Point>,
    pub paths: Vec<PathElement>,
    pub metrics: Metrics,
}

/// Caller-supplied drawing request: dots plus paths in canvas
/// coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KolamRequest {
    pub dots: Vec<Point>,
    pub paths: Vec<PathElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecreationResponse {
    #[serde(rename = "recreatedImage")]
    pub recreated_image: String,
}

/// One full detection pass: anchors, then paths, then rescale into the
/// canvas frame and attach metrics. Never fails on a decoded image; the
/// anchor fallback guarantees a non-empty dot set.
pub fn analyze(img: &RgbImage, cfg: &PipelineConfig) -> DetectionResponse {
    let detection = anchor_detector::detect_anchors(img, &cfg.anchors);
    let (lines, curves) = path_detector::detect_paths(img, &detection, &cfg.paths);
    info!(
        "analysis found {} dots, {} lines, {} curves",
        detection.anchors.len(),
        lines.len(),
        curves.len()
    );

    let pattern = Pattern {
        anchors: detection.anchors,
        lines,
        curves,
    };
    let canvas = to_canvas_frame(&pattern, img.width(), img.height());
    let metrics = metrics::estimate(canvas.anchors.len(), canvas.path_count());
    DetectionResponse {
        dots: canvas.anchors.clone(),
        paths: canvas.paths(),
        metrics,
    }
}

/// Recreation operation with its full fallback ladder: symmetry-expanded
/// pattern when connectivity is found, otherwise — and on any internal
/// recreation error — a closed loop over a bounded random anchor subset.
/// The operation always yields a drawable pattern.
pub fn recreate_pattern<R: Rng + ?Sized>(
    img: &RgbImage,
    cfg: &PipelineConfig,
    rng: &mut R,
) -> Pattern {
    let detection = anchor_detector::detect_anchors(img, &cfg.anchors);
    let sx = CANVAS_SIZE / img.width().max(1) as f64;
    let sy = CANVAS_SIZE / img.height().max(1) as f64;
    let anchors: Vec<Point> = detection.anchors.iter().map(|p| p.scaled(sx, sy)).collect();

    match symmetry::recreate(&anchors, img, &cfg.recreate) {
        Ok(pattern) if pattern.has_paths() => {
            info!("recreation kept {} symmetric paths", pattern.path_count());
            pattern
        }
        Ok(pattern) => {
            warn!("recreation found no usable paths, falling back to a random loop");
            symmetry::random_loop_pattern(&pattern.anchors, cfg.recreate.max_loop_anchors, rng)
        }
        Err(e) => {
            warn!("recreation failed ({}), falling back to a random loop", e);
            symmetry::random_loop_pattern(&anchors, cfg.recreate.max_loop_anchors, rng)
        }
    }
}

/// Recreate and serialize in one step.
pub fn recreate_svg<R: Rng + ?Sized>(img: &RgbImage, cfg: &PipelineConfig, rng: &mut R) -> String {
    let pattern = recreate_pattern(img, cfg, rng);
    renderer::render_svg(&pattern.anchors, &pattern.paths())
}

/// Direct drawing operation: render a caller-supplied dot/path set.
pub fn create_kolam(request: &KolamRequest) -> String {
    renderer::render_svg(&request.dots, &request.paths)
}

/// Rescale a pattern from image space into the canvas frame. Dedup runs
/// again afterwards: downscaling can pull distinct near-duplicates
/// inside the curve tolerance.
fn to_canvas_frame(pattern: &Pattern, width: u32, height: u32) -> Pattern {
    let sx = CANVAS_SIZE / width.max(1) as f64;
    let sy = CANVAS_SIZE / height.max(1) as f64;
    let scaled = pattern.scaled(sx, sy);
    Pattern {
        anchors: scaled.anchors,
        lines: dedup_lines(scaled.lines),
        curves: dedup_curves(scaled.curves, CURVE_DEDUP_TOLERANCE),
    }
}
