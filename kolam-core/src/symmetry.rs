use std::f64::consts::FRAC_PI_2;

use anyhow::{ensure, Result};
use image::RgbImage;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::config::RecreateConfig;
use crate::geometry::{
    dedup_curves, dedup_lines, LinePath, PathElement, Pattern, Point, CANVAS_SIZE,
    CURVE_DEDUP_TOLERANCE,
};
use crate::preprocess;

/// Symmetry axis origin: center of the logical canvas.
pub const CANVAS_CENTER: Point = Point { x: 250.0, y: 250.0 };

/// Rebuild a cleaned, symmetry-regularized pattern from detected anchors
/// and the source image. Anchors must already be expressed in the
/// 500x500 canvas frame; the presence test maps samples back into source
/// pixels. Straight connectivity only is tested here; curve evidence is
/// not re-derived in this mode.
///
/// Returns a dots-only pattern when no connectivity is found. Callers
/// must treat that as a degraded result, not an error.
pub fn recreate(anchors: &[Point], source: &RgbImage, cfg: &RecreateConfig) -> Result<Pattern> {
    ensure!(
        source.width() > 0 && source.height() > 0,
        "source image has zero dimension"
    );
    let scale_x = source.width() as f64 / CANVAS_SIZE;
    let scale_y = source.height() as f64 / CANVAS_SIZE;

    let mut lines = Vec::new();
    for i in 0..anchors.len() {
        for j in (i + 1)..anchors.len() {
            let a = anchors[i];
            let b = anchors[j];
            if a.distance_to(&b) >= cfg.pair_distance_max {
                continue;
            }
            if stroke_present(source, a, b, scale_x, scale_y, cfg) {
                lines.push(LinePath::new(a, b));
            }
        }
    }

    if lines.is_empty() {
        debug!("no connectivity between anchor pairs, degrading to dots only");
        return Ok(Pattern::dots_only(anchors.to_vec()));
    }
    debug!("{} base paths accepted before symmetry expansion", lines.len());

    let base: Vec<PathElement> = lines.into_iter().map(PathElement::Line).collect();
    let expanded = expand_fourfold(&base, CANVAS_CENTER);

    let mut pattern = Pattern::dots_only(anchors.to_vec());
    for path in expanded {
        match path {
            PathElement::Line(line) => pattern.lines.push(line),
            PathElement::Curve(curve) => pattern.curves.push(curve),
        }
    }
    Ok(pattern)
}

/// Coarse presence test for a stroke between two canvas points: sample
/// evenly spaced interior points, map each into source pixels, and look
/// for ink in a small neighborhood. One hit is enough; this is not
/// pixel-perfect tracing.
fn stroke_present(
    source: &RgbImage,
    a: Point,
    b: Point,
    scale_x: f64,
    scale_y: f64,
    cfg: &RecreateConfig,
) -> bool {
    for i in 1..cfg.samples_per_pair {
        let t = i as f64 / cfg.samples_per_pair as f64;
        let x = a.x + t * (b.x - a.x);
        let y = a.y + t * (b.y - a.y);
        let px = (x * scale_x).round() as i64;
        let py = (y * scale_y).round() as i64;
        if preprocess::region_mean(source, px, py, cfg.sample_radius) < cfg.ink_threshold {
            return true;
        }
    }
    false
}

/// Enforce exact 4-fold rotational symmetry by construction: every path
/// gains copies rotated 90, 180 and 270 degrees about `center`, with
/// path kind preserved (a curve's control point rotates identically).
/// The union is re-deduplicated because rotated copies of paths near the
/// axes can coincide.
pub fn expand_fourfold(paths: &[PathElement], center: Point) -> Vec<PathElement> {
    let mut expanded: Vec<PathElement> = paths.to_vec();
    for path in paths {
        for quarter_turns in 1..4 {
            let angle = quarter_turns as f64 * FRAC_PI_2;
            expanded.push(path.rotated_about(center, angle));
        }
    }

    let mut lines = Vec::new();
    let mut curves = Vec::new();
    for path in expanded {
        match path {
            PathElement::Line(line) => lines.push(line),
            PathElement::Curve(curve) => curves.push(curve),
        }
    }
    dedup_lines(lines)
        .into_iter()
        .map(PathElement::Line)
        .chain(
            dedup_curves(curves, CURVE_DEDUP_TOLERANCE)
                .into_iter()
                .map(PathElement::Curve),
        )
        .collect()
}

/// Last rung of the recreation fallback ladder: join a bounded random
/// subset of anchors into a closed loop of straight segments so the
/// operation always yields a drawable artifact. All anchors stay in the
/// pattern; only the loop is bounded.
pub fn random_loop_pattern<R: Rng + ?Sized>(
    anchors: &[Point],
    max_anchors: usize,
    rng: &mut R,
) -> Pattern {
    if anchors.len() < 2 {
        return Pattern::dots_only(anchors.to_vec());
    }

    let mut indices: Vec<usize> = (0..anchors.len()).collect();
    indices.shuffle(rng);
    indices.truncate(max_anchors.max(2));

    let mut lines = Vec::new();
    for pair in indices.windows(2) {
        lines.push(LinePath::new(anchors[pair[0]], anchors[pair[1]]));
    }
    if indices.len() > 2 {
        // Close the loop.
        lines.push(LinePath::new(
            anchors[indices[indices.len() - 1]],
            anchors[indices[0]],
        ));
    }

    Pattern {
        anchors: anchors.to_vec(),
        lines: dedup_lines(lines),
        curves: Vec::new(),
    }
}
