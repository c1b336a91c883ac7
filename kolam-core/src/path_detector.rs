use std::f64::consts::PI;

use geo::{Area, Centroid, Coord, LineString, Polygon};
use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use imageproc::point::Point as PixelPoint;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::anchor_detector::AnchorDetection;
use crate::config::PathConfig;
use crate::geometry::{dedup_curves, dedup_lines, CurvePath, LinePath, Point};
use crate::preprocess;

/// Infer straight and curved connections between anchors. Curve
/// strategies are gated on accent-color evidence so line noise never
/// hallucinates curves; the border-motif strategy only runs on observed
/// (non-synthetic) anchors. Output is deduplicated.
pub fn detect_paths(
    img: &RgbImage,
    detection: &AnchorDetection,
    cfg: &PathConfig,
) -> (Vec<LinePath>, Vec<CurvePath>) {
    let anchors = &detection.anchors;
    if anchors.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let gray = preprocess::to_gray(img);
    let binary = preprocess::binarize_inverted(&gray);
    let edges = canny(&binary, cfg.canny_low, cfg.canny_high);

    let mut lines = detect_line_segments(&edges, anchors, cfg);
    debug!("line strategy produced {} raw lines", lines.len());

    let mask = preprocess::accent_mask(img, cfg);
    let accent_pixels = preprocess::count_foreground(&mask);
    let mut curves = Vec::new();
    if accent_pixels > cfg.color_gate_min_pixels {
        debug!("curve gate open ({} accent pixels)", accent_pixels);
        curves.extend(curves_from_contours(&binary, anchors, cfg));
        curves.extend(curves_from_accent_mask(&mask, anchors, cfg));
    } else {
        debug!("curve gate closed ({} accent pixels)", accent_pixels);
    }

    if !detection.synthetic_grid {
        lines.extend(border_motifs(
            anchors,
            img.width() as f64,
            img.height() as f64,
            cfg.border_band_ratio,
        ));
    }

    (
        dedup_lines(lines),
        dedup_curves(curves, cfg.curve_dedup_tolerance),
    )
}

/// Straight-line strategy: vote for line directions over the edge map,
/// recover maximal segments along each voted line, then snap segment
/// endpoints to their nearest anchors. Segments whose endpoints snap to
/// the same anchor are discarded.
fn detect_line_segments(edges: &GrayImage, anchors: &[Point], cfg: &PathConfig) -> Vec<LinePath> {
    let options = LineDetectionOptions {
        vote_threshold: cfg.hough_vote_threshold,
        suppression_radius: cfg.hough_suppression_radius,
    };
    let voted = detect_lines(edges, options);
    debug!("hough voted {} line directions", voted.len());

    let mut lines = Vec::new();
    for polar in &voted {
        for (start, end) in recover_segments(edges, polar, cfg) {
            let (Some(p1), Some(p2)) = (nearest_anchor(anchors, start), nearest_anchor(anchors, end))
            else {
                continue;
            };
            let line = LinePath::new(p1, p2);
            if !line.is_self_loop() {
                lines.push(line);
            }
        }
    }
    lines
}

/// Walk a voted line across the image and collect runs of edge pixels,
/// bridging gaps up to `max_line_gap` and keeping runs at least
/// `min_line_length` long.
fn recover_segments(edges: &GrayImage, polar: &PolarLine, cfg: &PathConfig) -> Vec<(Point, Point)> {
    let theta = (polar.angle_in_degrees as f64).to_radians();
    let (sin_t, cos_t) = theta.sin_cos();
    let r = polar.r as f64;
    // Parametrize the line x*cos + y*sin = r by its tangent direction.
    let base = (r * cos_t, r * sin_t);
    let dir = (-sin_t, cos_t);

    let (width, height) = edges.dimensions();
    let diagonal = ((width * width + height * height) as f64).sqrt();

    let point_at = |t: f64| Point::new(base.0 + t * dir.0, base.1 + t * dir.1);

    let mut segments = Vec::new();
    let mut run_start: Option<f64> = None;
    let mut last_hit = 0.0;

    let mut t = -diagonal;
    while t <= diagonal {
        let p = point_at(t);
        if has_edge_near(edges, p.x, p.y) {
            if run_start.is_none() {
                run_start = Some(t);
            }
            last_hit = t;
        } else if let Some(start_t) = run_start {
            if t - last_hit > cfg.max_line_gap {
                if last_hit - start_t >= cfg.min_line_length {
                    segments.push((point_at(start_t), point_at(last_hit)));
                }
                run_start = None;
            }
        }
        t += 1.0;
    }
    if let Some(start_t) = run_start {
        if last_hit - start_t >= cfg.min_line_length {
            segments.push((point_at(start_t), point_at(last_hit)));
        }
    }
    segments
}

/// Rasterized edges rarely sit exactly on the parametrized line, so hit
/// testing checks a 3x3 neighborhood.
fn has_edge_near(edges: &GrayImage, x: f64, y: f64) -> bool {
    let (width, height) = (edges.width() as i64, edges.height() as i64);
    let cx = x.round() as i64;
    let cy = y.round() as i64;
    for dy in -1..=1 {
        for dx in -1..=1 {
            let nx = cx + dx;
            let ny = cy + dy;
            if nx >= 0 && ny >= 0 && nx < width && ny < height {
                if edges.get_pixel(nx as u32, ny as u32)[0] > 0 {
                    return true;
                }
            }
        }
    }
    false
}

fn nearest_anchor(anchors: &[Point], target: Point) -> Option<Point> {
    anchors
        .iter()
        .min_by_key(|a| OrderedFloat(a.distance_to(&target)))
        .copied()
}

/// Curve pass over the binarized foreground: external contours in the
/// curved-but-not-circular circularity band are polygon-approximated and
/// emitted as one quadratic per consecutive 3-point window, endpoints
/// snapped to anchors, middle point kept as a free control point.
fn curves_from_contours(binary: &GrayImage, anchors: &[Point], cfg: &PathConfig) -> Vec<CurvePath> {
    let contours = find_contours::<i32>(binary);
    let mut curves = Vec::new();

    for contour in &contours {
        if contour.border_type != BorderType::Outer || contour.points.len() < 3 {
            continue;
        }
        let area = contour_area(&contour.points);
        if area <= cfg.contour_min_area {
            continue;
        }
        let perimeter = arc_length(&contour.points, true);
        if perimeter <= 0.0 {
            continue;
        }
        let circularity = 4.0 * PI * area / (perimeter * perimeter);
        if circularity <= cfg.circularity_low || circularity >= cfg.circularity_high {
            continue;
        }

        let approx =
            approximate_polygon_dp(&contour.points, cfg.approx_epsilon_ratio * perimeter, true);
        for window in approx.windows(3) {
            let first = to_point(window[0]);
            let ctrl = to_point(window[1]);
            let last = to_point(window[2]);
            let (Some(p1), Some(p2)) = (nearest_anchor(anchors, first), nearest_anchor(anchors, last))
            else {
                continue;
            };
            curves.push(CurvePath::new(p1, ctrl, p2));
        }
    }
    curves
}

/// Curve pass over the accent mask itself: each sufficiently large
/// accent contour contributes one quadratic through its centroid between
/// the two anchors nearest to it. Needs at least three anchors nearby to
/// be meaningful.
fn curves_from_accent_mask(mask: &GrayImage, anchors: &[Point], cfg: &PathConfig) -> Vec<CurvePath> {
    let contours = find_contours::<i32>(mask);
    let mut curves = Vec::new();

    for contour in &contours {
        if contour.border_type != BorderType::Outer || contour.points.len() < 3 {
            continue;
        }
        let area = contour_area(&contour.points);
        if area <= cfg.accent_contour_min_area {
            continue;
        }
        let Some(centroid) = contour_centroid(&contour.points) else {
            continue;
        };

        let mut by_distance: Vec<Point> = anchors.to_vec();
        by_distance.sort_by_key(|a| OrderedFloat(a.distance_to(&centroid)));
        if by_distance.len() < 3 {
            continue;
        }
        curves.push(CurvePath::new(by_distance[0], centroid, by_distance[1]));
    }
    curves
}

/// Structural strategy, independent of pixel data: anchors sitting in a
/// band along each side of the pattern are sorted along that side and
/// joined consecutively. Captures perimeter motifs that pixel detectors
/// miss through anti-aliasing. Needs at least four anchors.
pub fn border_motifs(
    anchors: &[Point],
    width: f64,
    height: f64,
    band_ratio: f64,
) -> Vec<LinePath> {
    if anchors.len() < 4 {
        return Vec::new();
    }

    let min_x = anchors.iter().map(|a| a.x).fold(f64::INFINITY, f64::min);
    let max_x = anchors.iter().map(|a| a.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = anchors.iter().map(|a| a.y).fold(f64::INFINITY, f64::min);
    let max_y = anchors.iter().map(|a| a.y).fold(f64::NEG_INFINITY, f64::max);

    let band_w = width * band_ratio;
    let band_h = height * band_ratio;

    let mut lines = Vec::new();
    let top: Vec<Point> = anchors.iter().filter(|a| (a.y - min_y).abs() < band_h).copied().collect();
    lines.extend(connect_along(top, |p| p.x));
    let bottom: Vec<Point> = anchors.iter().filter(|a| (a.y - max_y).abs() < band_h).copied().collect();
    lines.extend(connect_along(bottom, |p| p.x));
    let left: Vec<Point> = anchors.iter().filter(|a| (a.x - min_x).abs() < band_w).copied().collect();
    lines.extend(connect_along(left, |p| p.y));
    let right: Vec<Point> = anchors.iter().filter(|a| (a.x - max_x).abs() < band_w).copied().collect();
    lines.extend(connect_along(right, |p| p.y));
    lines
}

fn connect_along<F: Fn(&Point) -> f64>(mut band: Vec<Point>, axis: F) -> Vec<LinePath> {
    if band.len() < 2 {
        return Vec::new();
    }
    band.sort_by_key(|p| OrderedFloat(axis(p)));
    band.windows(2)
        .map(|pair| LinePath::new(pair[0], pair[1]))
        .collect()
}

fn contour_area(points: &[PixelPoint<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    to_polygon(points).unsigned_area()
}

fn contour_centroid(points: &[PixelPoint<i32>]) -> Option<Point> {
    if points.len() < 3 {
        return None;
    }
    let centroid = to_polygon(points).centroid()?;
    Some(Point::new(centroid.x(), centroid.y()))
}

fn to_polygon(points: &[PixelPoint<i32>]) -> Polygon {
    let coords: Vec<Coord> = points
        .iter()
        .map(|p| Coord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect();
    Polygon::new(LineString::from(coords), vec![])
}

fn to_point(p: PixelPoint<i32>) -> Point {
    Point::new(p.x as f64, p.y as f64)
}
