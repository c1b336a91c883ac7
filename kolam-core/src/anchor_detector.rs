use std::collections::BTreeMap;

use image::{GrayImage, Luma, RgbImage};
use imageproc::corners::corners_fast9;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::{debug, info};

use crate::config::AnchorConfig;
use crate::geometry::Point;
use crate::preprocess;

/// Result of one anchor-detection pass. `synthetic_grid` marks the
/// fallback case where no strategy produced a candidate and the anchors
/// are an evenly spaced grid rather than observed dots; downstream
/// structural heuristics must not invent paths between synthetic dots.
#[derive(Debug, Clone)]
pub struct AnchorDetection {
    pub anchors: Vec<Point>,
    pub synthetic_grid: bool,
}

/// Find anchor dots in the image. Never returns an empty set: when all
/// three strategies come up empty the density-keyed grid fallback kicks
/// in. Dots vary in rendering style (filled circle, intersection corner,
/// irregular blob), so the strategies are pooled and deduplicated by
/// spatial clustering rather than trusting any single detector.
pub fn detect_anchors(img: &RgbImage, cfg: &AnchorConfig) -> AnchorDetection {
    let gray = preprocess::to_gray(img);
    let blurred = gaussian_blur_f32(&gray, cfg.blur_sigma);
    let edges = canny(&blurred, cfg.canny_low, cfg.canny_high);
    let binary = preprocess::binarize_inverted(&gray);

    let mut candidates = detect_circles(&edges, cfg);
    debug!("circle strategy produced {} candidates", candidates.len());

    let corners = detect_corners(&blurred, cfg);
    debug!("corner strategy produced {} candidates", corners.len());
    candidates.extend(corners);

    let blobs = detect_blobs(&binary, cfg);
    debug!("blob strategy produced {} candidates", blobs.len());
    candidates.extend(blobs);

    if candidates.is_empty() {
        let density = preprocess::foreground_density(&gray);
        let size = grid_dimension(density, cfg);
        info!(
            "no anchor candidates, falling back to {}x{} grid (density {:.3})",
            size, size, density
        );
        return AnchorDetection {
            anchors: synthetic_grid(
                img.width() as f64,
                img.height() as f64,
                size,
                cfg.grid_margin_ratio,
            ),
            synthetic_grid: true,
        };
    }

    let raw_count = candidates.len();
    let anchors = cluster_candidates(&candidates, cfg.cluster_radius);
    info!("{} anchors from {} raw candidates", anchors.len(), raw_count);
    AnchorDetection {
        anchors,
        synthetic_grid: false,
    }
}

/// Hough-style circle accumulator over the edge map, tuned for small
/// filled dots. One vote grid per radius, peaks above the vote threshold
/// merged greedily by center distance.
fn detect_circles(edges: &GrayImage, cfg: &AnchorConfig) -> Vec<Point> {
    let (width, height) = edges.dimensions();
    let edge_pixels: Vec<(u32, u32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect();
    if edge_pixels.is_empty() {
        return Vec::new();
    }

    let mut accumulator = vec![0u32; width as usize * height as usize];
    let mut peaks: Vec<(u32, Point)> = Vec::new();

    for radius in cfg.circle_min_radius..=cfg.circle_max_radius {
        accumulator.fill(0);
        let r = radius as f64;
        for &(x, y) in &edge_pixels {
            let mut angle = 0u32;
            while angle < 360 {
                let theta = (angle as f64).to_radians();
                let cx = (x as f64 - r * theta.cos()).round();
                let cy = (y as f64 - r * theta.sin()).round();
                if cx >= 0.0 && cy >= 0.0 && (cx as u32) < width && (cy as u32) < height {
                    accumulator[cy as usize * width as usize + cx as usize] += 1;
                }
                angle += cfg.circle_angle_step;
            }
        }
        for (idx, &votes) in accumulator.iter().enumerate() {
            if votes >= cfg.circle_vote_threshold {
                let cx = (idx % width as usize) as f64;
                let cy = (idx / width as usize) as f64;
                peaks.push((votes, Point::new(cx, cy)));
            }
        }
    }

    // Strongest peaks win; nearby weaker centers are the same dot.
    peaks.sort_by(|a, b| b.0.cmp(&a.0));
    let mut centers: Vec<Point> = Vec::new();
    for (_, candidate) in peaks {
        if centers
            .iter()
            .all(|c| c.distance_to(&candidate) >= cfg.circle_min_center_distance)
        {
            centers.push(candidate);
        }
    }
    centers
}

/// FAST-9 corners, strongest first, capped and spaced out. Catches dots
/// drawn as stroke intersections rather than filled circles.
fn detect_corners(gray: &GrayImage, cfg: &AnchorConfig) -> Vec<Point> {
    let mut corners = corners_fast9(gray, cfg.corner_threshold);
    corners.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut selected: Vec<Point> = Vec::new();
    for corner in corners {
        if selected.len() >= cfg.max_corners {
            break;
        }
        let p = Point::new(corner.x as f64, corner.y as f64);
        if selected
            .iter()
            .all(|s| s.distance_to(&p) >= cfg.corner_min_distance)
        {
            selected.push(p);
        }
    }
    selected
}

#[derive(Default)]
struct BlobStats {
    area: usize,
    sum_x: f64,
    sum_y: f64,
    perimeter: usize,
}

/// Connected foreground components filtered to dot-sized, dot-shaped
/// blobs. Catches dots that the circle and corner passes miss because of
/// uneven fill or anti-aliasing.
fn detect_blobs(binary: &GrayImage, cfg: &AnchorConfig) -> Vec<Point> {
    let (width, height) = binary.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let labeled = connected_components(binary, Connectivity::Eight, Luma([0u8]));

    let mut stats: BTreeMap<u32, BlobStats> = BTreeMap::new();
    for (x, y, pixel) in labeled.enumerate_pixels() {
        let label = pixel[0];
        if label == 0 {
            continue;
        }
        let entry = stats.entry(label).or_default();
        entry.area += 1;
        entry.sum_x += x as f64;
        entry.sum_y += y as f64;

        let on_image_border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
        let touches_background = on_image_border
            || labeled.get_pixel(x - 1, y)[0] != label
            || labeled.get_pixel(x + 1, y)[0] != label
            || labeled.get_pixel(x, y - 1)[0] != label
            || labeled.get_pixel(x, y + 1)[0] != label;
        if touches_background {
            entry.perimeter += 1;
        }
    }

    stats
        .values()
        .filter(|s| s.area >= cfg.blob_min_area && s.area <= cfg.blob_max_area)
        .filter(|s| {
            let area = s.area as f64;
            let perimeter = (s.perimeter as f64).max(1.0);
            let circularity = 4.0 * std::f64::consts::PI * area / (perimeter * perimeter);
            circularity >= cfg.blob_min_circularity
        })
        .map(|s| Point::new(s.sum_x / s.area as f64, s.sum_y / s.area as f64))
        .collect()
}

/// Density-based clustering with no minimum cluster size: clusters are
/// the connected components of the "within radius" relation, each
/// replaced by its centroid. Singletons are valid clusters.
pub fn cluster_candidates(points: &[Point], radius: f64) -> Vec<Point> {
    let mut assigned = vec![false; points.len()];
    let mut centroids = Vec::new();

    for start in 0..points.len() {
        if assigned[start] {
            continue;
        }
        assigned[start] = true;
        let mut queue = vec![start];
        let mut members: Vec<usize> = Vec::new();
        while let Some(current) = queue.pop() {
            members.push(current);
            for other in 0..points.len() {
                if !assigned[other] && points[current].distance_to(&points[other]) <= radius {
                    assigned[other] = true;
                    queue.push(other);
                }
            }
        }
        let n = members.len() as f64;
        let cx = members.iter().map(|&m| points[m].x).sum::<f64>() / n;
        let cy = members.iter().map(|&m| points[m].y).sum::<f64>() / n;
        centroids.push(Point::new(cx, cy));
    }
    centroids
}

fn grid_dimension(density: f64, cfg: &AnchorConfig) -> usize {
    if density > cfg.density_complex {
        5
    } else if density > cfg.density_medium {
        4
    } else {
        3
    }
}

fn synthetic_grid(width: f64, height: f64, size: usize, margin_ratio: f64) -> Vec<Point> {
    let margin = width.min(height) * margin_ratio;
    let xs = linspace(margin, width - margin, size);
    let ys = linspace(margin, height - margin, size);
    let mut dots = Vec::with_capacity(size * size);
    for &y in &ys {
        for &x in &xs {
            dots.push(Point::new(x, y));
        }
    }
    dots
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![(start + end) / 2.0];
    }
    (0..n)
        .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnchorConfig;
    use image::Rgb;
    use imageproc::drawing::draw_filled_circle_mut;

    fn white_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_blank_image_falls_back_to_smallest_grid() {
        let cfg = AnchorConfig::default();
        let detection = detect_anchors(&white_image(300, 300), &cfg);

        assert!(detection.synthetic_grid);
        assert_eq!(detection.anchors.len(), 9, "near-zero density selects 3x3");
        // Grid is inset by 10% of the smaller dimension from each edge.
        assert_eq!(detection.anchors[0], Point::new(30.0, 30.0));
        assert_eq!(detection.anchors[8], Point::new(270.0, 270.0));
        for anchor in &detection.anchors {
            assert!(anchor.x >= 30.0 && anchor.x <= 270.0);
            assert!(anchor.y >= 30.0 && anchor.y <= 270.0);
        }
    }

    #[test]
    fn test_dense_featureless_image_selects_largest_grid() {
        let cfg = AnchorConfig::default();
        let black = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
        let detection = detect_anchors(&black, &cfg);

        assert!(detection.synthetic_grid);
        assert_eq!(detection.anchors.len(), 25, "full density selects 5x5");
    }

    #[test]
    fn test_fallback_sizes_are_valid_grids() {
        let cfg = AnchorConfig::default();
        assert_eq!(grid_dimension(0.0, &cfg), 3);
        assert_eq!(grid_dimension(0.2, &cfg), 4);
        assert_eq!(grid_dimension(0.5, &cfg), 5);
        for g in [3usize, 4, 5] {
            let dots = synthetic_grid(500.0, 500.0, g, 0.1);
            assert_eq!(dots.len(), g * g);
        }
    }

    #[test]
    fn test_detects_drawn_dots() {
        let cfg = AnchorConfig::default();
        let mut img = white_image(200, 200);
        let centers = [(50i32, 50i32), (150, 150)];
        for &(cx, cy) in &centers {
            draw_filled_circle_mut(&mut img, (cx, cy), 4, Rgb([0, 0, 0]));
        }

        let detection = detect_anchors(&img, &cfg);
        assert!(!detection.synthetic_grid);
        for &(cx, cy) in &centers {
            let target = Point::new(cx as f64, cy as f64);
            let hit = detection
                .anchors
                .iter()
                .any(|a| a.distance_to(&target) < 10.0);
            assert!(hit, "expected an anchor near ({}, {})", cx, cy);
        }
    }

    #[test]
    fn test_clustering_is_idempotent_on_spread_points() {
        let spread = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(0.0, 100.0),
            Point::new(100.0, 100.0),
        ];
        let clustered = cluster_candidates(&spread, 15.0);
        assert_eq!(clustered.len(), spread.len());
        for (kept, original) in clustered.iter().zip(&spread) {
            assert_eq!(kept, original, "spread points must pass through unchanged");
        }
    }

    #[test]
    fn test_clustering_merges_neighbors_to_centroid() {
        let points = vec![
            Point::new(100.0, 100.0),
            Point::new(108.0, 100.0),
            Point::new(104.0, 106.0),
            Point::new(300.0, 300.0),
        ];
        let clustered = cluster_candidates(&points, 15.0);
        assert_eq!(clustered.len(), 2, "three close points collapse into one");
        let merged = clustered
            .iter()
            .find(|p| p.distance_to(&Point::new(104.0, 102.0)) < 5.0);
        assert!(merged.is_some(), "centroid should sit between the members");
    }

    #[test]
    fn test_cluster_chaining_follows_density() {
        // Each point is within radius of the next, so the whole chain is
        // one cluster even though the ends are far apart.
        let chain: Vec<Point> = (0..5).map(|i| Point::new(i as f64 * 10.0, 0.0)).collect();
        let clustered = cluster_candidates(&chain, 15.0);
        assert_eq!(clustered.len(), 1);
        assert_eq!(clustered[0], Point::new(20.0, 0.0));
    }
}
