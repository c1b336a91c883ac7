use std::fmt::Write;

use crate::geometry::{PathElement, Point, CANVAS_SIZE};

const DOT_RADIUS: f64 = 3.0;
const STROKE_WIDTH: f64 = 2.0;

/// Serialize anchors and paths into an SVG document string with a fixed
/// 500x500 coordinate frame. Callers are responsible for rescaling their
/// geometry into that frame first. Every call builds a fresh document;
/// inputs are never mutated.
pub fn render_svg(dots: &[Point], paths: &[PathElement]) -> String {
    let size = CANVAS_SIZE as u32;
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"#
    );

    for dot in dots {
        let _ = writeln!(
            out,
            r#"  <circle cx="{:.2}" cy="{:.2}" r="{}" fill="black" />"#,
            dot.x, dot.y, DOT_RADIUS
        );
    }

    for path in paths {
        match path {
            PathElement::Line(line) => {
                let _ = writeln!(
                    out,
                    r#"  <line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="black" stroke-width="{}" />"#,
                    line.p1.x, line.p1.y, line.p2.x, line.p2.y, STROKE_WIDTH
                );
            }
            PathElement::Curve(curve) => {
                let _ = writeln!(
                    out,
                    r#"  <path d="M{:.2},{:.2} Q{:.2},{:.2} {:.2},{:.2}" stroke="black" fill="none" stroke-width="{}" />"#,
                    curve.p1.x, curve.p1.y, curve.ctrl.x, curve.ctrl.y, curve.p2.x, curve.p2.y,
                    STROKE_WIDTH
                );
            }
        }
    }

    out.push_str("</svg>\n");
    out
}
