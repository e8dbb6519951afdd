//! Theme rasterization
//!
//! Executes a template's fill commands against a theme palette onto a pixel
//! surface. Fills run in document order with source-over compositing, so
//! later fills overlay earlier ones. Rendering is deterministic: the same
//! template and palette always produce byte-identical output.
//!
//! The returned buffer uses straight (non-premultiplied) alpha, converted
//! from tiny-skia's premultiplied surface, because the host image store and
//! the `image` crate both expect straight RGBA8.

use image::{Rgba, RgbaImage};
use svgtypes::{PathParser, PathSegment};
use thiserror::Error;
use tiny_skia::{Paint, PathBuilder, Pixmap, Transform};

use crate::color::{parse_color, ColorError};
use crate::palette::ThemePalette;
use crate::template::{FillColor, FillRule, VectorTemplate};

/// Render failure, fatal to this render only. The caller falls back to the
/// next-lower-precedence raster candidate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RasterError {
    #[error("cannot allocate a {width}x{height} surface")]
    Surface { width: u32, height: u32 },
    #[error("fill {index}: invalid color '{value}': {source}")]
    Color {
        index: usize,
        value: String,
        source: ColorError,
    },
}

/// Rasterize a template with a palette.
///
/// Palette-referenced fills resolve through the total swatch mapping;
/// literal colors are parsed here and an unparseable one fails the render.
/// Fill opacity multiplies the color's own alpha.
pub fn render_template(
    template: &VectorTemplate,
    palette: &ThemePalette,
) -> Result<RgbaImage, RasterError> {
    let (width, height) = (template.width, template.height);
    let mut pixmap = Pixmap::new(width, height).ok_or(RasterError::Surface { width, height })?;

    for (index, fill) in template.fills.iter().enumerate() {
        let Rgba([r, g, b, a]) = match &fill.color {
            FillColor::Palette(swatch) => palette.get(*swatch),
            FillColor::Literal(value) => {
                parse_color(value).map_err(|source| RasterError::Color {
                    index,
                    value: value.clone(),
                    source,
                })?
            }
        };

        let alpha = (f32::from(a) * fill.opacity.clamp(0.0, 1.0)).round() as u8;
        if alpha == 0 {
            continue;
        }

        // Degenerate path data (nothing fillable) skips the fill, matching
        // what a canvas does with an empty Path2D.
        let Some(path) = build_path(&fill.path) else {
            log::debug!("fill {}: no fillable geometry, skipped", index);
            continue;
        };

        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, alpha);
        paint.anti_alias = true;

        let rule = match fill.fill_rule {
            FillRule::NonZero => tiny_skia::FillRule::Winding,
            FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
        };
        pixmap.fill_path(&path, &paint, rule, Transform::identity(), None);
    }

    let mut data = pixmap.take();
    unpremultiply(&mut data);
    RgbaImage::from_raw(width, height, data).ok_or(RasterError::Surface { width, height })
}

/// Convert tiny-skia's premultiplied RGBA bytes to straight alpha in place.
fn unpremultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + u16::from(a) / 2) / u16::from(a)).min(255) as u8;
        }
    }
}

/// Interpret SVG path data into a fillable tiny-skia path.
///
/// Supports `M/L/H/V/C/S/Q/T/A/Z`, absolute and relative; arcs are flattened
/// to cubics. A syntax error stops interpretation at the error point and the
/// segments built so far still fill, which is how browsers treat broken path
/// data. Returns `None` when nothing fillable was produced.
fn build_path(data: &str) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    let mut cur = (0.0f32, 0.0f32);
    let mut subpath_start = cur;
    // Previous control points, for S/T reflection.
    let mut cubic_ctrl: Option<(f32, f32)> = None;
    let mut quad_ctrl: Option<(f32, f32)> = None;

    for segment in PathParser::from(data) {
        let Ok(segment) = segment else { break };

        let at = |abs: bool, x: f64, y: f64| -> (f32, f32) {
            if abs {
                (x as f32, y as f32)
            } else {
                (cur.0 + x as f32, cur.1 + y as f32)
            }
        };

        match segment {
            PathSegment::MoveTo { abs, x, y } => {
                cur = at(abs, x, y);
                subpath_start = cur;
                pb.move_to(cur.0, cur.1);
                (cubic_ctrl, quad_ctrl) = (None, None);
            }
            PathSegment::LineTo { abs, x, y } => {
                cur = at(abs, x, y);
                pb.line_to(cur.0, cur.1);
                (cubic_ctrl, quad_ctrl) = (None, None);
            }
            PathSegment::HorizontalLineTo { abs, x } => {
                cur.0 = if abs { x as f32 } else { cur.0 + x as f32 };
                pb.line_to(cur.0, cur.1);
                (cubic_ctrl, quad_ctrl) = (None, None);
            }
            PathSegment::VerticalLineTo { abs, y } => {
                cur.1 = if abs { y as f32 } else { cur.1 + y as f32 };
                pb.line_to(cur.0, cur.1);
                (cubic_ctrl, quad_ctrl) = (None, None);
            }
            PathSegment::CurveTo {
                abs,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let c1 = at(abs, x1, y1);
                let c2 = at(abs, x2, y2);
                let end = at(abs, x, y);
                pb.cubic_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1);
                cur = end;
                (cubic_ctrl, quad_ctrl) = (Some(c2), None);
            }
            PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
                let c1 = reflect(cur, cubic_ctrl);
                let c2 = at(abs, x2, y2);
                let end = at(abs, x, y);
                pb.cubic_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1);
                cur = end;
                (cubic_ctrl, quad_ctrl) = (Some(c2), None);
            }
            PathSegment::Quadratic { abs, x1, y1, x, y } => {
                let c1 = at(abs, x1, y1);
                let end = at(abs, x, y);
                pb.quad_to(c1.0, c1.1, end.0, end.1);
                cur = end;
                (cubic_ctrl, quad_ctrl) = (None, Some(c1));
            }
            PathSegment::SmoothQuadratic { abs, x, y } => {
                let c1 = reflect(cur, quad_ctrl);
                let end = at(abs, x, y);
                pb.quad_to(c1.0, c1.1, end.0, end.1);
                cur = end;
                (cubic_ctrl, quad_ctrl) = (None, Some(c1));
            }
            PathSegment::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let end = at(abs, x, y);
                if !arc_to_cubics(
                    &mut pb,
                    cur,
                    end,
                    rx.abs() as f32,
                    ry.abs() as f32,
                    x_axis_rotation as f32,
                    large_arc,
                    sweep,
                ) {
                    pb.line_to(end.0, end.1);
                }
                cur = end;
                (cubic_ctrl, quad_ctrl) = (None, None);
            }
            PathSegment::ClosePath { .. } => {
                pb.close();
                cur = subpath_start;
                (cubic_ctrl, quad_ctrl) = (None, None);
            }
        }
    }

    pb.finish()
}

/// Reflection of the previous control point through the current point, or the
/// current point itself when the previous segment set none.
fn reflect(cur: (f32, f32), prev: Option<(f32, f32)>) -> (f32, f32) {
    match prev {
        Some((px, py)) => (2.0 * cur.0 - px, 2.0 * cur.1 - py),
        None => cur,
    }
}

/// Flatten an SVG elliptical arc into cubic segments of at most 90 degrees,
/// using the endpoint-to-center parameterization from the SVG spec.
/// Returns false when the arc is degenerate and should fall back to a line.
#[allow(clippy::too_many_arguments)]
fn arc_to_cubics(
    pb: &mut PathBuilder,
    from: (f32, f32),
    to: (f32, f32),
    rx: f32,
    ry: f32,
    rotation_deg: f32,
    large_arc: bool,
    sweep: bool,
) -> bool {
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    let (x0, y0) = (f64::from(from.0), f64::from(from.1));
    let (x1, y1) = (f64::from(to.0), f64::from(to.1));
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return false;
    }
    if (x0 - x1).abs() < f64::EPSILON && (y0 - y1).abs() < f64::EPSILON {
        // Zero-length arc renders nothing.
        return true;
    }

    let mut rx = f64::from(rx);
    let mut ry = f64::from(ry);
    let (sin_phi, cos_phi) = f64::from(rotation_deg).to_radians().sin_cos();

    // Transform to the ellipse-aligned frame centered between the endpoints.
    let dx = (x0 - x1) / 2.0;
    let dy = (y0 - y1) / 2.0;
    let xp = cos_phi * dx + sin_phi * dy;
    let yp = -sin_phi * dx + cos_phi * dy;

    // Scale radii up if the endpoints cannot be connected with them.
    let lambda = (xp * xp) / (rx * rx) + (yp * yp) / (ry * ry);
    if lambda > 1.0 {
        let s = lambda.sqrt();
        rx *= s;
        ry *= s;
    }

    let denom = rx * rx * yp * yp + ry * ry * xp * xp;
    if denom.abs() < f64::EPSILON {
        return false;
    }
    let num = (rx * rx * ry * ry - denom).max(0.0);
    let sign = if large_arc == sweep { -1.0 } else { 1.0 };
    let coef = sign * (num / denom).sqrt();
    let cxp = coef * rx * yp / ry;
    let cyp = -coef * ry * xp / rx;

    let cx = cos_phi * cxp - sin_phi * cyp + (x0 + x1) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (y0 + y1) / 2.0;

    let angle = |ux: f64, uy: f64, vx: f64, vy: f64| (ux * vy - uy * vx).atan2(ux * vx + uy * vy);
    let v1 = ((xp - cxp) / rx, (yp - cyp) / ry);
    let v2 = ((-xp - cxp) / rx, (-yp - cyp) / ry);
    let mut theta = angle(1.0, 0.0, v1.0, v1.1);
    let mut delta = angle(v1.0, v1.1, v2.0, v2.1);
    if !sweep && delta > 0.0 {
        delta -= std::f64::consts::TAU;
    } else if sweep && delta < 0.0 {
        delta += std::f64::consts::TAU;
    }

    let segments = (delta.abs() / std::f64::consts::FRAC_PI_2).ceil().max(1.0) as usize;
    let step = delta / segments as f64;
    // Cubic approximation constant for a `step`-sized elliptical sweep.
    let k = 4.0 / 3.0 * (step / 4.0).tan();

    let place = |ex: f64, ey: f64| -> (f64, f64) {
        (
            cx + cos_phi * rx * ex - sin_phi * ry * ey,
            cy + sin_phi * rx * ex + cos_phi * ry * ey,
        )
    };

    for _ in 0..segments {
        let (sin_a, cos_a) = theta.sin_cos();
        let (sin_b, cos_b) = (theta + step).sin_cos();

        let (c1x, c1y) = place(cos_a - k * sin_a, sin_a + k * cos_a);
        let (c2x, c2y) = place(cos_b + k * sin_b, sin_b - k * cos_b);
        let (ex, ey) = place(cos_b, sin_b);
        pb.cubic_to(
            c1x as f32, c1y as f32, c2x as f32, c2y as f32, ex as f32, ey as f32,
        );

        theta += step;
    }

    true
}
