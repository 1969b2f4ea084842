// Shape flattening.
//
// Every primitive reduces to MoveTo/LineTo/CurveTo/ClosePath. Quadratics and
// elliptical arcs become cubics; circles and ellipses run through the same arc
// solver as the `A` path command.

use crate::error::{GraphicError, Result};
use crate::transform::Matrix;
use crate::types::Rect;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    /// Two control points then the end point.
    CurveTo(f64, f64, f64, f64, f64, f64),
    ClosePath,
}

/// Circular-arc Bezier constant for a quarter turn.
pub const KAPPA: f64 = 4.0 / 3.0 * (std::f64::consts::SQRT_2 - 1.0);

pub fn rect(x: f64, y: f64, w: f64, h: f64, rx: Option<f64>, ry: Option<f64>) -> Vec<PathOp> {
    // A missing radius takes the other one; both are clamped to half the side.
    let (rx, ry) = match (rx, ry) {
        (Some(rx), Some(ry)) => (rx, ry),
        (Some(r), None) | (None, Some(r)) => (r, r),
        (None, None) => (0.0, 0.0),
    };
    let rx = rx.max(0.0).min(w / 2.0);
    let ry = ry.max(0.0).min(h / 2.0);

    if rx <= 0.0 || ry <= 0.0 {
        return vec![
            PathOp::MoveTo(x, y),
            PathOp::LineTo(x + w, y),
            PathOp::LineTo(x + w, y + h),
            PathOp::LineTo(x, y + h),
            PathOp::LineTo(x, y),
            PathOp::ClosePath,
        ];
    }

    let kx = rx * KAPPA;
    let ky = ry * KAPPA;
    let right = x + w;
    let bottom = y + h;
    vec![
        PathOp::MoveTo(x + rx, y),
        PathOp::LineTo(right - rx, y),
        PathOp::CurveTo(right - rx + kx, y, right, y + ry - ky, right, y + ry),
        PathOp::LineTo(right, bottom - ry),
        PathOp::CurveTo(
            right,
            bottom - ry + ky,
            right - rx + kx,
            bottom,
            right - rx,
            bottom,
        ),
        PathOp::LineTo(x + rx, bottom),
        PathOp::CurveTo(x + rx - kx, bottom, x, bottom - ry + ky, x, bottom - ry),
        PathOp::LineTo(x, y + ry),
        PathOp::CurveTo(x, y + ry - ky, x + rx - kx, y, x + rx, y),
        PathOp::ClosePath,
    ]
}

pub fn circle(cx: f64, cy: f64, r: f64) -> Vec<PathOp> {
    ellipse(cx, cy, r, r)
}

/// A full revolution from angle 0 through the arc solver. The final end point is
/// pinned to the start so the outline closes without a seam.
pub fn ellipse(cx: f64, cy: f64, rx: f64, ry: f64) -> Vec<PathOp> {
    let rx = rx.abs();
    let ry = ry.abs();
    let mut ops = vec![PathOp::MoveTo(cx + rx, cy)];
    ops.extend(arc_segments(cx, cy, rx, ry, 0.0, 1.0, 0.0, 2.0 * PI));
    if let Some(PathOp::CurveTo(_, _, _, _, ex, ey)) = ops.last_mut() {
        *ex = cx + rx;
        *ey = cy;
    }
    ops.push(PathOp::ClosePath);
    ops
}

pub fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<PathOp> {
    vec![
        PathOp::MoveTo(x1, y1),
        PathOp::LineTo(x2, y2),
        PathOp::ClosePath,
    ]
}

pub fn polyline(points: &[(f64, f64)]) -> Vec<PathOp> {
    let mut ops = Vec::with_capacity(points.len());
    let mut it = points.iter();
    if let Some(&(x, y)) = it.next() {
        ops.push(PathOp::MoveTo(x, y));
    }
    ops.extend(it.map(|&(x, y)| PathOp::LineTo(x, y)));
    ops
}

pub fn polygon(points: &[(f64, f64)]) -> Vec<PathOp> {
    let mut ops = polyline(points);
    if !ops.is_empty() {
        ops.push(PathOp::ClosePath);
    }
    ops
}

/// Parses a `points` list. An odd number of coordinates is rejected.
pub fn parse_points(input: &str) -> Option<Vec<(f64, f64)>> {
    let nums = input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if nums.len() % 2 != 0 {
        return None;
    }
    Some(nums.chunks_exact(2).map(|p| (p[0], p[1])).collect())
}

pub fn transform_ops(ops: &[PathOp], m: Matrix) -> Vec<PathOp> {
    ops.iter()
        .map(|op| match *op {
            PathOp::MoveTo(x, y) => {
                let (x, y) = m.apply(x, y);
                PathOp::MoveTo(x, y)
            }
            PathOp::LineTo(x, y) => {
                let (x, y) = m.apply(x, y);
                PathOp::LineTo(x, y)
            }
            PathOp::CurveTo(x1, y1, x2, y2, x, y) => {
                let (x1, y1) = m.apply(x1, y1);
                let (x2, y2) = m.apply(x2, y2);
                let (x, y) = m.apply(x, y);
                PathOp::CurveTo(x1, y1, x2, y2, x, y)
            }
            PathOp::ClosePath => PathOp::ClosePath,
        })
        .collect()
}

/// Control-point bounding box. Curves may bulge less than this, never more.
pub fn bbox(ops: &[PathOp]) -> Option<Rect> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    let mut include = |x: f64, y: f64| {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    };
    for op in ops {
        match *op {
            PathOp::MoveTo(x, y) | PathOp::LineTo(x, y) => include(x, y),
            PathOp::CurveTo(x1, y1, x2, y2, x, y) => {
                include(x1, y1);
                include(x2, y2);
                include(x, y);
            }
            PathOp::ClosePath => {}
        }
    }

    if !min_x.is_finite() || !min_y.is_finite() {
        return None;
    }
    Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

fn quad_to_cubic(x0: f64, y0: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> (f64, f64, f64, f64) {
    let c1x = x0 + (2.0 / 3.0) * (x1 - x0);
    let c1y = y0 + (2.0 / 3.0) * (y1 - y0);
    let c2x = x2 + (2.0 / 3.0) * (x1 - x2);
    let c2y = y2 + (2.0 / 3.0) * (y1 - y2);
    (c1x, c1y, c2x, c2y)
}

/// Endpoint-parameterized elliptical arc to cubics (SVG 1.1 implementation notes, F.6.5).
/// Zero radii or coincident endpoints degrade to a straight line.
#[allow(clippy::too_many_arguments)]
pub fn arc_to_cubics(
    x0: f64,
    y0: f64,
    rx: f64,
    ry: f64,
    x_axis_rotation_deg: f64,
    large_arc: bool,
    sweep: bool,
    x1: f64,
    y1: f64,
) -> Vec<PathOp> {
    let mut rx = rx.abs();
    let mut ry = ry.abs();
    if rx == 0.0 || ry == 0.0 || (x0 == x1 && y0 == y1) {
        return vec![PathOp::LineTo(x1, y1)];
    }

    let phi = x_axis_rotation_deg.to_radians();
    let sin_phi = libm::sin(phi);
    let cos_phi = libm::cos(phi);

    // Into the unrotated ellipse frame, centered on the chord midpoint.
    let dx2 = (x0 - x1) / 2.0;
    let dy2 = (y0 - y1) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    // Radii too small to span the chord are scaled up uniformly.
    let x1p2 = x1p * x1p;
    let y1p2 = y1p * y1p;
    let lambda = x1p2 / (rx * rx) + y1p2 / (ry * ry);
    if lambda > 1.0 {
        let s = libm::sqrt(lambda);
        rx *= s;
        ry *= s;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1p2 - ry2 * x1p2;
    let den = rx2 * y1p2 + ry2 * x1p2;
    let coef = if den != 0.0 {
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        sign * libm::sqrt((num / den).max(0.0))
    } else {
        0.0
    };
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    let cx = cos_phi * cxp - sin_phi * cyp + (x0 + x1) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (y0 + y1) / 2.0;

    fn angle(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
        libm::atan2(ux * vy - uy * vx, ux * vx + uy * vy)
    }

    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let theta1 = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);
    if !sweep && dtheta > 0.0 {
        dtheta -= 2.0 * PI;
    } else if sweep && dtheta < 0.0 {
        dtheta += 2.0 * PI;
    }

    let mut ops = arc_segments(cx, cy, rx, ry, sin_phi, cos_phi, theta1, dtheta);
    // Land exactly on the requested end point.
    if let Some(PathOp::CurveTo(_, _, _, _, ex, ey)) = ops.last_mut() {
        *ex = x1;
        *ey = y1;
    }
    ops
}

/// Center-parameterized arc from `theta1` sweeping `dtheta`, split into segments of at
/// most 90 degrees.
#[allow(clippy::too_many_arguments)]
fn arc_segments(
    cx: f64,
    cy: f64,
    rx: f64,
    ry: f64,
    sin_phi: f64,
    cos_phi: f64,
    theta1: f64,
    dtheta: f64,
) -> Vec<PathOp> {
    let count = libm::ceil(dtheta.abs() / (PI / 2.0) - 1e-9).max(1.0) as usize;
    let delta = dtheta / count as f64;
    let k = (4.0 / 3.0) * libm::tan(delta / 4.0);

    let map = |ux: f64, uy: f64| -> (f64, f64) {
        let x = rx * ux;
        let y = ry * uy;
        (
            cx + cos_phi * x - sin_phi * y,
            cy + sin_phi * x + cos_phi * y,
        )
    };

    let mut ops = Vec::with_capacity(count);
    let mut t1 = theta1;
    for _ in 0..count {
        let t2 = t1 + delta;
        let (s1, c1) = (libm::sin(t1), libm::cos(t1));
        let (s2, c2) = (libm::sin(t2), libm::cos(t2));
        let (c1x, c1y) = map(c1 - k * s1, s1 + k * c1);
        let (c2x, c2y) = map(c2 + k * s2, s2 - k * c2);
        let (ex, ey) = map(c2, s2);
        ops.push(PathOp::CurveTo(c1x, c1y, c2x, c2y, ex, ey));
        t1 = t2;
    }
    ops
}

/// Interprets SVG path data. Any syntax error fails the whole path rather than
/// truncating it.
pub fn parse_path_data(d: &str) -> Result<Vec<PathOp>> {
    let mut ops = Vec::new();
    let mut p = PathParser::new(d);
    let mut cmd: Option<u8> = None;
    let mut cur = (0.0, 0.0);
    let mut start = (0.0, 0.0);
    let mut last_cubic_ctrl: Option<(f64, f64)> = None;
    let mut last_quad_ctrl: Option<(f64, f64)> = None;

    loop {
        p.skip_ws();
        let Some(b) = p.peek() else { break };

        let c = if b.is_ascii_alphabetic() {
            p.i += 1;
            if !b"MmLlHhVvCcSsQqTtAaZz".contains(&b) {
                return Err(p.error(format!("unknown command '{}'", b as char)));
            }
            if cmd.is_none() && !matches!(b, b'M' | b'm') {
                return Err(p.error("path data must begin with a moveto"));
            }
            b
        } else {
            // Implicit repetition; a repeated moveto continues as lineto.
            match cmd {
                None => return Err(p.error("path data must begin with a moveto")),
                Some(b'Z' | b'z') => return Err(p.error("unexpected number after closepath")),
                Some(b'M') => b'L',
                Some(b'm') => b'l',
                Some(prev) => prev,
            }
        };
        cmd = Some(c);
        let rel = c.is_ascii_lowercase();
        let offset = |x: f64, y: f64, cur: (f64, f64)| {
            if rel { (cur.0 + x, cur.1 + y) } else { (x, y) }
        };

        match c.to_ascii_uppercase() {
            b'M' => {
                let (x, y) = p.pair()?;
                let (x, y) = offset(x, y, cur);
                ops.push(PathOp::MoveTo(x, y));
                cur = (x, y);
                start = cur;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            b'L' => {
                let (x, y) = p.pair()?;
                let (x, y) = offset(x, y, cur);
                ops.push(PathOp::LineTo(x, y));
                cur = (x, y);
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            b'H' => {
                let x = p.number()?;
                let x = if rel { cur.0 + x } else { x };
                ops.push(PathOp::LineTo(x, cur.1));
                cur.0 = x;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            b'V' => {
                let y = p.number()?;
                let y = if rel { cur.1 + y } else { y };
                ops.push(PathOp::LineTo(cur.0, y));
                cur.1 = y;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            b'C' => {
                let (x1, y1) = p.pair()?;
                let (x2, y2) = p.pair()?;
                let (x, y) = p.pair()?;
                let (x1, y1) = offset(x1, y1, cur);
                let (x2, y2) = offset(x2, y2, cur);
                let (x, y) = offset(x, y, cur);
                ops.push(PathOp::CurveTo(x1, y1, x2, y2, x, y));
                cur = (x, y);
                last_cubic_ctrl = Some((x2, y2));
                last_quad_ctrl = None;
            }
            b'S' => {
                let (x2, y2) = p.pair()?;
                let (x, y) = p.pair()?;
                let (x2, y2) = offset(x2, y2, cur);
                let (x, y) = offset(x, y, cur);
                let (x1, y1) = match last_cubic_ctrl {
                    Some((px, py)) => (2.0 * cur.0 - px, 2.0 * cur.1 - py),
                    None => cur,
                };
                ops.push(PathOp::CurveTo(x1, y1, x2, y2, x, y));
                cur = (x, y);
                last_cubic_ctrl = Some((x2, y2));
                last_quad_ctrl = None;
            }
            b'Q' => {
                let (qx, qy) = p.pair()?;
                let (x, y) = p.pair()?;
                let (qx, qy) = offset(qx, qy, cur);
                let (x, y) = offset(x, y, cur);
                let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur.0, cur.1, qx, qy, x, y);
                ops.push(PathOp::CurveTo(c1x, c1y, c2x, c2y, x, y));
                cur = (x, y);
                last_quad_ctrl = Some((qx, qy));
                last_cubic_ctrl = None;
            }
            b'T' => {
                let (x, y) = p.pair()?;
                let (x, y) = offset(x, y, cur);
                let (qx, qy) = match last_quad_ctrl {
                    Some((px, py)) => (2.0 * cur.0 - px, 2.0 * cur.1 - py),
                    None => cur,
                };
                let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur.0, cur.1, qx, qy, x, y);
                ops.push(PathOp::CurveTo(c1x, c1y, c2x, c2y, x, y));
                cur = (x, y);
                last_quad_ctrl = Some((qx, qy));
                last_cubic_ctrl = None;
            }
            b'A' => {
                let rx = p.number()?;
                let ry = p.number()?;
                let rot = p.number()?;
                let large = p.flag()?;
                let sweep = p.flag()?;
                let (x, y) = p.pair()?;
                let (x, y) = offset(x, y, cur);
                let curves = arc_to_cubics(cur.0, cur.1, rx, ry, rot, large, sweep, x, y);
                ops.extend(curves);
                cur = (x, y);
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            // Z
            _ => {
                ops.push(PathOp::ClosePath);
                cur = start;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
        }
    }

    Ok(ops)
}

struct PathParser<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b' ' | b'\n' | b'\r' | b'\t' | b',') = self.peek() {
            self.i += 1;
        }
    }

    fn error(&self, reason: impl Into<String>) -> GraphicError {
        GraphicError::MalformedPath {
            position: self.i,
            reason: reason.into(),
        }
    }

    fn number(&mut self) -> Result<f64> {
        self.skip_ws();
        let start = self.i;
        let mut digits = false;

        if let Some(b'+' | b'-') = self.peek() {
            self.i += 1;
        }
        while let Some(b'0'..=b'9') = self.peek() {
            self.i += 1;
            digits = true;
        }
        if let Some(b'.') = self.peek() {
            self.i += 1;
            while let Some(b'0'..=b'9') = self.peek() {
                self.i += 1;
                digits = true;
            }
        }
        if !digits {
            self.i = start;
            return Err(self.error("expected a number"));
        }
        if let Some(b'e' | b'E') = self.peek() {
            let mark = self.i;
            self.i += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.i += 1;
            }
            let exp_start = self.i;
            while let Some(b'0'..=b'9') = self.peek() {
                self.i += 1;
            }
            if self.i == exp_start {
                self.i = mark;
                return Err(self.error("incomplete exponent"));
            }
        }

        std::str::from_utf8(&self.bytes[start..self.i])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| self.error("expected a number"))
    }

    fn pair(&mut self) -> Result<(f64, f64)> {
        let x = self.number()?;
        let y = self.number()?;
        Ok((x, y))
    }

    fn flag(&mut self) -> Result<bool> {
        self.skip_ws();
        match self.peek() {
            Some(b'0') => {
                self.i += 1;
                Ok(false)
            }
            Some(b'1') => {
                self.i += 1;
                Ok(true)
            }
            _ => Err(self.error("arc flag must be 0 or 1")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(ops: &[PathOp], pred: impl Fn(&PathOp) -> bool) -> usize {
        ops.iter().filter(|op| pred(op)).count()
    }

    #[test]
    fn square_rect_has_four_lines_and_no_curves() {
        let ops = rect(0.0, 0.0, 10.0, 10.0, None, None);
        assert_eq!(ops[0], PathOp::MoveTo(0.0, 0.0));
        assert_eq!(count(&ops, |op| matches!(op, PathOp::LineTo(..))), 4);
        assert_eq!(count(&ops, |op| matches!(op, PathOp::CurveTo(..))), 0);
        assert_eq!(count(&ops, |op| matches!(op, PathOp::ClosePath)), 1);

        let zero = rect(0.0, 0.0, 10.0, 10.0, Some(0.0), Some(0.0));
        assert_eq!(zero, ops);
    }

    #[test]
    fn rounded_rect_has_four_corner_curves_starting_after_corner() {
        let ops = rect(0.0, 0.0, 20.0, 10.0, Some(2.0), Some(2.0));
        assert_eq!(ops[0], PathOp::MoveTo(2.0, 0.0));
        assert_eq!(ops[1], PathOp::LineTo(18.0, 0.0));
        assert_eq!(count(&ops, |op| matches!(op, PathOp::CurveTo(..))), 4);
        assert!(matches!(ops[2], PathOp::CurveTo(_, _, _, _, x, y) if x == 20.0 && y == 2.0));
        assert_eq!(ops.last(), Some(&PathOp::ClosePath));
    }

    #[test]
    fn rounded_rect_radius_defaults_and_clamps() {
        let ops = rect(0.0, 0.0, 10.0, 4.0, Some(3.0), None);
        // ry takes rx, then clamps to h/2.
        assert!(matches!(ops[2], PathOp::CurveTo(_, _, _, _, x, y) if x == 10.0 && y == 2.0));
    }

    #[test]
    fn circle_stays_within_tolerance_of_analytic_circle() {
        let (cx, cy, r) = (5.0, -3.0, 40.0);
        let ops = circle(cx, cy, r);
        let mut prev = match ops[0] {
            PathOp::MoveTo(x, y) => (x, y),
            other => panic!("expected MoveTo, got {other:?}"),
        };
        let mut curves = 0;
        for op in &ops[1..] {
            if let PathOp::CurveTo(x1, y1, x2, y2, x, y) = *op {
                for t in [0.125, 0.25, 0.5, 0.75, 0.875] {
                    let mt = 1.0 - t;
                    let px = mt * mt * mt * prev.0
                        + 3.0 * mt * mt * t * x1
                        + 3.0 * mt * t * t * x2
                        + t * t * t * x;
                    let py = mt * mt * mt * prev.1
                        + 3.0 * mt * mt * t * y1
                        + 3.0 * mt * t * t * y2
                        + t * t * t * y;
                    let dist = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
                    assert!((dist - r).abs() < 1e-3 * r, "deviation at t={t}: {dist}");
                }
                prev = (x, y);
                curves += 1;
            }
        }
        assert_eq!(curves, 4);
        // Closes exactly on the start point.
        assert_eq!(prev, (cx + r, cy));
        assert_eq!(ops.last(), Some(&PathOp::ClosePath));
    }

    #[test]
    fn line_and_polys_have_expected_shape() {
        assert_eq!(
            line(0.0, 0.0, 3.0, 4.0),
            vec![
                PathOp::MoveTo(0.0, 0.0),
                PathOp::LineTo(3.0, 4.0),
                PathOp::ClosePath
            ]
        );
        let pts = parse_points("0,0 10,0 10 10").expect("even point list");
        assert_eq!(polyline(&pts).len(), 3);
        assert_eq!(polygon(&pts).last(), Some(&PathOp::ClosePath));
        assert!(!polyline(&pts).contains(&PathOp::ClosePath));
        assert!(parse_points("0,0 10").is_none());
    }

    #[test]
    fn parses_absolute_and_relative_commands() {
        let ops = parse_path_data("M10 10 l5 0 h5 v5 H10 Z m1 1 2 2").expect("valid path");
        assert_eq!(
            ops,
            vec![
                PathOp::MoveTo(10.0, 10.0),
                PathOp::LineTo(15.0, 10.0),
                PathOp::LineTo(20.0, 10.0),
                PathOp::LineTo(20.0, 15.0),
                PathOp::LineTo(10.0, 15.0),
                PathOp::ClosePath,
                PathOp::MoveTo(11.0, 11.0),
                PathOp::LineTo(13.0, 13.0),
            ]
        );
    }

    #[test]
    fn quadratics_and_smooth_curves_become_cubics() {
        let ops = parse_path_data("M0 0 Q 10 0 10 10 T 20 20 C 1 2 3 4 5 6 S 7 8 9 10")
            .expect("valid path");
        assert_eq!(count(&ops, |op| matches!(op, PathOp::CurveTo(..))), 4);
        // S reflects the previous second control point (3,4) about (5,6).
        assert!(matches!(ops[4], PathOp::CurveTo(x1, y1, ..) if x1 == 7.0 && y1 == 8.0));
    }

    #[test]
    fn arc_command_ends_on_requested_point() {
        let ops = parse_path_data("M10 10 A5 5 0 01 20 20").expect("compact flags");
        assert!(ops.len() >= 2);
        assert!(matches!(ops.last(), Some(PathOp::CurveTo(.., x, y)) if *x == 20.0 && *y == 20.0));
    }

    #[test]
    fn degenerate_arc_is_a_line() {
        let ops = parse_path_data("M0 0 A0 5 0 0 1 10 0").expect("valid path");
        assert_eq!(ops[1], PathOp::LineTo(10.0, 0.0));
    }

    #[test]
    fn half_circle_arc_splits_into_quarter_segments() {
        let ops = arc_to_cubics(0.0, 0.0, 5.0, 5.0, 0.0, false, true, 10.0, 0.0);
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn malformed_path_data_fails() {
        for bad in ["M 0 0 L 10", "L 0 0", "M0 0 X 1 1", "M0 0 A5 5 0 2 1 3 3", "M0 0 Z 4"] {
            let err = parse_path_data(bad).expect_err(bad);
            assert!(matches!(err, GraphicError::MalformedPath { .. }), "{bad}");
        }
    }

    #[test]
    fn bbox_covers_control_points() {
        let ops = rect(1.0, 2.0, 3.0, 4.0, None, None);
        assert_eq!(bbox(&ops), Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(bbox(&[]), None);
    }
}
