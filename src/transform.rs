// 2D affine transforms and the `transform` attribute grammar.
//
// A transform list compiles to one matrix per function call (three for a pivoted
// rotate). Matrices are kept in written order; emitting them as successive `cm`
// operators yields the same frame as `compose`, where the last listed function is
// the one applied first to local geometry.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn rotate(deg: f64) -> Self {
        let rad = deg.to_radians();
        let s = libm::sin(rad);
        let c = libm::cos(rad);
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    pub fn skew(ax_deg: f64, ay_deg: f64) -> Self {
        let tx = libm::tan(ax_deg.to_radians());
        let ty = libm::tan(ay_deg.to_radians());
        Self::new(1.0, ty, tx, 1.0, 0.0, 0.0)
    }

    /// `self * other`: `other` is applied to a point first.
    pub fn mul(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }

    /// Geometric mean of the axis scales; used to carry radii through a transform.
    pub fn scale_factor(self) -> f64 {
        let det = self.a * self.d - self.b * self.c;
        libm::sqrt(det.abs())
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Folds a transform list into the single matrix it denotes, in written order:
/// `compose([M1, M2]) = M1 · M2`, so `M2` acts on local geometry before `M1`.
pub fn compose(ops: &[Matrix]) -> Matrix {
    ops.iter().fold(Matrix::IDENTITY, |acc, m| acc.mul(*m))
}

/// Parses a `transform` attribute. Returns `None` on any syntax error, unknown
/// function name or wrong argument count; an empty or blank input is an empty list.
pub fn parse_transform(input: &str) -> Option<Vec<Matrix>> {
    let mut out = Vec::new();
    let mut s = input.trim_start_matches(is_separator);

    while !s.is_empty() {
        let open = s.find('(')?;
        let name = s[..open].trim();
        let close = s[open + 1..].find(')')? + open + 1;
        let args = parse_args(&s[open + 1..close])?;

        match (name, args.as_slice()) {
            ("matrix", &[a, b, c, d, e, f]) => out.push(Matrix::new(a, b, c, d, e, f)),
            ("translate", &[tx]) => out.push(Matrix::translate(tx, 0.0)),
            ("translate", &[tx, ty]) => out.push(Matrix::translate(tx, ty)),
            ("translateX", &[tx]) => out.push(Matrix::translate(tx, 0.0)),
            ("translateY", &[ty]) => out.push(Matrix::translate(0.0, ty)),
            ("rotate", &[a]) => out.push(Matrix::rotate(a)),
            ("rotate", &[a, cx, cy]) => {
                out.push(Matrix::translate(cx, cy));
                out.push(Matrix::rotate(a));
                out.push(Matrix::translate(-cx, -cy));
            }
            ("scale", &[k]) => out.push(Matrix::scale(k, k)),
            ("scale", &[sx, sy]) => out.push(Matrix::scale(sx, sy)),
            ("scaleX", &[sx]) => out.push(Matrix::scale(sx, 1.0)),
            ("scaleY", &[sy]) => out.push(Matrix::scale(1.0, sy)),
            ("skew", &[a]) => out.push(Matrix::skew(a, a)),
            ("skew", &[ax, ay]) => out.push(Matrix::skew(ax, ay)),
            ("skewX", &[a]) => out.push(Matrix::skew(a, 0.0)),
            ("skewY", &[a]) => out.push(Matrix::skew(0.0, a)),
            _ => return None,
        }

        s = s[close + 1..].trim_start_matches(is_separator);
    }

    Some(out)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

fn parse_args(input: &str) -> Option<Vec<f64>> {
    input
        .split(is_separator)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn translate_then_rotate_composes_in_written_order() {
        let ops = parse_transform("translate(10,0) rotate(90)").expect("valid transform");
        assert_eq!(ops.len(), 2);
        let m = compose(&ops);

        // The frame is translated first, then rotated inside the translated frame,
        // so a local point is rotated before it is offset.
        let rotated = Matrix::rotate(90.0).apply(1.0, 0.0);
        let expected = Matrix::translate(10.0, 0.0).apply(rotated.0, rotated.1);
        assert!(close(m.apply(1.0, 0.0), expected));
        assert!(close(m.apply(1.0, 0.0), (10.0, 1.0)));

        let reversed = compose(&parse_transform("rotate(90) translate(10,0)").expect("valid"));
        assert!(close(reversed.apply(1.0, 0.0), (0.0, 11.0)));
    }

    #[test]
    fn pivoted_rotate_expands_to_three_matrices() {
        let ops = parse_transform("rotate(180 5 5)").expect("valid transform");
        assert_eq!(ops.len(), 3);
        // The pivot is a fixed point.
        assert!(close(compose(&ops).apply(5.0, 5.0), (5.0, 5.0)));
        assert!(close(compose(&ops).apply(0.0, 0.0), (10.0, 10.0)));
    }

    #[test]
    fn single_argument_forms_apply_to_both_axes() {
        let ops = parse_transform("scale(2)").expect("valid transform");
        assert_eq!(ops, vec![Matrix::scale(2.0, 2.0)]);

        let ops = parse_transform("translate(7)").expect("valid transform");
        assert_eq!(ops, vec![Matrix::translate(7.0, 0.0)]);

        let ops = parse_transform("skew(45)").expect("valid transform");
        assert!((ops[0].b - 1.0).abs() < 1e-9);
        assert!((ops[0].c - 1.0).abs() < 1e-9);
    }

    #[test]
    fn accepts_mixed_separators_and_axis_functions() {
        let ops = parse_transform(" matrix(1 0 0 1 3 4),translateY(2)  scaleX(3) ")
            .expect("valid transform");
        assert_eq!(ops.len(), 3);
        assert!(close(compose(&ops).apply(1.0, 0.0), (6.0, 6.0)));
    }

    #[test]
    fn rejects_malformed_lists() {
        assert!(parse_transform("translate(1,2").is_none());
        assert!(parse_transform("wobble(3)").is_none());
        assert!(parse_transform("matrix(1 0 0 1)").is_none());
        assert!(parse_transform("scale(a)").is_none());
        assert_eq!(parse_transform("   ").map(|v| v.len()), Some(0));
    }
}
