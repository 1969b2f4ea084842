use crate::transform::Matrix;

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    // When true, recognized-but-unsupported elements (title, desc, use, ...) fail the
    // conversion and unknown fonts are errors. When false they are skipped/defaulted.
    pub strict: bool,
    // Font size for text that sets none.
    pub default_font_size: f64,
    // Target size in points. When set, the root viewBox is fitted into it.
    pub viewport: Option<(f64, f64)>,
    // Map y-down SVG space onto y-up page space (only with a viewport).
    pub flip_y: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            strict: true,
            default_font_size: 16.0,
            viewport: None,
            flip_y: true,
        }
    }
}

impl ConvertOptions {
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// Placement of the document in the viewport: "xMidYMid meet" scaling of
    /// `view_box` (or of `size` when there is no viewBox), then the optional flip.
    /// `None` when no viewport is configured.
    pub fn placement(
        &self,
        view_box: Option<(f64, f64, f64, f64)>,
        size: Option<(f64, f64)>,
    ) -> Option<Matrix> {
        let (w, h) = self.viewport?;
        let fit = match view_box.or_else(|| size.map(|(sw, sh)| (0.0, 0.0, sw, sh))) {
            Some((min_x, min_y, vb_w, vb_h)) if vb_w > 0.0 && vb_h > 0.0 => {
                let s = (w / vb_w).min(h / vb_h);
                let tx = (w - vb_w * s) * 0.5 - min_x * s;
                let ty = (h - vb_h * s) * 0.5 - min_y * s;
                Matrix::translate(tx, ty).mul(Matrix::scale(s, s))
            }
            _ => Matrix::IDENTITY,
        };
        if self.flip_y {
            Some(Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, h).mul(fit))
        } else {
            Some(fit)
        }
    }
}

/// Parses `min-x min-y width height`; non-positive sizes are rejected.
pub fn parse_view_box(input: &str) -> Option<(f64, f64, f64, f64)> {
    let nums: Vec<f64> = input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match nums.as_slice() {
        &[x, y, w, h] if w > 0.0 && h > 0.0 => Some((x, y, w, h)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_viewport_means_no_placement() {
        let opts = ConvertOptions::default();
        assert!(opts.strict);
        assert_eq!(opts.placement(Some((0.0, 0.0, 10.0, 10.0)), None), None);
    }

    #[test]
    fn view_box_is_centered_with_meet_and_flipped() {
        let opts = ConvertOptions {
            viewport: Some((200.0, 100.0)),
            ..ConvertOptions::default()
        };
        let m = opts
            .placement(parse_view_box("0 0 50 50"), None)
            .expect("viewport set");
        // Scale 2, centered horizontally, y flipped.
        assert_eq!(m.apply(0.0, 0.0), (50.0, 100.0));
        assert_eq!(m.apply(50.0, 50.0), (150.0, 0.0));

        let unflipped = ConvertOptions {
            flip_y: false,
            ..opts
        };
        let m = unflipped.placement(None, Some((100.0, 50.0))).expect("viewport set");
        assert_eq!(m.apply(100.0, 50.0), (200.0, 100.0));
    }

    #[test]
    fn view_box_parsing_rejects_bad_input() {
        assert_eq!(parse_view_box("0,0 10 20"), Some((0.0, 0.0, 10.0, 20.0)));
        assert_eq!(parse_view_box("0 0 0 20"), None);
        assert_eq!(parse_view_box("0 0 10"), None);
    }
}
