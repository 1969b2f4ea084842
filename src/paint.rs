use crate::defs::{Definitions, Gradient};
use crate::error::{GraphicError, Result};
use crate::types::Color;
use lightningcss::traits::Parse;
use lightningcss::values::color::{CssColor, SRGB};
use std::sync::Arc;

/// A resolved fill or stroke. "No paint" is the absence of a `Paint`.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Color(Color),
    Gradient(Arc<Gradient>),
}

impl Paint {
    pub fn color(&self) -> Option<Color> {
        match self {
            Paint::Color(c) => Some(*c),
            Paint::Gradient(_) => None,
        }
    }
}

/// Resolves a raw `fill`/`stroke` value.
///
/// `none` means no paint; a missing value (or `inherit`) yields `default`; `url(#id)`
/// must name a gradient; anything else must parse as a color. `currentColor`
/// resolves to `current_color`.
pub fn resolve_paint(
    defs: &Definitions,
    tag: &str,
    attribute: &str,
    raw: Option<&str>,
    default: Option<Paint>,
    current_color: Color,
) -> Result<Option<Paint>> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(default);
    };
    if raw == "none" {
        return Ok(None);
    }
    if raw.is_empty() || raw == "inherit" {
        return Ok(default);
    }
    if starts_with_url(raw) {
        let id = parse_url_ref(raw)
            .ok_or_else(|| GraphicError::unsupported_attribute(tag, attribute, raw))?;
        let gradient = defs.gradient(tag, &id)?;
        return Ok(Some(Paint::Gradient(gradient)));
    }
    if raw.eq_ignore_ascii_case("currentcolor") {
        return Ok(Some(Paint::Color(current_color)));
    }
    parse_color(raw)
        .map(|c| Some(Paint::Color(c)))
        .ok_or_else(|| GraphicError::unsupported_attribute(tag, attribute, raw))
}

/// Specific (`fill-opacity`/`stroke-opacity`) wins over general (`opacity`). `None`
/// means fully opaque, so no graphics state needs allocating.
pub fn resolve_opacity(specific: Option<f64>, general: Option<f64>) -> Option<f64> {
    specific.or(general)
}

/// Parses an opacity as a number or percentage, clamped to `0..=1`.
pub fn parse_opacity(input: &str) -> Option<f64> {
    let s = input.trim();
    let v = match s.strip_suffix('%') {
        Some(p) => p.trim().parse::<f64>().ok()? / 100.0,
        None => s.parse::<f64>().ok()?,
    };
    v.is_finite().then(|| v.clamp(0.0, 1.0))
}

/// Named, hex and functional color syntax. Alpha is dropped; opacity properties
/// carry transparency.
pub fn parse_color(input: &str) -> Option<Color> {
    let color = CssColor::parse_string(input.trim()).ok()?;
    css_color_to_color(&color)
}

fn css_color_to_color(color: &CssColor) -> Option<Color> {
    if let CssColor::RGBA(rgba) = color {
        return Some(Color::from_rgb8(rgba.red, rgba.green, rgba.blue));
    }
    if let Ok(srgb) = SRGB::try_from(color) {
        return Some(Color::rgb(srgb.r as f64, srgb.g as f64, srgb.b as f64));
    }
    None
}

fn starts_with_url(s: &str) -> bool {
    s.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("url("))
}

/// Extracts `id` from `url(#id)`, `url('#id')` or `url("#id")`. Anything after the
/// closing parenthesis (a fallback paint) is ignored.
pub fn parse_url_ref(input: &str) -> Option<String> {
    let s = input.trim();
    if !starts_with_url(s) {
        return None;
    }
    let close = s.find(')')?;
    let inner = s[4..close].trim().trim_matches('"').trim_matches('\'');
    let id = inner.strip_prefix('#')?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::{Coord, Definition, GradientKind, Spread, Stop};
    use crate::types::Units;

    fn defs_with_gradient(id: &str) -> Definitions {
        let mut defs = Definitions::new();
        let g = Gradient {
            kind: GradientKind::Linear {
                x1: Coord::fraction(0.0),
                y1: Coord::fraction(0.0),
                x2: Coord::fraction(1.0),
                y2: Coord::fraction(0.0),
            },
            units: Units::ObjectBoundingBox,
            transform: Vec::new(),
            spread: Spread::Pad,
            stops: vec![Stop {
                offset: 0.0,
                color: Color::BLACK,
                opacity: 1.0,
            }],
            href: None,
        };
        defs.insert("linearGradient", id, Definition::Gradient(Arc::new(g)))
            .expect("insert");
        defs
    }

    fn resolve(defs: &Definitions, raw: Option<&str>) -> Result<Option<Paint>> {
        resolve_paint(
            defs,
            "rect",
            "fill",
            raw,
            Some(Paint::Color(Color::BLACK)),
            Color::rgb(0.0, 0.0, 1.0),
        )
    }

    #[test]
    fn none_differs_from_absent() {
        let defs = Definitions::new();
        assert_eq!(resolve(&defs, None).expect("ok"), Some(Paint::Color(Color::BLACK)));
        assert_eq!(resolve(&defs, Some("none")).expect("ok"), None);
        assert_eq!(resolve(&defs, Some("inherit")).expect("ok"), Some(Paint::Color(Color::BLACK)));
    }

    #[test]
    fn parses_color_syntaxes() {
        let defs = Definitions::new();
        for (raw, expected) in [
            ("red", Color::rgb(1.0, 0.0, 0.0)),
            ("#00ff00", Color::rgb(0.0, 1.0, 0.0)),
            ("#00f", Color::rgb(0.0, 0.0, 1.0)),
            ("rgb(255, 255, 255)", Color::rgb(1.0, 1.0, 1.0)),
        ] {
            assert_eq!(
                resolve(&defs, Some(raw)).expect(raw),
                Some(Paint::Color(expected)),
                "{raw}"
            );
        }
        assert_eq!(
            resolve(&defs, Some("currentColor")).expect("ok"),
            Some(Paint::Color(Color::rgb(0.0, 0.0, 1.0)))
        );
    }

    #[test]
    fn url_must_name_a_gradient() {
        let defs = defs_with_gradient("g");
        assert!(matches!(
            resolve(&defs, Some("url(#g)")).expect("ok"),
            Some(Paint::Gradient(_))
        ));
        assert!(matches!(
            resolve(&defs, Some("url('#g') red")).expect("ok"),
            Some(Paint::Gradient(_))
        ));
        let err = resolve(&defs, Some("url(#missing)")).expect_err("missing");
        assert!(matches!(err, GraphicError::UnresolvedReference { ref id, .. } if id == "missing"));
    }

    #[test]
    fn invalid_colors_are_errors() {
        let defs = Definitions::new();
        let err = resolve(&defs, Some("not-a-color")).expect_err("invalid");
        assert!(matches!(err, GraphicError::UnsupportedAttribute { .. }));
        let err = resolve(&defs, Some("url(nope)")).expect_err("invalid url");
        assert!(matches!(err, GraphicError::UnsupportedAttribute { .. }));
    }

    #[test]
    fn multibyte_values_are_rejected_not_sliced() {
        let defs = Definitions::new();
        for raw in ["aéé", "é", "ur€(#g)"] {
            let err = resolve(&defs, Some(raw)).expect_err(raw);
            assert!(matches!(err, GraphicError::UnsupportedAttribute { .. }), "{raw}");
        }
        assert_eq!(parse_url_ref("aéé"), None);
    }

    #[test]
    fn specific_opacity_wins() {
        assert_eq!(resolve_opacity(Some(0.3), Some(0.8)), Some(0.3));
        assert_eq!(resolve_opacity(None, Some(0.8)), Some(0.8));
        assert_eq!(resolve_opacity(None, None), None);
        assert_eq!(parse_opacity("50%"), Some(0.5));
        assert_eq!(parse_opacity("1.7"), Some(1.0));
        assert_eq!(parse_opacity("x"), None);
    }
}
