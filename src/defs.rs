// Definitions registry: id-keyed gradients, clip paths, masks and filters that
// visible nodes reference through `url(#id)`.

use crate::error::{GraphicError, Result};
use crate::geometry::PathOp;
use crate::transform::{Matrix, compose};
use crate::types::{Color, FillRule, Rect, Units};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub v: f64,
    pub is_percent: bool,
}

impl Coord {
    pub const fn fraction(v: f64) -> Self {
        Self {
            v,
            is_percent: true,
        }
    }

    pub fn parse(input: Option<&str>, default: Coord) -> Option<Coord> {
        let Some(s) = input else {
            return Some(default);
        };
        let s = s.trim();
        if let Some(p) = s.strip_suffix('%') {
            let v = p.trim().parse::<f64>().ok()?;
            return Some(Coord {
                v: v / 100.0,
                is_percent: true,
            });
        }
        let v = crate::cascade::parse_length(s)?;
        Some(Coord {
            v,
            is_percent: false,
        })
    }

    /// Resolves along an axis of `extent` starting at `origin`. Under bounding-box
    /// units plain numbers are already fractions of the box.
    fn resolve(self, units: Units, origin: f64, extent: f64) -> f64 {
        match units {
            Units::ObjectBoundingBox => self.v,
            Units::UserSpaceOnUse if self.is_percent => origin + extent * self.v,
            Units::UserSpaceOnUse => self.v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Spread {
    #[default]
    Pad,
    Reflect,
    Repeat,
}

impl Spread {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "pad" => Some(Spread::Pad),
            "reflect" => Some(Spread::Reflect),
            "repeat" => Some(Spread::Repeat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub offset: f64,
    pub color: Color,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradientKind {
    Linear {
        x1: Coord,
        y1: Coord,
        x2: Coord,
        y2: Coord,
    },
    Radial {
        cx: Coord,
        cy: Coord,
        r: Coord,
        fx: Coord,
        fy: Coord,
        fr: Coord,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub kind: GradientKind,
    pub units: Units,
    pub transform: Vec<Matrix>,
    pub spread: Spread,
    pub stops: Vec<Stop>,
    /// `href` target whose stops are inherited when this gradient has none.
    pub href: Option<String>,
}

/// Gradient geometry resolved against one painted shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGradient {
    /// Maps gradient space onto the shape's user space.
    pub matrix: Matrix,
    /// `[x0, y0, x1, y1]` for axial, `[fx, fy, fr, cx, cy, r]` for radial.
    pub coords: Vec<f64>,
    pub radial: bool,
}

impl Gradient {
    /// Places the gradient over a shape whose bounding box is `bbox`. Returns `None`
    /// when nothing would be painted (no stops, or a flat box under bounding-box units).
    pub fn resolve(&self, bbox: Rect) -> Option<ResolvedGradient> {
        if self.stops.is_empty() {
            return None;
        }
        let units = self.units;
        let bbox_matrix = match units {
            Units::ObjectBoundingBox => {
                if bbox.width <= 0.0 || bbox.height <= 0.0 {
                    return None;
                }
                Matrix::new(bbox.width, 0.0, 0.0, bbox.height, bbox.x, bbox.y)
            }
            Units::UserSpaceOnUse => Matrix::IDENTITY,
        };
        let matrix = bbox_matrix.mul(compose(&self.transform));

        let x = |c: Coord| c.resolve(units, bbox.x, bbox.width);
        let y = |c: Coord| c.resolve(units, bbox.y, bbox.height);
        let len = |c: Coord| match units {
            Units::UserSpaceOnUse if c.is_percent => {
                let diag = (bbox.width * bbox.width + bbox.height * bbox.height).sqrt();
                diag / std::f64::consts::SQRT_2 * c.v
            }
            _ => c.v,
        };

        let (coords, radial) = match self.kind {
            GradientKind::Linear { x1, y1, x2, y2 } => (vec![x(x1), y(y1), x(x2), y(y2)], false),
            GradientKind::Radial {
                cx,
                cy,
                r,
                fx,
                fy,
                fr,
            } => (
                vec![x(fx), y(fy), len(fr), x(cx), y(cy), len(r)],
                true,
            ),
        };
        Some(ResolvedGradient {
            matrix,
            coords,
            radial,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipPath {
    pub ops: Vec<PathOp>,
    pub units: Units,
    pub clip_rule: Option<FillRule>,
}

impl ClipPath {
    /// Clip geometry in the referencing node's user space.
    pub fn ops_for(&self, bbox: Option<Rect>) -> Vec<PathOp> {
        match (self.units, bbox) {
            (Units::ObjectBoundingBox, Some(b)) => crate::geometry::transform_ops(
                &self.ops,
                Matrix::new(b.width, 0.0, 0.0, b.height, b.x, b.y),
            ),
            _ => self.ops.clone(),
        }
    }
}

/// Position and size of a mask or filter region; unset sides use the SVG defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Region {
    pub x: Option<Coord>,
    pub y: Option<Coord>,
    pub width: Option<Coord>,
    pub height: Option<Coord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub region: Region,
    pub units: Units,
    pub content_units: Units,
    pub ops: Vec<PathOp>,
}

/// Filter primitives. None are supported, so a parsed filter never carries one.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub region: Region,
    pub units: Units,
    pub primitive_units: Units,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone)]
pub enum Definition {
    Gradient(Arc<Gradient>),
    ClipPath(Arc<ClipPath>),
    Mask(Arc<Mask>),
    Filter(Arc<Filter>),
}

impl Definition {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Definition::Gradient(_) => "gradient",
            Definition::ClipPath(_) => "clipPath",
            Definition::Mask(_) => "mask",
            Definition::Filter(_) => "filter",
        }
    }
}

/// One document's definitions. Ids are unique; a lookup of an unknown id or of an
/// id holding a different kind of definition is an error, never a silent miss.
#[derive(Debug, Default)]
pub struct Definitions {
    entries: HashMap<String, Definition>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Definition> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, tag: &str, id: &str, def: Definition) -> Result<()> {
        if self.entries.contains_key(id) {
            return Err(GraphicError::DuplicateDefinition {
                tag: tag.to_string(),
                id: id.to_string(),
            });
        }
        log::debug!("registered {} #{}", def.kind_name(), id);
        self.entries.insert(id.to_string(), def);
        Ok(())
    }

    pub fn gradient(&self, tag: &str, id: &str) -> Result<Arc<Gradient>> {
        match self.entries.get(id) {
            Some(Definition::Gradient(g)) => Ok(g.clone()),
            _ => Err(unresolved(tag, id, "gradient")),
        }
    }

    pub fn clip_path(&self, tag: &str, id: &str) -> Result<Arc<ClipPath>> {
        match self.entries.get(id) {
            Some(Definition::ClipPath(c)) => Ok(c.clone()),
            _ => Err(unresolved(tag, id, "clipPath")),
        }
    }

    pub fn mask(&self, tag: &str, id: &str) -> Result<Arc<Mask>> {
        match self.entries.get(id) {
            Some(Definition::Mask(m)) => Ok(m.clone()),
            _ => Err(unresolved(tag, id, "mask")),
        }
    }

    pub fn filter(&self, tag: &str, id: &str) -> Result<Arc<Filter>> {
        match self.entries.get(id) {
            Some(Definition::Filter(f)) => Ok(f.clone()),
            _ => Err(unresolved(tag, id, "filter")),
        }
    }
}

fn unresolved(tag: &str, id: &str, expected: &'static str) -> GraphicError {
    GraphicError::UnresolvedReference {
        tag: tag.to_string(),
        id: id.to_string(),
        expected,
    }
}

/// Copies stops down `href` chains onto gradients that declare none. Chains are
/// followed transitively; cycles and dangling targets leave the gradient stopless.
pub fn inherit_gradient_stops(gradients: &mut HashMap<String, Gradient>) {
    let ids: Vec<String> = gradients.keys().cloned().collect();
    for id in ids {
        if gradients.get(&id).is_none_or(|g| !g.stops.is_empty()) {
            continue;
        }
        let mut seen = vec![id.clone()];
        let mut next = gradients.get(&id).and_then(|g| g.href.clone());
        let mut inherited = None;
        while let Some(target) = next {
            if seen.contains(&target) {
                log::warn!("gradient #{id} has a cyclic href chain");
                break;
            }
            let Some(base) = gradients.get(&target) else {
                log::warn!("gradient #{id} inherits from undefined #{target}");
                break;
            };
            if !base.stops.is_empty() {
                inherited = Some(base.stops.clone());
                break;
            }
            seen.push(target);
            next = base.href.clone();
        }
        if let (Some(stops), Some(g)) = (inherited, gradients.get_mut(&id)) {
            g.stops = stops;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(stops: Vec<Stop>, href: Option<&str>) -> Gradient {
        Gradient {
            kind: GradientKind::Linear {
                x1: Coord::fraction(0.0),
                y1: Coord::fraction(0.0),
                x2: Coord::fraction(1.0),
                y2: Coord::fraction(0.0),
            },
            units: Units::ObjectBoundingBox,
            transform: Vec::new(),
            spread: Spread::Pad,
            stops,
            href: href.map(str::to_string),
        }
    }

    fn stop(offset: f64) -> Stop {
        Stop {
            offset,
            color: Color::BLACK,
            opacity: 1.0,
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut defs = Definitions::new();
        let g = Definition::Gradient(Arc::new(linear(vec![stop(0.0)], None)));
        defs.insert("linearGradient", "a", g.clone()).expect("first insert");
        let err = defs.insert("linearGradient", "a", g).expect_err("duplicate");
        assert!(matches!(err, GraphicError::DuplicateDefinition { id, .. } if id == "a"));
    }

    #[test]
    fn lookups_check_the_definition_kind() {
        let mut defs = Definitions::new();
        defs.insert(
            "clipPath",
            "c",
            Definition::ClipPath(Arc::new(ClipPath {
                ops: Vec::new(),
                units: Units::UserSpaceOnUse,
                clip_rule: None,
            })),
        )
        .expect("insert");
        assert!(defs.clip_path("rect", "c").is_ok());
        let err = defs.gradient("rect", "c").expect_err("wrong kind");
        assert!(matches!(err, GraphicError::UnresolvedReference { expected: "gradient", .. }));
        assert!(defs.mask("rect", "nope").is_err());
    }

    #[test]
    fn href_chains_donate_stops() {
        let mut map = HashMap::new();
        map.insert("base".to_string(), linear(vec![stop(0.0), stop(1.0)], None));
        map.insert("mid".to_string(), linear(Vec::new(), Some("base")));
        map.insert("top".to_string(), linear(Vec::new(), Some("mid")));
        map.insert("loop".to_string(), linear(Vec::new(), Some("loop")));
        inherit_gradient_stops(&mut map);
        assert_eq!(map["top"].stops.len(), 2);
        assert_eq!(map["mid"].stops.len(), 2);
        assert!(map["loop"].stops.is_empty());
    }

    #[test]
    fn bounding_box_gradient_maps_unit_square_onto_shape() {
        let g = linear(vec![stop(0.0)], None);
        let r = g.resolve(Rect::new(10.0, 20.0, 100.0, 50.0)).expect("has stops");
        assert_eq!(r.coords, vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(r.matrix.apply(1.0, 1.0), (110.0, 70.0));
        assert!(!r.radial);

        assert!(linear(Vec::new(), None).resolve(Rect::new(0.0, 0.0, 1.0, 1.0)).is_none());
        assert!(g.resolve(Rect::new(0.0, 0.0, 0.0, 5.0)).is_none());
    }

    #[test]
    fn bounding_box_clip_scales_into_node_box() {
        let clip = ClipPath {
            ops: vec![PathOp::MoveTo(0.5, 0.5)],
            units: Units::ObjectBoundingBox,
            clip_rule: None,
        };
        let ops = clip.ops_for(Some(Rect::new(10.0, 10.0, 20.0, 40.0)));
        assert_eq!(ops, vec![PathOp::MoveTo(20.0, 30.0)]);
    }
}
