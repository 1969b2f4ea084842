// The resolved scene tree handed from the parser to the compiler. Every paint
// field is either absent or fully resolved; nothing here refers back to ids.

use crate::defs::{Filter, Mask};
use crate::embed::{FontHandle, ImageHandle};
use crate::geometry::{self, PathOp};
use crate::paint::Paint;
use crate::transform::{Matrix, compose};
use crate::types::{BlendMode, Color, Dash, FillRule, LineCap, LineJoin, Rect};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Geometry in the node's user space (after its own transform).
    pub ops: Vec<PathOp>,
    pub rule: FillRule,
}

/// State every node variant carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Base {
    pub transform: Vec<Matrix>,
    pub clip: Option<Clip>,
    pub mask: Option<Arc<Mask>>,
    pub filter: Option<Arc<Filter>>,
    pub blend_mode: Option<BlendMode>,
}

/// Inheritable paint properties. Groups carry them as defaults for their children;
/// the parser has already folded them into every descendant.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintStyle {
    pub fill: Option<Paint>,
    pub fill_rule: FillRule,
    pub fill_opacity: Option<f64>,
    pub stroke: Option<Paint>,
    pub stroke_width: Option<f64>,
    pub stroke_join: Option<LineJoin>,
    pub stroke_miter_limit: Option<f64>,
    pub stroke_dash: Option<Dash>,
    pub stroke_cap: Option<LineCap>,
    pub stroke_opacity: Option<f64>,
    /// General `opacity` in effect; images take it when they set none.
    pub opacity: Option<f64>,
    /// Value of the `color` property, consumed by `currentColor`.
    pub color: Color,
}

impl PaintStyle {
    /// Document defaults: opaque black fill, no stroke.
    pub fn root() -> Self {
        Self {
            fill: Some(Paint::Color(Color::BLACK)),
            fill_rule: FillRule::NonZero,
            fill_opacity: None,
            stroke: None,
            stroke_width: None,
            stroke_join: None,
            stroke_miter_limit: None,
            stroke_dash: None,
            stroke_cap: None,
            stroke_opacity: None,
            opacity: None,
            color: Color::BLACK,
        }
    }
}

impl Default for PaintStyle {
    fn default() -> Self {
        Self::root()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub ops: Vec<PathOp>,
    pub paint: PaintStyle,
    pub base: Base,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextSegment {
    Literal(String),
    Nested(Text),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub font: FontHandle,
    pub font_size: f64,
    pub fill: Option<Paint>,
    pub stroke: Option<Paint>,
    pub fill_opacity: Option<f64>,
    pub stroke_opacity: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub segments: Vec<TextSegment>,
    pub base: Base,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub image: ImageHandle,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: Option<f64>,
    pub base: Base,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub children: Vec<SceneNode>,
    pub paint: PaintStyle,
    pub base: Base,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Shape(Shape),
    Text(Text),
    Image(Image),
    Group(Group),
}

impl SceneNode {
    pub fn base(&self) -> &Base {
        match self {
            SceneNode::Shape(s) => &s.base,
            SceneNode::Text(t) => &t.base,
            SceneNode::Image(i) => &i.base,
            SceneNode::Group(g) => &g.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut Base {
        match self {
            SceneNode::Shape(s) => &mut s.base,
            SceneNode::Text(t) => &mut t.base,
            SceneNode::Image(i) => &mut i.base,
            SceneNode::Group(g) => &mut g.base,
        }
    }

    /// Bounding box in the node's own user space (before its transform). Text has
    /// no metrics here and reports `None`.
    pub fn bbox(&self) -> Option<Rect> {
        match self {
            SceneNode::Shape(s) => geometry::bbox(&s.ops),
            SceneNode::Image(i) => Some(Rect::new(i.x, i.y, i.width, i.height)),
            SceneNode::Text(_) => None,
            SceneNode::Group(g) => {
                let corners: Vec<(f64, f64)> = g
                    .children
                    .iter()
                    .filter_map(|child| {
                        let b = child.bbox()?;
                        let m = compose(&child.base().transform);
                        Some([
                            m.apply(b.x, b.y),
                            m.apply(b.x + b.width, b.y),
                            m.apply(b.x, b.y + b.height),
                            m.apply(b.x + b.width, b.y + b.height),
                        ])
                    })
                    .flatten()
                    .collect();
                let ops: Vec<PathOp> = corners
                    .into_iter()
                    .map(|(x, y)| PathOp::LineTo(x, y))
                    .collect();
                geometry::bbox(&ops)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, side: f64) -> SceneNode {
        SceneNode::Shape(Shape {
            ops: geometry::rect(x, y, side, side, None, None),
            paint: PaintStyle::root(),
            base: Base::default(),
        })
    }

    #[test]
    fn group_bbox_unions_transformed_children() {
        let mut moved = square(0.0, 0.0, 10.0);
        moved.base_mut().transform = vec![Matrix::translate(20.0, 5.0)];
        let group = SceneNode::Group(Group {
            children: vec![square(0.0, 0.0, 10.0), moved],
            paint: PaintStyle::root(),
            base: Base::default(),
        });
        assert_eq!(group.bbox(), Some(Rect::new(0.0, 0.0, 30.0, 15.0)));
    }

    #[test]
    fn root_paint_is_black_fill_without_stroke() {
        let paint = PaintStyle::root();
        assert_eq!(paint.fill, Some(Paint::Color(Color::BLACK)));
        assert_eq!(paint.stroke, None);
    }
}
