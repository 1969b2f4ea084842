// Scene tree parser.
//
// Three passes over one roxmltree document:
//   1. every <style> block (class rules, @font-face embedding),
//   2. every definition element (gradients, clip paths, masks, filters),
//   3. the depth-first scene walk that builds fully resolved nodes.
// Because 1 and 2 finish first, a url(#id) may point forward in document order.

use crate::cascade::{ClassTable, ResolvedAttributes, parse_length, parse_length_list, resolve_attributes};
use crate::defs::{
    ClipPath, Coord, Definition, Definitions, Filter, Gradient, GradientKind, Mask, Region,
    Spread, Stop, inherit_gradient_stops,
};
use crate::embed::{FontEmbedder, ImageEmbedder, parse_data_uri};
use crate::error::{GraphicError, Result};
use crate::fonts::{FontTable, TextAttributes};
use crate::geometry::{self, PathOp};
use crate::options::{ConvertOptions, parse_view_box};
use crate::paint::{parse_color, parse_opacity, parse_url_ref, resolve_opacity, resolve_paint};
use crate::scene::{Base, Clip, Group, Image, PaintStyle, SceneNode, Shape, Text, TextSegment};
use crate::stylesheet::apply_style_block;
use crate::transform::{Matrix, compose, parse_transform};
use crate::types::{BlendMode, Dash, FillRule, LineCap, LineJoin, Rect, Units};
use roxmltree::Node;
use std::collections::HashMap;
use std::sync::Arc;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Every element the parser recognizes. Tags outside this set fail the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    // drawing
    Circle,
    Ellipse,
    Rect,
    Line,
    Polygon,
    Polyline,
    Path,
    Image,
    Text,
    Tspan,
    TextPath,
    // containers
    Svg,
    G,
    // definitions
    Defs,
    ClipPath,
    LinearGradient,
    RadialGradient,
    Mask,
    Filter,
    Style,
    // recognized, unsupported
    A,
    Desc,
    Marker,
    Metadata,
    Pattern,
    Stop,
    Symbol,
    Title,
    Use,
    FilterPrimitive,
    Foreign,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "circle" => ElementKind::Circle,
            "ellipse" => ElementKind::Ellipse,
            "rect" => ElementKind::Rect,
            "line" => ElementKind::Line,
            "polygon" => ElementKind::Polygon,
            "polyline" => ElementKind::Polyline,
            "path" => ElementKind::Path,
            "image" => ElementKind::Image,
            "text" => ElementKind::Text,
            "tspan" => ElementKind::Tspan,
            "textPath" => ElementKind::TextPath,
            "svg" => ElementKind::Svg,
            "g" => ElementKind::G,
            "defs" => ElementKind::Defs,
            "clipPath" => ElementKind::ClipPath,
            "linearGradient" => ElementKind::LinearGradient,
            "radialGradient" => ElementKind::RadialGradient,
            "mask" => ElementKind::Mask,
            "filter" => ElementKind::Filter,
            "style" => ElementKind::Style,
            "a" => ElementKind::A,
            "desc" => ElementKind::Desc,
            "marker" => ElementKind::Marker,
            "metadata" => ElementKind::Metadata,
            "pattern" => ElementKind::Pattern,
            "stop" => ElementKind::Stop,
            "symbol" => ElementKind::Symbol,
            "title" => ElementKind::Title,
            "use" => ElementKind::Use,
            t if t.starts_with("fe") && t.len() > 2 => ElementKind::FilterPrimitive,
            _ => return None,
        };
        Some(kind)
    }

    /// Elements outside the SVG namespace (editor metadata) count as unsupported but
    /// harmless rather than unknown.
    fn of(node: Node<'_, '_>) -> Result<Self> {
        let tag = node.tag_name();
        if tag.namespace().is_some_and(|ns| ns != SVG_NS) {
            return Ok(ElementKind::Foreign);
        }
        Self::from_tag(tag.name()).ok_or_else(|| GraphicError::unsupported_element(tag.name(), None))
    }

    fn is_definition(self) -> bool {
        matches!(
            self,
            ElementKind::ClipPath
                | ElementKind::LinearGradient
                | ElementKind::RadialGradient
                | ElementKind::Mask
                | ElementKind::Filter
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
    Diagonal,
}

/// Registries for one conversion. Nothing outlives the call that created it.
pub struct ParseState<'e, F, I> {
    pub classes: ClassTable,
    pub defs: Definitions,
    pub fonts: FontTable,
    pub strict: bool,
    default_font_size: f64,
    viewport: Option<(f64, f64)>,
    font_embedder: &'e mut F,
    image_embedder: &'e mut I,
}

/// Output of a parse: the root group plus what the compiler needs for placement.
#[derive(Debug)]
pub struct ParsedDocument {
    pub root: SceneNode,
    pub view_box: Option<(f64, f64, f64, f64)>,
    pub size: Option<(f64, f64)>,
}

impl<'e, F: FontEmbedder, I: ImageEmbedder> ParseState<'e, F, I> {
    pub fn new(options: &ConvertOptions, font_embedder: &'e mut F, image_embedder: &'e mut I) -> Self {
        Self {
            classes: ClassTable::new(),
            defs: Definitions::new(),
            fonts: FontTable::new(),
            strict: options.strict,
            default_font_size: options.default_font_size,
            viewport: None,
            font_embedder,
            image_embedder,
        }
    }

    /// Seeds the font table, e.g. with fonts the caller embedded up front.
    pub fn with_fonts(mut self, fonts: FontTable) -> Self {
        self.fonts = fonts;
        self
    }

    pub async fn parse_document(&mut self, xml: &str) -> Result<ParsedDocument> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|err| GraphicError::MalformedDocument(err.to_string()))?;
        let root = doc.root_element();
        if ElementKind::of(root)? != ElementKind::Svg {
            return Err(GraphicError::unsupported_element(root.tag_name().name(), None));
        }

        let view_box = match root.attribute("viewBox") {
            Some(raw) => Some(
                parse_view_box(raw)
                    .ok_or_else(|| GraphicError::unsupported_attribute("svg", "viewBox", raw))?,
            ),
            None => None,
        };
        let size = match (root.attribute("width"), root.attribute("height")) {
            (Some(w), Some(h)) => parse_length(w).zip(parse_length(h)),
            _ => None,
        };
        self.viewport = view_box.map(|(_, _, w, h)| (w, h)).or(size);

        self.collect_styles(root).await?;
        self.collect_definitions(root)?;
        log::debug!(
            "parsed {} classes and {} definitions",
            self.classes.len(),
            self.defs.len()
        );

        let text = TextAttributes::new(self.default_font_size);
        let root_node = self
            .parse_container(root, ElementKind::Svg, &PaintStyle::root(), &text)
            .await?;
        Ok(ParsedDocument {
            root: root_node,
            view_box,
            size,
        })
    }

    async fn collect_styles(&mut self, root: Node<'_, '_>) -> Result<()> {
        for node in root.descendants().filter(|n| n.is_element()) {
            if ElementKind::of(node).ok() != Some(ElementKind::Style) {
                continue;
            }
            let css: String = node
                .children()
                .filter_map(|c| c.text())
                .collect::<Vec<_>>()
                .concat();
            apply_style_block(&css, &mut self.classes, &mut self.fonts, &mut *self.font_embedder)
                .await?;
        }
        Ok(())
    }

    fn collect_definitions(&mut self, root: Node<'_, '_>) -> Result<()> {
        let mut gradients: HashMap<String, Gradient> = HashMap::new();
        let mut gradient_order: Vec<(String, String)> = Vec::new();

        for node in root.descendants().filter(|n| n.is_element()) {
            let Ok(kind) = ElementKind::of(node) else {
                continue;
            };
            if !kind.is_definition() {
                continue;
            }
            let tag = node.tag_name().name();
            let Some(id) = node.attribute("id").map(str::trim).filter(|id| !id.is_empty()) else {
                log::warn!("<{tag}> without an id can never be referenced; skipped");
                continue;
            };

            match kind {
                ElementKind::LinearGradient | ElementKind::RadialGradient => {
                    if gradients.contains_key(id) || self.defs.get(id).is_some() {
                        return Err(GraphicError::DuplicateDefinition {
                            tag: tag.to_string(),
                            id: id.to_string(),
                        });
                    }
                    let gradient = self.parse_gradient(node, kind)?;
                    gradients.insert(id.to_string(), gradient);
                    gradient_order.push((tag.to_string(), id.to_string()));
                }
                ElementKind::ClipPath => {
                    let def = self.parse_clip_path(node)?;
                    self.insert_definition(tag, id, &gradients, Definition::ClipPath(Arc::new(def)))?;
                }
                ElementKind::Mask => {
                    let def = self.parse_mask(node)?;
                    self.insert_definition(tag, id, &gradients, Definition::Mask(Arc::new(def)))?;
                }
                ElementKind::Filter => {
                    let def = self.parse_filter(node)?;
                    self.insert_definition(tag, id, &gradients, Definition::Filter(Arc::new(def)))?;
                }
                _ => {}
            }
        }

        inherit_gradient_stops(&mut gradients);
        for (tag, id) in gradient_order {
            if let Some(g) = gradients.remove(&id) {
                self.defs.insert(&tag, &id, Definition::Gradient(Arc::new(g)))?;
            }
        }
        Ok(())
    }

    fn insert_definition(
        &mut self,
        tag: &str,
        id: &str,
        pending_gradients: &HashMap<String, Gradient>,
        def: Definition,
    ) -> Result<()> {
        if pending_gradients.contains_key(id) {
            return Err(GraphicError::DuplicateDefinition {
                tag: tag.to_string(),
                id: id.to_string(),
            });
        }
        self.defs.insert(tag, id, def)
    }

    fn attributes(&self, node: Node<'_, '_>) -> ResolvedAttributes {
        resolve_attributes(
            node.attributes()
                .filter(|a| a.namespace().is_none())
                .map(|a| (a.name(), a.value())),
            node.attribute("class"),
            &self.classes,
            node.attribute("style"),
        )
    }

    /// Policy for recognized-but-unsupported elements.
    fn unsupported(&self, node: Node<'_, '_>, context: Option<&str>) -> Result<()> {
        let tag = node.tag_name().name();
        if self.strict {
            return Err(GraphicError::unsupported_element(tag, context));
        }
        log::warn!("skipping unsupported <{tag}>");
        Ok(())
    }

    fn parse_gradient(&self, node: Node<'_, '_>, kind: ElementKind) -> Result<Gradient> {
        let tag = node.tag_name().name();
        let units = match node.attribute("gradientUnits") {
            Some(raw) => Units::parse(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute(tag, "gradientUnits", raw))?,
            None => Units::ObjectBoundingBox,
        };
        let transform = self.transform_attr(node, "gradientTransform")?;
        let spread = match node.attribute("spreadMethod") {
            Some(raw) => Spread::parse(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute(tag, "spreadMethod", raw))?,
            None => Spread::Pad,
        };
        let coord = |name: &str, default: Coord| -> Result<Coord> {
            let raw = node.attribute(name);
            Coord::parse(raw, default).ok_or_else(|| {
                GraphicError::unsupported_attribute(tag, name, raw.unwrap_or_default())
            })
        };

        let kind = if kind == ElementKind::LinearGradient {
            GradientKind::Linear {
                x1: coord("x1", Coord::fraction(0.0))?,
                y1: coord("y1", Coord::fraction(0.0))?,
                x2: coord("x2", Coord::fraction(1.0))?,
                y2: coord("y2", Coord::fraction(0.0))?,
            }
        } else {
            let cx = coord("cx", Coord::fraction(0.5))?;
            let cy = coord("cy", Coord::fraction(0.5))?;
            GradientKind::Radial {
                cx,
                cy,
                r: coord("r", Coord::fraction(0.5))?,
                fx: coord("fx", cx)?,
                fy: coord("fy", cy)?,
                fr: coord("fr", Coord::fraction(0.0))?,
            }
        };

        let mut stops = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            match ElementKind::of(child)? {
                ElementKind::Stop => {
                    let mut stop = self.parse_stop(child)?;
                    // Offsets never decrease.
                    if let Some(prev) = stops.last().map(|s: &Stop| s.offset) {
                        stop.offset = stop.offset.max(prev);
                    }
                    stops.push(stop);
                }
                ElementKind::Title | ElementKind::Desc | ElementKind::Metadata | ElementKind::Foreign => {
                    self.unsupported(child, Some(tag))?
                }
                _ => {
                    return Err(GraphicError::unsupported_element(
                        child.tag_name().name(),
                        Some(tag),
                    ));
                }
            }
        }

        Ok(Gradient {
            kind,
            units,
            transform,
            spread,
            stops,
            href: href(node).and_then(|h| h.strip_prefix('#').map(str::to_string)),
        })
    }

    fn parse_stop(&self, node: Node<'_, '_>) -> Result<Stop> {
        let attrs = self.attributes(node);
        let offset = match node.attribute("offset") {
            Some(raw) => parse_opacity(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute("stop", "offset", raw))?,
            None => 0.0,
        };
        let current = match attrs.get("color") {
            Some(raw) => parse_color(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute("stop", "color", raw))?,
            None => crate::types::Color::BLACK,
        };
        let color = match attrs.get("stop-color") {
            Some(raw) if raw.eq_ignore_ascii_case("currentcolor") => current,
            Some(raw) => parse_color(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute("stop", "stop-color", raw))?,
            None => crate::types::Color::BLACK,
        };
        let opacity = match attrs.get("stop-opacity") {
            Some(raw) => parse_opacity(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute("stop", "stop-opacity", raw))?,
            None => 1.0,
        };
        Ok(Stop {
            offset,
            color,
            opacity,
        })
    }

    fn parse_clip_path(&self, node: Node<'_, '_>) -> Result<ClipPath> {
        let units = match node.attribute("clipPathUnits") {
            Some(raw) => Units::parse(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute("clipPath", "clipPathUnits", raw))?,
            None => Units::UserSpaceOnUse,
        };
        let attrs = self.attributes(node);
        let clip_rule = match attrs.get("clip-rule") {
            Some(raw) => Some(
                FillRule::parse(raw)
                    .ok_or_else(|| GraphicError::unsupported_attribute("clipPath", "clip-rule", raw))?,
            ),
            None => None,
        };
        let own = compose(&self.transform_attr(node, "transform")?);
        let ops = self.geometry_children(node, own)?;
        Ok(ClipPath {
            ops,
            units,
            clip_rule,
        })
    }

    fn parse_mask(&self, node: Node<'_, '_>) -> Result<Mask> {
        let units = match node.attribute("maskUnits") {
            Some(raw) => Units::parse(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute("mask", "maskUnits", raw))?,
            None => Units::ObjectBoundingBox,
        };
        let content_units = match node.attribute("maskContentUnits") {
            Some(raw) => Units::parse(raw).ok_or_else(|| {
                GraphicError::unsupported_attribute("mask", "maskContentUnits", raw)
            })?,
            None => Units::UserSpaceOnUse,
        };
        Ok(Mask {
            region: region(node)?,
            units,
            content_units,
            ops: self.geometry_children(node, Matrix::IDENTITY)?,
        })
    }

    fn parse_filter(&self, node: Node<'_, '_>) -> Result<Filter> {
        // No primitive is supported, so any child element fails the filter.
        if let Some(child) = node.children().find(|n| n.is_element()) {
            return Err(GraphicError::unsupported_element(
                child.tag_name().name(),
                Some("filter"),
            ));
        }
        let units = match node.attribute("filterUnits") {
            Some(raw) => Units::parse(raw)
                .ok_or_else(|| GraphicError::unsupported_attribute("filter", "filterUnits", raw))?,
            None => Units::ObjectBoundingBox,
        };
        let primitive_units = match node.attribute("primitiveUnits") {
            Some(raw) => Units::parse(raw).ok_or_else(|| {
                GraphicError::unsupported_attribute("filter", "primitiveUnits", raw)
            })?,
            None => Units::UserSpaceOnUse,
        };
        Ok(Filter {
            region: region(node)?,
            units,
            primitive_units,
            effects: Vec::new(),
        })
    }

    /// Geometry-only children of a clipPath or mask, flattened into one path in the
    /// container's space.
    fn geometry_children(&self, node: Node<'_, '_>, ctm: Matrix) -> Result<Vec<PathOp>> {
        let container = node.tag_name().name();
        let mut out = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            let kind = ElementKind::of(child)?;
            match kind {
                ElementKind::Circle
                | ElementKind::Ellipse
                | ElementKind::Path
                | ElementKind::Polygon
                | ElementKind::Rect => {
                    let ops = self.shape_ops(child, kind)?;
                    let m = ctm.mul(compose(&self.transform_attr(child, "transform")?));
                    out.extend(geometry::transform_ops(&ops, m));
                }
                ElementKind::Title | ElementKind::Desc | ElementKind::Metadata | ElementKind::Foreign => {
                    self.unsupported(child, Some(container))?
                }
                _ => {
                    return Err(GraphicError::unsupported_element(
                        child.tag_name().name(),
                        Some(container),
                    ));
                }
            }
        }
        Ok(out)
    }

    fn transform_attr(&self, node: Node<'_, '_>, name: &str) -> Result<Vec<Matrix>> {
        match node.attribute(name) {
            Some(raw) => parse_transform(raw).ok_or_else(|| {
                GraphicError::unsupported_attribute(node.tag_name().name(), name, raw)
            }),
            None => Ok(Vec::new()),
        }
    }

    /// A geometry attribute in user units. Percentages resolve against the root
    /// viewport along `axis`.
    fn length_attr(&self, node: Node<'_, '_>, name: &str, axis: Axis) -> Result<Option<f64>> {
        let Some(raw) = node.attribute(name) else {
            return Ok(None);
        };
        let invalid = || GraphicError::unsupported_attribute(node.tag_name().name(), name, raw);
        if let Some(p) = raw.trim().strip_suffix('%') {
            let pct = p.trim().parse::<f64>().map_err(|_| invalid())? / 100.0;
            let (w, h) = self.viewport.ok_or_else(invalid)?;
            let extent = match axis {
                Axis::X => w,
                Axis::Y => h,
                Axis::Diagonal => (w * w + h * h).sqrt() / std::f64::consts::SQRT_2,
            };
            return Ok(Some(pct * extent));
        }
        parse_length(raw).map(Some).ok_or_else(invalid)
    }

    fn length_or(&self, node: Node<'_, '_>, name: &str, axis: Axis, default: f64) -> Result<f64> {
        Ok(self.length_attr(node, name, axis)?.unwrap_or(default))
    }

    fn non_negative(&self, node: Node<'_, '_>, name: &str, axis: Axis) -> Result<Option<f64>> {
        match self.length_attr(node, name, axis)? {
            Some(v) if v < 0.0 => Err(GraphicError::unsupported_attribute(
                node.tag_name().name(),
                name,
                node.attribute(name).unwrap_or_default(),
            )),
            other => Ok(other),
        }
    }

    /// Flattens the geometry of a basic shape or path element.
    fn shape_ops(&self, node: Node<'_, '_>, kind: ElementKind) -> Result<Vec<PathOp>> {
        let ops = match kind {
            ElementKind::Rect => {
                let x = self.length_or(node, "x", Axis::X, 0.0)?;
                let y = self.length_or(node, "y", Axis::Y, 0.0)?;
                let w = self.non_negative(node, "width", Axis::X)?.unwrap_or(0.0);
                let h = self.non_negative(node, "height", Axis::Y)?.unwrap_or(0.0);
                let rx = self.non_negative(node, "rx", Axis::X)?;
                let ry = self.non_negative(node, "ry", Axis::Y)?;
                geometry::rect(x, y, w, h, rx, ry)
            }
            ElementKind::Circle => {
                let cx = self.length_or(node, "cx", Axis::X, 0.0)?;
                let cy = self.length_or(node, "cy", Axis::Y, 0.0)?;
                let r = self.non_negative(node, "r", Axis::Diagonal)?.unwrap_or(0.0);
                geometry::circle(cx, cy, r)
            }
            ElementKind::Ellipse => {
                let cx = self.length_or(node, "cx", Axis::X, 0.0)?;
                let cy = self.length_or(node, "cy", Axis::Y, 0.0)?;
                let rx = self.non_negative(node, "rx", Axis::X)?;
                let ry = self.non_negative(node, "ry", Axis::Y)?;
                // A missing radius takes the other one.
                let (rx, ry) = match (rx, ry) {
                    (Some(rx), Some(ry)) => (rx, ry),
                    (Some(r), None) | (None, Some(r)) => (r, r),
                    (None, None) => (0.0, 0.0),
                };
                geometry::ellipse(cx, cy, rx, ry)
            }
            ElementKind::Line => {
                let x1 = self.length_or(node, "x1", Axis::X, 0.0)?;
                let y1 = self.length_or(node, "y1", Axis::Y, 0.0)?;
                let x2 = self.length_or(node, "x2", Axis::X, 0.0)?;
                let y2 = self.length_or(node, "y2", Axis::Y, 0.0)?;
                geometry::line(x1, y1, x2, y2)
            }
            ElementKind::Polygon | ElementKind::Polyline => {
                let tag = node.tag_name().name();
                let raw = node.attribute("points").unwrap_or_default();
                let points = geometry::parse_points(raw)
                    .ok_or_else(|| GraphicError::unsupported_attribute(tag, "points", raw))?;
                if kind == ElementKind::Polygon {
                    geometry::polygon(&points)
                } else {
                    geometry::polyline(&points)
                }
            }
            ElementKind::Path => geometry::parse_path_data(node.attribute("d").unwrap_or_default())?,
            _ => Vec::new(),
        };
        Ok(ops)
    }

    /// Resolves the paint properties of an element over the inherited ones.
    fn paint_style(
        &self,
        tag: &str,
        attrs: &ResolvedAttributes,
        inherited: &PaintStyle,
    ) -> Result<PaintStyle> {
        let invalid = |name: &str, raw: &str| GraphicError::unsupported_attribute(tag, name, raw);

        let color = match attrs.get("color") {
            Some(raw) if raw.eq_ignore_ascii_case("currentcolor") || raw == "inherit" => {
                inherited.color
            }
            Some(raw) => parse_color(raw).ok_or_else(|| invalid("color", raw))?,
            None => inherited.color,
        };
        let fill = resolve_paint(
            &self.defs,
            tag,
            "fill",
            attrs.get("fill"),
            inherited.fill.clone(),
            color,
        )?;
        let stroke = resolve_paint(
            &self.defs,
            tag,
            "stroke",
            attrs.get("stroke"),
            inherited.stroke.clone(),
            color,
        )?;

        let opacity = |name: &str| -> Result<Option<f64>> {
            match attrs.get(name) {
                Some(raw) => parse_opacity(raw).map(Some).ok_or_else(|| invalid(name, raw)),
                None => Ok(None),
            }
        };
        let general = opacity("opacity")?;
        let inherited_general = general.or(inherited.opacity);
        let fill_opacity =
            resolve_opacity(opacity("fill-opacity")?, general).or(inherited.fill_opacity);
        let stroke_opacity =
            resolve_opacity(opacity("stroke-opacity")?, general).or(inherited.stroke_opacity);

        let fill_rule = match attrs.get("fill-rule") {
            Some(raw) => FillRule::parse(raw).ok_or_else(|| invalid("fill-rule", raw))?,
            None => inherited.fill_rule,
        };
        let stroke_width = match attrs.get("stroke-width") {
            Some(raw) => Some(
                parse_length(raw)
                    .filter(|v| *v >= 0.0)
                    .ok_or_else(|| invalid("stroke-width", raw))?,
            ),
            None => inherited.stroke_width,
        };
        let stroke_join = match attrs.get("stroke-linejoin") {
            Some(raw) => Some(LineJoin::parse(raw).ok_or_else(|| invalid("stroke-linejoin", raw))?),
            None => inherited.stroke_join,
        };
        let stroke_cap = match attrs.get("stroke-linecap") {
            Some(raw) => Some(LineCap::parse(raw).ok_or_else(|| invalid("stroke-linecap", raw))?),
            None => inherited.stroke_cap,
        };
        let stroke_miter_limit = match attrs.get("stroke-miterlimit") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| *v >= 1.0)
                    .ok_or_else(|| invalid("stroke-miterlimit", raw))?,
            ),
            None => inherited.stroke_miter_limit,
        };

        let mut stroke_dash = match attrs.get("stroke-dasharray") {
            Some("none") => None,
            Some(raw) => {
                let mut pattern = parse_length_list(raw)
                    .filter(|p| p.iter().all(|v| *v >= 0.0))
                    .ok_or_else(|| invalid("stroke-dasharray", raw))?;
                if pattern.len() % 2 == 1 {
                    pattern.extend_from_within(..);
                }
                // An all-zero pattern draws a solid line.
                (!pattern.is_empty() && pattern.iter().any(|v| *v > 0.0)).then_some(Dash {
                    pattern,
                    phase: inherited.stroke_dash.as_ref().map_or(0.0, |d| d.phase),
                })
            }
            None => inherited.stroke_dash.clone(),
        };
        if let Some(raw) = attrs.get("stroke-dashoffset") {
            let phase = parse_length(raw).ok_or_else(|| invalid("stroke-dashoffset", raw))?;
            if let Some(dash) = stroke_dash.as_mut() {
                dash.phase = phase;
            }
        }

        Ok(PaintStyle {
            fill,
            fill_rule,
            fill_opacity,
            stroke,
            stroke_width,
            stroke_join,
            stroke_miter_limit,
            stroke_dash,
            stroke_cap,
            stroke_opacity,
            opacity: inherited_general,
            color,
        })
    }

    /// Transform, clip, mask, filter and blend mode shared by all node variants.
    fn base(
        &self,
        node: Node<'_, '_>,
        attrs: &ResolvedAttributes,
        bbox: Option<Rect>,
    ) -> Result<Base> {
        let tag = node.tag_name().name();
        let transform = self.transform_attr(node, "transform")?;

        let reference = |name: &str| -> Result<Option<String>> {
            match attrs.get(name) {
                None | Some("none") => Ok(None),
                Some(raw) => parse_url_ref(raw)
                    .map(Some)
                    .ok_or_else(|| GraphicError::unsupported_attribute(tag, name, raw)),
            }
        };

        let clip = match reference("clip-path")? {
            Some(id) => {
                let def = self.defs.clip_path(tag, &id)?;
                let rule = match attrs.get("clip-rule") {
                    Some(raw) => FillRule::parse(raw)
                        .ok_or_else(|| GraphicError::unsupported_attribute(tag, "clip-rule", raw))?,
                    None => def.clip_rule.unwrap_or_default(),
                };
                Some(Clip {
                    ops: def.ops_for(bbox),
                    rule,
                })
            }
            None => None,
        };
        let mask = match reference("mask")? {
            Some(id) => Some(self.defs.mask(tag, &id)?),
            None => None,
        };
        let filter = match reference("filter")? {
            Some(id) => Some(self.defs.filter(tag, &id)?),
            None => None,
        };
        let blend_mode = match attrs.get("mix-blend-mode") {
            Some(raw) => match BlendMode::parse(raw) {
                Some(BlendMode::Normal) => None,
                Some(mode) => Some(mode),
                None => {
                    return Err(GraphicError::unsupported_attribute(tag, "mix-blend-mode", raw));
                }
            },
            None => None,
        };

        Ok(Base {
            transform,
            clip,
            mask,
            filter,
            blend_mode,
        })
    }

    /// Parses one element of the visible tree. `None` for elements that produce no
    /// node (definitions, skipped metadata).
    async fn parse_node(
        &mut self,
        node: Node<'_, '_>,
        paint: &PaintStyle,
        text: &TextAttributes,
        parent: Option<&str>,
    ) -> Result<Option<SceneNode>> {
        let kind = ElementKind::of(node)?;
        match kind {
            ElementKind::Circle
            | ElementKind::Ellipse
            | ElementKind::Rect
            | ElementKind::Line
            | ElementKind::Polygon
            | ElementKind::Polyline
            | ElementKind::Path => self.parse_shape(node, kind, paint).map(Some),
            ElementKind::Image => self.parse_image(node, paint).await.map(Some),
            ElementKind::Text => {
                let mut t = Box::pin(self.parse_text(node, paint, text)).await?;
                normalize_text_spaces(&mut t);
                Ok(Some(SceneNode::Text(t)))
            }
            ElementKind::G | ElementKind::Svg => {
                Box::pin(self.parse_container(node, kind, paint, text)).await.map(Some)
            }
            ElementKind::Defs => {
                self.check_defs_children(node)?;
                Ok(None)
            }
            // Registered by the earlier passes.
            ElementKind::ClipPath
            | ElementKind::LinearGradient
            | ElementKind::RadialGradient
            | ElementKind::Mask
            | ElementKind::Filter
            | ElementKind::Style => Ok(None),
            // Text content elements are only meaningful inside text.
            ElementKind::Tspan | ElementKind::TextPath => Err(GraphicError::unsupported_element(
                node.tag_name().name(),
                parent,
            )),
            ElementKind::A
            | ElementKind::Desc
            | ElementKind::Marker
            | ElementKind::Metadata
            | ElementKind::Pattern
            | ElementKind::Stop
            | ElementKind::Symbol
            | ElementKind::Title
            | ElementKind::Use
            | ElementKind::FilterPrimitive
            | ElementKind::Foreign => {
                self.unsupported(node, parent)?;
                Ok(None)
            }
        }
    }

    /// `<defs>` content is never painted directly; it is only checked for tags that
    /// would be rejected anywhere else.
    fn check_defs_children(&self, node: Node<'_, '_>) -> Result<()> {
        for child in node.children().filter(|n| n.is_element()) {
            match ElementKind::of(child)? {
                ElementKind::A
                | ElementKind::Desc
                | ElementKind::Marker
                | ElementKind::Metadata
                | ElementKind::Pattern
                | ElementKind::Stop
                | ElementKind::Symbol
                | ElementKind::Title
                | ElementKind::Use
                | ElementKind::FilterPrimitive
                | ElementKind::Foreign => self.unsupported(child, Some("defs"))?,
                ElementKind::Defs | ElementKind::G => self.check_defs_children(child)?,
                _ => {}
            }
        }
        Ok(())
    }

    async fn parse_container(
        &mut self,
        node: Node<'_, '_>,
        kind: ElementKind,
        inherited: &PaintStyle,
        text: &TextAttributes,
    ) -> Result<SceneNode> {
        let tag = node.tag_name().name();
        let attrs = self.attributes(node);
        let paint = self.paint_style(tag, &attrs, inherited)?;
        let text = self.text_attributes(node, &attrs, text)?;

        let mut children = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if let Some(scene) = self.parse_node(child, &paint, &text, Some(tag)).await? {
                children.push(scene);
            }
        }

        let mut group = SceneNode::Group(Group {
            children,
            paint,
            base: Base::default(),
        });
        let mut base = self.base(node, &attrs, group.bbox())?;
        // A nested viewport is positioned by its x/y.
        if kind == ElementKind::Svg && node.parent_element().is_some() {
            let x = self.length_or(node, "x", Axis::X, 0.0)?;
            let y = self.length_or(node, "y", Axis::Y, 0.0)?;
            if x != 0.0 || y != 0.0 {
                base.transform.insert(0, Matrix::translate(x, y));
            }
        }
        *group.base_mut() = base;
        Ok(group)
    }

    fn parse_shape(
        &self,
        node: Node<'_, '_>,
        kind: ElementKind,
        inherited: &PaintStyle,
    ) -> Result<SceneNode> {
        let tag = node.tag_name().name();
        let attrs = self.attributes(node);
        let ops = self.shape_ops(node, kind)?;
        let paint = self.paint_style(tag, &attrs, inherited)?;
        let base = self.base(node, &attrs, geometry::bbox(&ops))?;
        Ok(SceneNode::Shape(Shape { ops, paint, base }))
    }

    async fn parse_image(&mut self, node: Node<'_, '_>, inherited: &PaintStyle) -> Result<SceneNode> {
        let attrs = self.attributes(node);
        let raw = href(node).unwrap_or_default();
        let mime = data_uri_mime(raw)
            .ok_or_else(|| GraphicError::unsupported_attribute("image", "href", truncate(raw)))?;
        let supported = matches!(mime.as_str(), "image/png" | "image/jpeg" | "image/jpg");
        if !supported {
            return Err(GraphicError::UnsupportedImageType { mime });
        }
        let data = parse_data_uri(raw)
            .ok_or_else(|| GraphicError::unsupported_attribute("image", "href", truncate(raw)))?;
        let image = if mime == "image/png" {
            self.image_embedder.embed_png(data.bytes).await?
        } else {
            self.image_embedder.embed_jpeg(data.bytes).await?
        };

        let x = self.length_or(node, "x", Axis::X, 0.0)?;
        let y = self.length_or(node, "y", Axis::Y, 0.0)?;
        let width = self
            .non_negative(node, "width", Axis::X)?
            .unwrap_or(image.width() as f64);
        let height = self
            .non_negative(node, "height", Axis::Y)?
            .unwrap_or(image.height() as f64);
        let opacity = match attrs.get("opacity") {
            Some(raw) => Some(
                parse_opacity(raw)
                    .ok_or_else(|| GraphicError::unsupported_attribute("image", "opacity", raw))?,
            ),
            None => inherited.opacity,
        };
        let base = self.base(node, &attrs, Some(Rect::new(x, y, width, height)))?;
        Ok(SceneNode::Image(Image {
            image,
            x,
            y,
            width,
            height,
            opacity,
            base,
        }))
    }

    /// Font attributes set on this element, applied over the inherited ones.
    fn text_attributes(
        &self,
        node: Node<'_, '_>,
        attrs: &ResolvedAttributes,
        inherited: &TextAttributes,
    ) -> Result<TextAttributes> {
        let tag = node.tag_name().name();
        let size = match attrs.get("font-size") {
            Some(raw) => Some(font_size(raw, inherited.size).ok_or_else(|| {
                GraphicError::unsupported_attribute(tag, "font-size", raw)
            })?),
            None => None,
        };
        Ok(inherited.descend(
            attrs.get("font-family"),
            attrs.get("font-weight"),
            attrs.get("font-style"),
            size,
        ))
    }

    async fn parse_text(
        &mut self,
        node: Node<'_, '_>,
        inherited: &PaintStyle,
        inherited_text: &TextAttributes,
    ) -> Result<Text> {
        let tag = node.tag_name().name();
        let attrs = self.attributes(node);
        let paint = self.paint_style(tag, &attrs, inherited)?;
        let text_attrs = self.text_attributes(node, &attrs, inherited_text)?;
        let font = self.fonts.resolve(tag, &text_attrs, self.strict)?;

        let mut segments = Vec::new();
        for child in node.children() {
            if child.is_text() {
                if let Some(s) = child.text() {
                    segments.push(TextSegment::Literal(collapse_whitespace(s)));
                }
                continue;
            }
            if !child.is_element() {
                continue;
            }
            match ElementKind::of(child)? {
                ElementKind::Tspan => {
                    let nested = Box::pin(self.parse_text(child, &paint, &text_attrs)).await?;
                    segments.push(TextSegment::Nested(nested));
                }
                ElementKind::TextPath => {
                    // Laid out as a plain run when the policy allows it.
                    self.unsupported(child, Some(tag))?;
                    let nested = Box::pin(self.parse_text(child, &paint, &text_attrs)).await?;
                    segments.push(TextSegment::Nested(nested));
                }
                ElementKind::A | ElementKind::Title | ElementKind::Desc | ElementKind::Metadata => {
                    self.unsupported(child, Some(tag))?
                }
                _ => {
                    return Err(GraphicError::unsupported_element(
                        child.tag_name().name(),
                        Some(tag),
                    ));
                }
            }
        }

        let x = self.first_coordinate(node, "x", Axis::X)?;
        let y = self.first_coordinate(node, "y", Axis::Y)?;
        let base = self.base(node, &attrs, None)?;
        Ok(Text {
            font,
            font_size: text_attrs.size,
            fill: paint.fill,
            stroke: paint.stroke,
            fill_opacity: paint.fill_opacity,
            stroke_opacity: paint.stroke_opacity,
            x,
            y,
            segments,
            base,
        })
    }

    /// Text `x`/`y` may be lists; only the first entry positions the run.
    fn first_coordinate(&self, node: Node<'_, '_>, name: &str, axis: Axis) -> Result<Option<f64>> {
        let Some(raw) = node.attribute(name) else {
            return Ok(None);
        };
        let first = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .find(|s| !s.is_empty());
        match first {
            Some(first) if first.ends_with('%') => {
                let invalid = || GraphicError::unsupported_attribute(node.tag_name().name(), name, raw);
                let pct = first.trim_end_matches('%').parse::<f64>().map_err(|_| invalid())?;
                let (w, h) = self.viewport.ok_or_else(invalid)?;
                let extent = match axis {
                    Axis::Y => h,
                    _ => w,
                };
                Ok(Some(pct / 100.0 * extent))
            }
            Some(first) => parse_length(first)
                .map(Some)
                .ok_or_else(|| GraphicError::unsupported_attribute(node.tag_name().name(), name, raw)),
            None => Ok(None),
        }
    }
}

fn href<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute("href")
        .or_else(|| node.attribute((XLINK_NS, "href")))
        .map(str::trim)
}

fn region(node: Node<'_, '_>) -> Result<Region> {
    let coord = |name: &str| -> Result<Option<Coord>> {
        match node.attribute(name) {
            Some(raw) => Coord::parse(Some(raw), Coord::fraction(0.0))
                .map(Some)
                .ok_or_else(|| GraphicError::unsupported_attribute(node.tag_name().name(), name, raw)),
            None => Ok(None),
        }
    };
    Ok(Region {
        x: coord("x")?,
        y: coord("y")?,
        width: coord("width")?,
        height: coord("height")?,
    })
}

/// Media type of a `data:` URI: the text between `:` and the first `;` or `,`.
fn data_uri_mime(uri: &str) -> Option<String> {
    let rest = uri.trim().strip_prefix("data:")?;
    let end = rest.find([';', ','])?;
    Some(rest[..end].trim().to_ascii_lowercase())
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(64) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn font_size(raw: &str, inherited: f64) -> Option<f64> {
    let s = raw.trim();
    let size = if let Some(em) = s.strip_suffix("em") {
        em.trim().parse::<f64>().ok()? * inherited
    } else if let Some(pct) = s.strip_suffix('%') {
        pct.trim().parse::<f64>().ok()? / 100.0 * inherited
    } else {
        parse_length(s)?
    };
    (size >= 0.0).then_some(size)
}

/// Default `xml:space` handling: newlines and tabs become spaces and runs of spaces
/// collapse to one.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}

/// Whitespace across a whole `<text>` element, tspans included: a space that
/// follows another space is dropped, as are the leading and trailing spaces of the
/// element. Literals left empty are removed.
fn normalize_text_spaces(text: &mut Text) {
    let mut after_space = true;
    drop_repeated_spaces(&mut text.segments, &mut after_space);
    trim_trailing_space(&mut text.segments);
    drop_empty_literals(&mut text.segments);
}

fn drop_repeated_spaces(segments: &mut [TextSegment], after_space: &mut bool) {
    for segment in segments {
        match segment {
            TextSegment::Literal(run) => {
                if *after_space && run.starts_with(' ') {
                    run.remove(0);
                }
                if !run.is_empty() {
                    *after_space = run.ends_with(' ');
                }
            }
            TextSegment::Nested(nested) => drop_repeated_spaces(&mut nested.segments, after_space),
        }
    }
}

/// Trims the last non-blank literal in document order. Returns true once found.
fn trim_trailing_space(segments: &mut [TextSegment]) -> bool {
    for segment in segments.iter_mut().rev() {
        match segment {
            TextSegment::Literal(run) => {
                let len = run.trim_end_matches(' ').len();
                run.truncate(len);
                if !run.is_empty() {
                    return true;
                }
            }
            TextSegment::Nested(nested) => {
                if trim_trailing_space(&mut nested.segments) {
                    return true;
                }
            }
        }
    }
    false
}

fn drop_empty_literals(segments: &mut Vec<TextSegment>) {
    segments.retain(|s| !matches!(s, TextSegment::Literal(l) if l.is_empty()));
    for segment in segments {
        if let TextSegment::Nested(nested) = segment {
            drop_empty_literals(&mut nested.segments);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{FontHandle, ImageHandle, ImageKind, ResourceKey, StandardFont};
    use crate::paint::Paint;
    use crate::types::Color;

    #[derive(Default)]
    struct Fonts {
        embedded: Vec<String>,
    }

    impl FontEmbedder for Fonts {
        async fn embed_font(&mut self, _bytes: Vec<u8>, name_hint: &str) -> Result<FontHandle> {
            self.embedded.push(name_hint.to_string());
            Ok(FontHandle::new(StandardFont::helvetica()))
        }
    }

    #[derive(Default)]
    struct Images;

    impl ImageEmbedder for Images {
        async fn embed_png(&mut self, bytes: Vec<u8>) -> Result<ImageHandle> {
            Ok(ImageHandle::new(ResourceKey::digest(&bytes), ImageKind::Png, 4, 2))
        }
        async fn embed_jpeg(&mut self, bytes: Vec<u8>) -> Result<ImageHandle> {
            Ok(ImageHandle::new(ResourceKey::digest(&bytes), ImageKind::Jpeg, 8, 8))
        }
    }

    fn parse_with(xml: &str, options: ConvertOptions) -> Result<ParsedDocument> {
        let mut fonts = Fonts::default();
        let mut images = Images;
        let mut state = ParseState::new(&options, &mut fonts, &mut images);
        pollster::block_on(state.parse_document(xml))
    }

    fn parse(xml: &str) -> Result<ParsedDocument> {
        parse_with(xml, ConvertOptions::default())
    }

    fn children(doc: &ParsedDocument) -> &[SceneNode] {
        match &doc.root {
            SceneNode::Group(g) => &g.children,
            other => panic!("root should be a group, got {other:?}"),
        }
    }

    fn shape(node: &SceneNode) -> &Shape {
        match node {
            SceneNode::Shape(s) => s,
            other => panic!("expected shape, got {other:?}"),
        }
    }

    const SVG: &str = r#"xmlns="http://www.w3.org/2000/svg""#;

    #[test]
    fn unspecified_fill_is_black_and_none_is_absent() {
        let doc = parse(&format!(
            r#"<svg {SVG}><rect width="1" height="1"/><rect width="1" height="1" fill="none"/></svg>"#
        ))
        .expect("valid svg");
        let kids = children(&doc);
        assert_eq!(shape(&kids[0]).paint.fill, Some(Paint::Color(Color::BLACK)));
        assert_eq!(shape(&kids[1]).paint.fill, None);
    }

    #[test]
    fn group_paint_is_inherited_copy_on_descend() {
        let doc = parse(&format!(
            r#"<svg {SVG}>
                 <g fill="red" stroke="blue" stroke-width="2">
                   <circle r="1"/>
                   <circle r="1" fill="green"/>
                 </g>
                 <circle r="1"/>
               </svg>"#
        ))
        .expect("valid svg");
        let kids = children(&doc);
        let SceneNode::Group(g) = &kids[0] else {
            panic!("expected group");
        };
        let first = shape(&g.children[0]);
        assert_eq!(first.paint.fill, Some(Paint::Color(Color::rgb(1.0, 0.0, 0.0))));
        assert_eq!(first.paint.stroke, Some(Paint::Color(Color::rgb(0.0, 0.0, 1.0))));
        assert_eq!(first.paint.stroke_width, Some(2.0));
        assert_eq!(
            shape(&g.children[1]).paint.fill,
            Some(Paint::Color(Color::from_rgb8(0, 128, 0)))
        );
        let sibling = shape(&kids[1]);
        assert_eq!(sibling.paint.fill, Some(Paint::Color(Color::BLACK)));
        assert_eq!(sibling.paint.stroke, None);
    }

    #[test]
    fn class_rules_and_inline_style_cascade() {
        let doc = parse(&format!(
            r#"<svg {SVG}>
                 <style>.a {{ fill: blue; stroke: red }}</style>
                 <rect class="a" fill="green" style="stroke: lime" width="1" height="1"/>
               </svg>"#
        ))
        .expect("valid svg");
        let rect = shape(&children(&doc)[0]);
        assert_eq!(rect.paint.fill, Some(Paint::Color(Color::rgb(0.0, 0.0, 1.0))));
        assert_eq!(rect.paint.stroke, Some(Paint::Color(Color::rgb(0.0, 1.0, 0.0))));
    }

    #[test]
    fn forward_gradient_reference_resolves() {
        let doc = parse(&format!(
            r##"<svg {SVG}>
                 <rect width="10" height="10" fill="url(#g)"/>
                 <defs>
                   <linearGradient id="base"><stop offset="0" stop-color="red"/><stop offset="1" stop-color="blue"/></linearGradient>
                   <linearGradient id="g" href="#base" x2="0" y2="1"/>
                 </defs>
               </svg>"##
        ))
        .expect("valid svg");
        let rect = shape(&children(&doc)[0]);
        let Some(Paint::Gradient(g)) = &rect.paint.fill else {
            panic!("expected gradient fill");
        };
        assert_eq!(g.stops.len(), 2);
    }

    #[test]
    fn undefined_gradient_is_an_error() {
        let err = parse(&format!(
            r##"<svg {SVG}><rect width="1" height="1" fill="url(#missing)"/></svg>"##
        ))
        .expect_err("missing gradient");
        assert!(matches!(
            err,
            GraphicError::UnresolvedReference { ref tag, ref id, .. } if tag == "rect" && id == "missing"
        ));
    }

    #[test]
    fn clip_path_geometry_is_whitelisted() {
        let doc = parse(&format!(
            r##"<svg {SVG}>
                 <clipPath id="c" clip-rule="evenodd"><rect width="5" height="5" transform="translate(1 1)"/></clipPath>
                 <circle r="3" clip-path="url(#c)"/>
               </svg>"##
        ))
        .expect("valid svg");
        let circle = shape(&children(&doc)[0]);
        let clip = circle.base.clip.as_ref().expect("clip resolved");
        assert_eq!(clip.rule, FillRule::EvenOdd);
        assert_eq!(clip.ops[0], PathOp::MoveTo(1.0, 1.0));

        let err = parse(&format!(
            r##"<svg {SVG}><clipPath id="c"><text>x</text></clipPath></svg>"##
        ))
        .expect_err("text in clip");
        assert!(matches!(
            err,
            GraphicError::UnsupportedElement { ref tag, ref context } if tag == "text" && context.as_deref() == Some("clipPath")
        ));
    }

    #[test]
    fn non_empty_filter_fails() {
        let err = parse(&format!(
            r##"<svg {SVG}><filter id="f"><feGaussianBlur stdDeviation="2"/></filter></svg>"##
        ))
        .expect_err("unsupported primitive");
        assert!(matches!(err, GraphicError::UnsupportedElement { ref tag, .. } if tag == "feGaussianBlur"));

        let doc = parse(&format!(
            r##"<svg {SVG}><filter id="f"/><rect width="1" height="1" filter="url(#f)"/></svg>"##
        ))
        .expect("empty filter");
        assert!(shape(&children(&doc)[0]).base.filter.is_some());
    }

    #[test]
    fn strict_policy_rejects_harmless_tags_lenient_skips() {
        let xml = format!(r#"<svg {SVG}><title>t</title><rect width="1" height="1"/></svg>"#);
        let err = parse(&xml).expect_err("strict");
        assert!(matches!(err, GraphicError::UnsupportedElement { ref tag, .. } if tag == "title"));

        let doc = parse_with(&xml, ConvertOptions::lenient()).expect("lenient");
        assert_eq!(children(&doc).len(), 1);

        let unknown = format!(r#"<svg {SVG}><blink/></svg>"#);
        assert!(parse_with(&unknown, ConvertOptions::lenient()).is_err());
    }

    #[test]
    fn duplicate_definition_ids_fail() {
        let err = parse(&format!(
            r#"<svg {SVG}><clipPath id="x"/><linearGradient id="x"/></svg>"#
        ))
        .expect_err("duplicate");
        assert!(matches!(err, GraphicError::DuplicateDefinition { ref id, .. } if id == "x"));
    }

    #[test]
    fn tspan_inherits_resolved_text_attributes() {
        let doc = parse(&format!(
            r#"<svg {SVG}><text font-size="20" fill="red">Hello <tspan>World</tspan></text></svg>"#
        ))
        .expect("valid svg");
        let SceneNode::Text(text) = &children(&doc)[0] else {
            panic!("expected text");
        };
        assert_eq!(text.segments.len(), 2);
        assert_eq!(text.segments[0], TextSegment::Literal("Hello ".into()));
        let TextSegment::Nested(span) = &text.segments[1] else {
            panic!("expected nested span");
        };
        assert_eq!(span.font_size, 20.0);
        assert_eq!(span.font, text.font);
        assert_eq!(span.fill, text.fill);
    }

    #[test]
    fn images_require_png_or_jpeg() {
        let err = parse(&format!(
            r#"<svg {SVG}><image href="data:image/gif;base64,R0lGOD=="/></svg>"#
        ))
        .expect_err("gif");
        assert!(matches!(err, GraphicError::UnsupportedImageType { ref mime } if mime == "image/gif"));

        let doc = parse(&format!(
            r#"<svg {SVG} xmlns:xlink="http://www.w3.org/1999/xlink"><image x="1" xlink:href="data:image/png;base64,AAAA"/></svg>"#
        ))
        .expect("png");
        let SceneNode::Image(img) = &children(&doc)[0] else {
            panic!("expected image");
        };
        assert_eq!((img.x, img.width, img.height), (1.0, 4.0, 2.0));
    }

    #[test]
    fn group_opacity_reaches_images() {
        let doc = parse(&format!(
            r#"<svg {SVG}><g opacity="0.5">
                 <image href="data:image/png;base64,AAAA"/>
                 <image href="data:image/png;base64,AAAA" opacity="0.8"/>
               </g><image href="data:image/png;base64,AAAA"/></svg>"#
        ))
        .expect("valid svg");
        let opacity = |node: &SceneNode| match node {
            SceneNode::Image(img) => img.opacity,
            other => panic!("expected image, got {other:?}"),
        };
        let SceneNode::Group(g) = &children(&doc)[0] else {
            panic!("expected group");
        };
        assert_eq!(opacity(&g.children[0]), Some(0.5));
        assert_eq!(opacity(&g.children[1]), Some(0.8));
        assert_eq!(opacity(&children(&doc)[1]), None);
    }

    #[test]
    fn percent_text_position_needs_a_viewport() {
        let err = parse(&format!(r#"<svg {SVG}><text x="10%">a</text></svg>"#))
            .expect_err("no viewport to resolve against");
        assert!(matches!(
            err,
            GraphicError::UnsupportedAttribute { ref attribute, .. } if attribute == "x"
        ));

        let doc = parse(&format!(
            r#"<svg {SVG} viewBox="0 0 200 100"><text x="10%" y="50%">a</text></svg>"#
        ))
        .expect("viewport set");
        let text = first_text(&doc);
        assert_eq!((text.x, text.y), (Some(20.0), Some(50.0)));
    }

    #[test]
    fn malformed_path_fails_whole_conversion() {
        let err = parse(&format!(r#"<svg {SVG}><path d="M0 0 L"/></svg>"#)).expect_err("bad path");
        assert!(matches!(err, GraphicError::MalformedPath { .. }));
    }

    #[test]
    fn font_face_rules_populate_font_table() {
        let mut fonts = Fonts::default();
        let mut images = Images;
        let options = ConvertOptions::default();
        let mut state = ParseState::new(&options, &mut fonts, &mut images);
        let doc = pollster::block_on(state.parse_document(&format!(
            r#"<svg {SVG}><style>@font-face {{ font-family: Inter; font-weight: 700; src: url(data:font/ttf;base64,AAEAAA==) }}</style>
               <text font-family="Inter">x</text></svg>"#
        )))
        .expect("font resolves");
        drop(state);
        assert_eq!(fonts.embedded, vec!["Inter 700 normal".to_string()]);
        assert_eq!(children(&doc).len(), 1);
    }

    #[test]
    fn unknown_font_family_is_strict_error() {
        let err = parse(&format!(
            r#"<svg {SVG}><text font-family="Nope">x</text></svg>"#
        ))
        .expect_err("missing font");
        assert!(matches!(err, GraphicError::UnresolvedFont { .. }));
    }

    #[test]
    fn element_kinds_cover_filter_primitives() {
        assert_eq!(ElementKind::from_tag("feFlood"), Some(ElementKind::FilterPrimitive));
        assert_eq!(ElementKind::from_tag("fe"), None);
        assert_eq!(ElementKind::from_tag("blink"), None);
    }

    fn flatten(text: &Text) -> String {
        text.segments
            .iter()
            .map(|segment| match segment {
                TextSegment::Literal(run) => run.clone(),
                TextSegment::Nested(nested) => flatten(nested),
            })
            .collect()
    }

    fn first_text(doc: &ParsedDocument) -> &Text {
        match &children(doc)[0] {
            SceneNode::Text(text) => text,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(collapse_whitespace("a \n\t b"), "a b");
    }

    #[test]
    fn spaces_survive_tspan_boundaries() {
        let cases = [
            ("Hello<tspan> World</tspan>", "Hello World"),
            ("Hello <tspan>World</tspan>", "Hello World"),
            ("  a <tspan> b </tspan> c  ", "a b c"),
            ("<tspan> lead</tspan> tail <tspan>  </tspan>", "lead tail"),
        ];
        for (body, expected) in cases {
            let doc = parse(&format!(r#"<svg {SVG}><text>{body}</text></svg>"#)).expect(body);
            assert_eq!(flatten(first_text(&doc)), expected, "{body}");
        }
    }
}
