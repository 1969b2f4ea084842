// Graphics compiler: scene tree to a stack-balanced operator list.
//
// Every node is wrapped as
//   push, transform, clip, graphics state, body, pop
// so nothing a node sets leaks into its siblings.

use crate::defs::{Gradient, Stop};
use crate::embed::{FontHandle, ImageHandle, ResourceKey};
use crate::geometry::{self, PathOp};
use crate::paint::Paint;
use crate::scene::{Base, Group, Image, SceneNode, Shape, Text, TextSegment};
use crate::transform::Matrix;
use crate::types::{BlendMode, Color, Dash, FillRule, LineCap, LineJoin, milli_key};
use std::collections::HashMap;

/// One content-stream instruction. The document writer serializes these; see
/// [`crate::content::encode_operators`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    PushState,
    PopState,
    ConcatMatrix(Matrix),
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CurveTo(f64, f64, f64, f64, f64, f64),
    ClosePath,
    Clip(FillRule),
    EndPath,
    SetGraphicsState(String),
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(f64),
    SetLineJoin(LineJoin),
    SetMiterLimit(f64),
    SetLineCap(LineCap),
    SetDash(Dash),
    Fill(FillRule),
    Stroke,
    FillStroke(FillRule),
    BeginText,
    EndText,
    SetFont(String, f64),
    SetTextMatrix(Matrix),
    SetTextRenderMode(i64),
    ShowText(Vec<u8>),
    DrawXObject(String),
    PaintShading(String),
}

/// Parameters of an extended graphics state. `None` leaves the parameter unset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExtGState {
    pub fill_opacity: Option<f64>,
    pub stroke_opacity: Option<f64>,
    pub blend_mode: Option<BlendMode>,
}

impl ExtGState {
    pub fn is_empty(&self) -> bool {
        self.fill_opacity.is_none() && self.stroke_opacity.is_none() && self.blend_mode.is_none()
    }

    fn key(&self) -> (Option<i64>, Option<i64>, Option<BlendMode>) {
        (
            self.fill_opacity.map(milli_key),
            self.stroke_opacity.map(milli_key),
            self.blend_mode,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingStop {
    pub offset: f64,
    pub color: Color,
}

/// Axial or radial shading in gradient space, extended at both ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Shading {
    Axial {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        stops: Vec<ShadingStop>,
    },
    Radial {
        x0: f64,
        y0: f64,
        r0: f64,
        x1: f64,
        y1: f64,
        r1: f64,
        stops: Vec<ShadingStop>,
    },
}

impl Shading {
    /// Builds a shading from resolved gradient coordinates (see
    /// [`crate::defs::ResolvedGradient`]). Stop opacity is not carried.
    fn from_coords(coords: &[f64], radial: bool, stops: &[Stop]) -> Option<Self> {
        let stops: Vec<ShadingStop> = stops
            .iter()
            .map(|s| ShadingStop {
                offset: s.offset,
                color: s.color,
            })
            .collect();
        match (radial, coords) {
            (false, &[x0, y0, x1, y1]) => Some(Shading::Axial {
                x0,
                y0,
                x1,
                y1,
                stops,
            }),
            (true, &[x0, y0, r0, x1, y1, r1]) => Some(Shading::Radial {
                x0,
                y0,
                r0,
                x1,
                y1,
                r1,
                stops,
            }),
            _ => None,
        }
    }

    pub fn stops(&self) -> &[ShadingStop] {
        match self {
            Shading::Axial { stops, .. } | Shading::Radial { stops, .. } => stops,
        }
    }

    fn key(&self) -> Vec<i64> {
        let (tag, coords) = match self {
            Shading::Axial { x0, y0, x1, y1, .. } => (1, vec![*x0, *y0, *x1, *y1]),
            Shading::Radial {
                x0,
                y0,
                r0,
                x1,
                y1,
                r1,
                ..
            } => (2, vec![*x0, *y0, *r0, *x1, *y1, *r1]),
        };
        let mut key = vec![tag];
        key.extend(coords.into_iter().map(milli_key));
        for stop in self.stops() {
            key.extend(
                [stop.offset, stop.color.r, stop.color.g, stop.color.b]
                    .into_iter()
                    .map(milli_key),
            );
        }
        key
    }
}

/// Page-level allocator of named resources. Implementations memoize by value so
/// equal requests return the same name.
pub trait ResourceRegistry {
    fn alloc_ext_graphics_state(&mut self, state: &ExtGState) -> String;
    fn alloc_xobject(&mut self, image: &ImageHandle) -> String;
    fn alloc_font_dict_entry(&mut self, font: &FontHandle) -> String;
    fn alloc_shading(&mut self, shading: &Shading) -> String;
}

/// In-memory resource dictionary for one page: `GS<n>`, `Im<n>`, `F<n>`, `Sh<n>`.
#[derive(Debug, Default)]
pub struct PageResources {
    gs_names: HashMap<(Option<i64>, Option<i64>, Option<BlendMode>), String>,
    ext_graphics_states: Vec<(String, ExtGState)>,
    xobject_names: HashMap<ResourceKey, String>,
    xobjects: Vec<(String, ImageHandle)>,
    font_names: HashMap<ResourceKey, String>,
    fonts: Vec<(String, FontHandle)>,
    shading_names: HashMap<Vec<i64>, String>,
    shadings: Vec<(String, Shading)>,
}

impl PageResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ext_graphics_states(&self) -> &[(String, ExtGState)] {
        &self.ext_graphics_states
    }

    pub fn xobjects(&self) -> &[(String, ImageHandle)] {
        &self.xobjects
    }

    pub fn fonts(&self) -> &[(String, FontHandle)] {
        &self.fonts
    }

    pub fn shadings(&self) -> &[(String, Shading)] {
        &self.shadings
    }
}

impl ResourceRegistry for PageResources {
    fn alloc_ext_graphics_state(&mut self, state: &ExtGState) -> String {
        let key = state.key();
        if let Some(name) = self.gs_names.get(&key) {
            return name.clone();
        }
        let name = format!("GS{}", self.ext_graphics_states.len());
        log::debug!("allocated {name} for {state:?}");
        self.ext_graphics_states.push((name.clone(), *state));
        self.gs_names.insert(key, name.clone());
        name
    }

    fn alloc_xobject(&mut self, image: &ImageHandle) -> String {
        let key = image.identity();
        if let Some(name) = self.xobject_names.get(&key) {
            return name.clone();
        }
        let name = format!("Im{}", self.xobjects.len());
        self.xobjects.push((name.clone(), image.clone()));
        self.xobject_names.insert(key, name.clone());
        name
    }

    fn alloc_font_dict_entry(&mut self, font: &FontHandle) -> String {
        let key = font.identity();
        if let Some(name) = self.font_names.get(&key) {
            return name.clone();
        }
        let name = format!("F{}", self.fonts.len());
        self.fonts.push((name.clone(), font.clone()));
        self.font_names.insert(key, name.clone());
        name
    }

    fn alloc_shading(&mut self, shading: &Shading) -> String {
        let key = shading.key();
        if let Some(name) = self.shading_names.get(&key) {
            return name.clone();
        }
        let name = format!("Sh{}", self.shadings.len());
        self.shadings.push((name.clone(), shading.clone()));
        self.shading_names.insert(key, name.clone());
        name
    }
}

pub struct Compiler<'r, R> {
    resources: &'r mut R,
}

impl<'r, R: ResourceRegistry> Compiler<'r, R> {
    pub fn new(resources: &'r mut R) -> Self {
        Self { resources }
    }

    pub fn compile(&mut self, node: &SceneNode) -> Vec<Operator> {
        let mut out = Vec::new();
        self.emit_node(node, &mut out);
        out
    }

    fn emit_node(&mut self, node: &SceneNode, out: &mut Vec<Operator>) {
        match node {
            SceneNode::Shape(shape) => self.emit_shape(shape, out),
            SceneNode::Image(image) => self.emit_image(image, out),
            SceneNode::Group(group) => self.emit_group(group, out),
            SceneNode::Text(text) => {
                let mut pen = (text.x.unwrap_or(0.0), text.y.unwrap_or(0.0));
                self.emit_text(text, &mut pen, out);
            }
        }
    }

    /// Steps shared by every node: push, transform, clip, graphics state. The caller
    /// emits the body and then [`Self::close`].
    fn open(&mut self, base: &Base, state: ExtGState, out: &mut Vec<Operator>) {
        out.push(Operator::PushState);
        // Written order: the last listed transform is the one closest to the geometry.
        out.extend(base.transform.iter().map(|m| Operator::ConcatMatrix(*m)));
        if let Some(clip) = &base.clip {
            emit_path(&clip.ops, out);
            out.push(Operator::Clip(clip.rule));
            out.push(Operator::EndPath);
        }
        if base.mask.is_some() {
            log::warn!("mask is not painted; content drawn unmasked");
        }
        if !state.is_empty() {
            let name = self.resources.alloc_ext_graphics_state(&state);
            out.push(Operator::SetGraphicsState(name));
        }
    }

    fn close(out: &mut Vec<Operator>) {
        out.push(Operator::PopState);
    }

    fn emit_group(&mut self, group: &Group, out: &mut Vec<Operator>) {
        // Group opacities already live on the children; only blending is group-level.
        let state = ExtGState {
            blend_mode: group.base.blend_mode,
            ..ExtGState::default()
        };
        self.open(&group.base, state, out);
        for child in &group.children {
            self.emit_node(child, out);
        }
        Self::close(out);
    }

    fn emit_shape(&mut self, shape: &Shape, out: &mut Vec<Operator>) {
        let paint = &shape.paint;
        let state = ExtGState {
            fill_opacity: paint.fill.as_ref().and(paint.fill_opacity),
            stroke_opacity: paint.stroke.as_ref().and(paint.stroke_opacity),
            blend_mode: shape.base.blend_mode,
        };
        self.open(&shape.base, state, out);

        let stroke = paint.stroke.as_ref().and_then(|p| solid_color(p, "stroke"));
        let fill = match &paint.fill {
            Some(Paint::Color(c)) => Some(*c),
            Some(Paint::Gradient(gradient)) => {
                self.emit_gradient_fill(shape, gradient, out);
                None
            }
            None => None,
        };

        if let Some(color) = fill {
            out.push(Operator::SetFillColor(color));
        }
        if let Some(color) = stroke {
            out.push(Operator::SetStrokeColor(color));
            if let Some(width) = paint.stroke_width {
                out.push(Operator::SetLineWidth(width));
            }
            if let Some(join) = paint.stroke_join {
                out.push(Operator::SetLineJoin(join));
            }
            if let Some(limit) = paint.stroke_miter_limit {
                out.push(Operator::SetMiterLimit(limit));
            }
            if let Some(cap) = paint.stroke_cap {
                out.push(Operator::SetLineCap(cap));
            }
            if let Some(dash) = &paint.stroke_dash {
                out.push(Operator::SetDash(dash.clone()));
            }
        }

        emit_path(&shape.ops, out);
        match (fill, stroke) {
            (Some(_), Some(_)) => out.push(Operator::FillStroke(paint.fill_rule)),
            (Some(_), None) => out.push(Operator::Fill(paint.fill_rule)),
            (None, Some(_)) => out.push(Operator::Stroke),
            // Traced but unpainted; the path must still be ended.
            (None, None) => out.push(Operator::EndPath),
        }
        Self::close(out);
    }

    /// Paints a gradient inside the shape outline in its own push/pop so the
    /// gradient matrix and clip do not affect the stroke that follows.
    fn emit_gradient_fill(
        &mut self,
        shape: &Shape,
        gradient: &Gradient,
        out: &mut Vec<Operator>,
    ) {
        let Some(bbox) = geometry::bbox(&shape.ops) else {
            return;
        };
        let Some(resolved) = gradient.resolve(bbox) else {
            return;
        };
        let Some(shading) = Shading::from_coords(&resolved.coords, resolved.radial, &gradient.stops)
        else {
            return;
        };
        let name = self.resources.alloc_shading(&shading);
        out.push(Operator::PushState);
        emit_path(&shape.ops, out);
        out.push(Operator::Clip(shape.paint.fill_rule));
        out.push(Operator::EndPath);
        out.push(Operator::ConcatMatrix(resolved.matrix));
        out.push(Operator::PaintShading(name));
        out.push(Operator::PopState);
    }

    fn emit_image(&mut self, image: &Image, out: &mut Vec<Operator>) {
        let state = ExtGState {
            fill_opacity: image.opacity,
            blend_mode: image.base.blend_mode,
            ..ExtGState::default()
        };
        self.open(&image.base, state, out);
        let name = self.resources.alloc_xobject(&image.image);
        // Unit square to the placement box, rows flipped so the first image row is
        // at the top (smallest y).
        out.push(Operator::ConcatMatrix(Matrix::translate(
            image.x,
            image.y + image.height,
        )));
        out.push(Operator::ConcatMatrix(Matrix::scale(image.width, -image.height)));
        out.push(Operator::DrawXObject(name));
        Self::close(out);
    }

    /// Emits a text node. `pen` is where the next run starts and is advanced past
    /// every literal so sibling runs follow each other.
    fn emit_text(&mut self, text: &Text, pen: &mut (f64, f64), out: &mut Vec<Operator>) {
        let state = ExtGState {
            fill_opacity: text.fill.as_ref().and(text.fill_opacity),
            stroke_opacity: text.stroke.as_ref().and(text.stroke_opacity),
            blend_mode: text.base.blend_mode,
        };
        self.open(&text.base, state, out);

        let fill = text.fill.as_ref().and_then(|p| solid_color(p, "text fill"));
        let stroke = text.stroke.as_ref().and_then(|p| solid_color(p, "text stroke"));
        let mode = match (fill.is_some(), stroke.is_some()) {
            (true, false) => 0,
            (false, true) => 1,
            (true, true) => 2,
            (false, false) => 3,
        };
        // Allocated on the first literal so empty text leaves no font behind.
        let mut font: Option<String> = None;

        for segment in &text.segments {
            match segment {
                TextSegment::Literal(run) => {
                    let font = font
                        .get_or_insert_with(|| self.resources.alloc_font_dict_entry(&text.font))
                        .clone();
                    if let Some(color) = fill {
                        out.push(Operator::SetFillColor(color));
                    }
                    if let Some(color) = stroke {
                        out.push(Operator::SetStrokeColor(color));
                    }
                    out.push(Operator::BeginText);
                    out.push(Operator::SetFont(font, text.font_size));
                    if mode != 0 {
                        out.push(Operator::SetTextRenderMode(mode));
                    }
                    // Glyphs are drawn upright in a y-down user space.
                    out.push(Operator::SetTextMatrix(Matrix::new(
                        1.0, 0.0, 0.0, -1.0, pen.0, pen.1,
                    )));
                    out.push(Operator::ShowText(text.font.encode_text(run)));
                    out.push(Operator::EndText);
                    pen.0 += text.font.advance_width(run) * text.font_size;
                }
                TextSegment::Nested(nested) => {
                    if let Some(x) = nested.x {
                        pen.0 = x;
                    }
                    if let Some(y) = nested.y {
                        pen.1 = y;
                    }
                    self.emit_text(nested, pen, out);
                }
            }
        }
        Self::close(out);
    }
}

fn emit_path(ops: &[PathOp], out: &mut Vec<Operator>) {
    out.extend(ops.iter().map(|op| match *op {
        PathOp::MoveTo(x, y) => Operator::MoveTo(x, y),
        PathOp::LineTo(x, y) => Operator::LineTo(x, y),
        PathOp::CurveTo(x1, y1, x2, y2, x, y) => Operator::CurveTo(x1, y1, x2, y2, x, y),
        PathOp::ClosePath => Operator::ClosePath,
    }));
}

/// Solid colour for a paint that cannot take a shading (strokes, glyph runs).
/// Gradients are approximated by their first stop.
fn solid_color(paint: &Paint, usage: &str) -> Option<Color> {
    match paint {
        Paint::Color(c) => Some(*c),
        Paint::Gradient(g) => {
            log::warn!("gradient {usage} painted with its first stop colour");
            g.stops.first().map(|s| s.color)
        }
    }
}
