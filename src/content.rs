// Serialization of operators and page resources through lopdf.

use crate::compiler::{ExtGState, Operator, Shading, ShadingStop};
use crate::error::Result;
use crate::transform::Matrix;
use crate::types::{Color, FillRule};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, StringFormat};

/// Encodes operators as PDF content-stream bytes.
pub fn encode_operators(ops: &[Operator]) -> Result<Vec<u8>> {
    let operations: Vec<Operation> = ops.iter().map(to_operation).collect();
    Ok(Content { operations }.encode()?)
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn name(s: &str) -> Object {
    Object::Name(s.as_bytes().to_vec())
}

fn matrix(m: &Matrix) -> Vec<Object> {
    [m.a, m.b, m.c, m.d, m.e, m.f].into_iter().map(real).collect()
}

fn rgb(c: &Color) -> Vec<Object> {
    vec![real(c.r), real(c.g), real(c.b)]
}

fn to_operation(op: &Operator) -> Operation {
    match op {
        Operator::PushState => Operation::new("q", vec![]),
        Operator::PopState => Operation::new("Q", vec![]),
        Operator::ConcatMatrix(m) => Operation::new("cm", matrix(m)),
        Operator::MoveTo(x, y) => Operation::new("m", vec![real(*x), real(*y)]),
        Operator::LineTo(x, y) => Operation::new("l", vec![real(*x), real(*y)]),
        Operator::CurveTo(x1, y1, x2, y2, x, y) => Operation::new(
            "c",
            [*x1, *y1, *x2, *y2, *x, *y].into_iter().map(real).collect(),
        ),
        Operator::ClosePath => Operation::new("h", vec![]),
        Operator::Clip(FillRule::NonZero) => Operation::new("W", vec![]),
        Operator::Clip(FillRule::EvenOdd) => Operation::new("W*", vec![]),
        Operator::EndPath => Operation::new("n", vec![]),
        Operator::SetGraphicsState(gs) => Operation::new("gs", vec![name(gs)]),
        Operator::SetFillColor(c) => Operation::new("rg", rgb(c)),
        Operator::SetStrokeColor(c) => Operation::new("RG", rgb(c)),
        Operator::SetLineWidth(w) => Operation::new("w", vec![real(*w)]),
        Operator::SetLineJoin(join) => Operation::new("j", vec![Object::Integer(join.pdf_value())]),
        Operator::SetMiterLimit(limit) => Operation::new("M", vec![real(*limit)]),
        Operator::SetLineCap(cap) => Operation::new("J", vec![Object::Integer(cap.pdf_value())]),
        Operator::SetDash(dash) => Operation::new(
            "d",
            vec![
                Object::Array(dash.pattern.iter().copied().map(real).collect()),
                real(dash.phase),
            ],
        ),
        Operator::Fill(FillRule::NonZero) => Operation::new("f", vec![]),
        Operator::Fill(FillRule::EvenOdd) => Operation::new("f*", vec![]),
        Operator::Stroke => Operation::new("S", vec![]),
        Operator::FillStroke(FillRule::NonZero) => Operation::new("B", vec![]),
        Operator::FillStroke(FillRule::EvenOdd) => Operation::new("B*", vec![]),
        Operator::BeginText => Operation::new("BT", vec![]),
        Operator::EndText => Operation::new("ET", vec![]),
        Operator::SetFont(font, size) => Operation::new("Tf", vec![name(font), real(*size)]),
        Operator::SetTextMatrix(m) => Operation::new("Tm", matrix(m)),
        Operator::SetTextRenderMode(mode) => Operation::new("Tr", vec![Object::Integer(*mode)]),
        Operator::ShowText(bytes) => Operation::new(
            "Tj",
            vec![Object::String(bytes.clone(), StringFormat::Hexadecimal)],
        ),
        Operator::DrawXObject(xobject) => Operation::new("Do", vec![name(xobject)]),
        Operator::PaintShading(shading) => Operation::new("sh", vec![name(shading)]),
    }
}

/// `/ExtGState` dictionary for an allocated graphics state.
pub fn ext_gstate_dictionary(state: &ExtGState) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", name("ExtGState"));
    if let Some(ca) = state.fill_opacity {
        dict.set("ca", real(ca.clamp(0.0, 1.0)));
    }
    if let Some(ca) = state.stroke_opacity {
        dict.set("CA", real(ca.clamp(0.0, 1.0)));
    }
    if let Some(mode) = state.blend_mode {
        dict.set("BM", name(mode.pdf_name()));
    }
    dict
}

/// Shading dictionary (type 2 axial or type 3 radial, DeviceRGB) with its colour
/// function inlined.
pub fn shading_dictionary(shading: &Shading) -> Dictionary {
    let (kind, coords) = match shading {
        Shading::Axial { x0, y0, x1, y1, .. } => (2, vec![*x0, *y0, *x1, *y1]),
        Shading::Radial {
            x0,
            y0,
            r0,
            x1,
            y1,
            r1,
            ..
        } => (3, vec![*x0, *y0, *r0, *x1, *y1, *r1]),
    };
    let mut dict = Dictionary::new();
    dict.set("ShadingType", Object::Integer(kind));
    dict.set("ColorSpace", name("DeviceRGB"));
    dict.set(
        "Coords",
        Object::Array(coords.into_iter().map(real).collect()),
    );
    dict.set("Function", Object::Dictionary(color_function(shading.stops())));
    dict.set(
        "Extend",
        Object::Array(vec![Object::Boolean(true), Object::Boolean(true)]),
    );
    dict
}

/// Maps t in [0, 1] onto the stop colours: one exponential (type 2) function per
/// stop interval, stitched with a type 3 function when there is more than one.
fn color_function(stops: &[ShadingStop]) -> Dictionary {
    let mut stops = stops.to_vec();
    match stops.len() {
        0 => {
            stops.push(ShadingStop {
                offset: 0.0,
                color: Color::BLACK,
            });
            stops.push(ShadingStop {
                offset: 1.0,
                color: Color::BLACK,
            });
        }
        1 => stops.push(ShadingStop {
            offset: 1.0,
            color: stops[0].color,
        }),
        _ => {}
    }

    let interval = |a: &ShadingStop, b: &ShadingStop| {
        let mut f = Dictionary::new();
        f.set("FunctionType", Object::Integer(2));
        f.set("Domain", Object::Array(vec![real(0.0), real(1.0)]));
        f.set("C0", Object::Array(rgb(&a.color)));
        f.set("C1", Object::Array(rgb(&b.color)));
        f.set("N", real(1.0));
        f
    };

    if stops.len() == 2 {
        return interval(&stops[0], &stops[1]);
    }

    let functions: Vec<Object> = stops
        .windows(2)
        .map(|pair| Object::Dictionary(interval(&pair[0], &pair[1])))
        .collect();
    let bounds: Vec<Object> = stops[1..stops.len() - 1]
        .iter()
        .map(|s| real(s.offset.clamp(0.0, 1.0)))
        .collect();
    let encode: Vec<Object> = (0..functions.len())
        .flat_map(|_| [real(0.0), real(1.0)])
        .collect();

    let mut f = Dictionary::new();
    f.set("FunctionType", Object::Integer(3));
    f.set("Domain", Object::Array(vec![real(0.0), real(1.0)]));
    f.set("Functions", Object::Array(functions));
    f.set("Bounds", Object::Array(bounds));
    f.set("Encode", Object::Array(encode));
    f
}
