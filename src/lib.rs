//! Compiles SVG documents into stack-balanced PDF content-stream operators.
//!
//! The pipeline is parse (cascade, definitions, fonts, geometry) into a resolved
//! [`SceneNode`] tree, then compile that tree into [`Operator`]s while allocating
//! named resources through a [`ResourceRegistry`]. Fonts and images are embedded
//! through the async [`FontEmbedder`] and [`ImageEmbedder`] collaborators.

mod cascade;
mod compiler;
mod content;
mod defs;
mod embed;
mod error;
mod fonts;
mod geometry;
mod options;
mod paint;
mod parser;
mod scene;
mod stylesheet;
mod transform;
mod types;

pub use cascade::{ClassTable, PropertyBag, ResolvedAttributes, resolve_attributes};
pub use compiler::{
    Compiler, ExtGState, Operator, PageResources, ResourceRegistry, Shading, ShadingStop,
};
pub use content::{encode_operators, ext_gstate_dictionary, shading_dictionary};
pub use defs::{
    ClipPath, Coord, Definition, Definitions, Effect, Filter, Gradient, GradientKind, Mask, Region,
    ResolvedGradient, Spread, Stop,
};
pub use embed::{
    DataUri, EmbeddedFont, EmbeddedImage, FontEmbedder, FontHandle, ImageEmbedder, ImageHandle,
    ImageKind, RasterEmbedder, ResourceKey, StandardFont, TrueTypeEmbedder, TrueTypeFont,
    parse_data_uri,
};
pub use error::{GraphicError, Result};
pub use fonts::{FontTable, TextAttributes};
pub use geometry::{PathOp, arc_to_cubics, parse_path_data};
pub use options::ConvertOptions;
pub use paint::{Paint, parse_color, resolve_opacity, resolve_paint};
pub use parser::{ElementKind, ParseState, ParsedDocument};
pub use scene::{Base, Clip, Group, Image, PaintStyle, SceneNode, Shape, Text, TextSegment};
pub use stylesheet::{StyleBlock, parse_style_block};
pub use transform::{Matrix, compose, parse_transform};
pub use types::{BlendMode, Color, Dash, FillRule, LineCap, LineJoin, Rect, Units};

/// Parses `svg` into a resolved scene tree. Registries live only for this call.
pub async fn parse_svg<F: FontEmbedder, I: ImageEmbedder>(
    svg: &str,
    options: &ConvertOptions,
    fonts: &mut F,
    images: &mut I,
) -> Result<ParsedDocument> {
    let mut state = ParseState::new(options, fonts, images);
    state.parse_document(svg).await
}

/// Parses and compiles `svg`. With a viewport configured the stream is wrapped in
/// one more push/pop pair carrying the viewBox placement.
pub async fn convert_svg<F, I, R>(
    svg: &str,
    options: &ConvertOptions,
    fonts: &mut F,
    images: &mut I,
    resources: &mut R,
) -> Result<Vec<Operator>>
where
    F: FontEmbedder,
    I: ImageEmbedder,
    R: ResourceRegistry,
{
    let doc = parse_svg(svg, options, fonts, images).await?;
    log::debug!("scene parsed; compiling");
    let body = Compiler::new(resources).compile(&doc.root);

    let ops = match options.placement(doc.view_box, doc.size) {
        Some(placement) => {
            let mut ops = Vec::with_capacity(body.len() + 3);
            ops.push(Operator::PushState);
            ops.push(Operator::ConcatMatrix(placement));
            ops.extend(body);
            ops.push(Operator::PopState);
            ops
        }
        None => body,
    };
    log::debug!("compiled {} operators", ops.len());
    Ok(ops)
}

/// [`convert_svg`] driven to completion on the current thread.
pub fn convert_svg_blocking<F, I, R>(
    svg: &str,
    options: &ConvertOptions,
    fonts: &mut F,
    images: &mut I,
    resources: &mut R,
) -> Result<Vec<Operator>>
where
    F: FontEmbedder,
    I: ImageEmbedder,
    R: ResourceRegistry,
{
    pollster::block_on(convert_svg(svg, options, fonts, images, resources))
}
