// `<style>` blocks: flat class rules into the class table, `@font-face` rules into
// the font table through the font collaborator.

use crate::cascade::{ClassTable, PropertyBag, split_declarations};
use crate::embed::{FontEmbedder, parse_data_uri};
use crate::error::{GraphicError, Result};
use crate::fonts::FontTable;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::traits::ToCss;

/// A validated `@font-face` rule waiting to be embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFace {
    pub family: String,
    pub weight: String,
    pub style: String,
    pub bytes: Vec<u8>,
}

/// Everything one style block contributes.
#[derive(Debug, Default)]
pub struct StyleBlock {
    pub classes: Vec<(String, PropertyBag)>,
    pub font_faces: Vec<FontFace>,
}

pub fn parse_style_block(css: &str) -> Result<StyleBlock> {
    let mut out = StyleBlock::default();
    let css = css.trim();
    if css.is_empty() {
        return Ok(out);
    }
    let options = ParserOptions {
        error_recovery: true,
        ..ParserOptions::default()
    };
    let sheet = StyleSheet::parse(css, options).map_err(|err| GraphicError::MalformedStyleBlock {
        reason: err.to_string(),
    })?;
    collect_rules(&sheet.rules, &mut out)?;
    Ok(out)
}

fn collect_rules(rules: &CssRuleList<'_>, out: &mut StyleBlock) -> Result<()> {
    for rule in &rules.0 {
        match rule {
            CssRule::Style(style_rule) => {
                let selectors = print(&style_rule.selectors)?;
                let declarations = print(&style_rule.declarations)?;
                let props: PropertyBag = split_declarations(&declarations).into_iter().collect();
                if props.is_empty() {
                    continue;
                }
                for selector in selectors.split(',').map(str::trim) {
                    match class_selector(selector) {
                        Some(name) => out.classes.push((name.to_string(), props.clone())),
                        None => log::debug!("ignoring non-class selector {selector:?}"),
                    }
                }
            }
            CssRule::Media(media) => collect_rules(&media.rules, out)?,
            CssRule::FontFace(_) => {
                let printed = print(rule)?;
                out.font_faces.push(font_face(&printed)?);
            }
            _ => {}
        }
    }
    Ok(())
}

fn print<T: ToCss>(value: &T) -> Result<String> {
    value
        .to_css_string(PrinterOptions::default())
        .map_err(|err| GraphicError::MalformedStyleBlock {
            reason: err.to_string(),
        })
}

/// `.name` with nothing else; compound and descendant selectors are not matched.
fn class_selector(selector: &str) -> Option<&str> {
    let name = selector.strip_prefix('.')?;
    let simple = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    simple.then_some(name)
}

/// Reads a printed `@font-face { ... }` block. family, weight and src are required;
/// style defaults to `normal`.
fn font_face(printed: &str) -> Result<FontFace> {
    let body = printed
        .find('{')
        .zip(printed.rfind('}'))
        .map(|(open, close)| &printed[open + 1..close])
        .unwrap_or_default();

    let mut family = None;
    let mut weight = None;
    let mut style = None;
    let mut src = None;
    for (key, value) in split_declarations(body) {
        match key.as_str() {
            "font-family" => family = Some(value.trim_matches('"').trim_matches('\'').to_string()),
            "font-weight" => weight = Some(value),
            "font-style" => style = Some(value),
            "src" => src = Some(value),
            _ => {}
        }
    }

    let missing = |what: &str| GraphicError::MalformedStyleBlock {
        reason: format!("@font-face without {what}"),
    };
    let family = family.ok_or_else(|| missing("font-family"))?;
    let weight = weight.ok_or_else(|| missing("font-weight"))?;
    let src = src.ok_or_else(|| missing("src"))?;

    let bytes = first_data_source(&src).ok_or_else(|| GraphicError::MalformedStyleBlock {
        reason: format!("@font-face for {family:?} has no data: source"),
    })?;

    Ok(FontFace {
        family,
        // A weight range keeps its lower bound.
        weight: weight.split_whitespace().next().unwrap_or("400").to_string(),
        style: style.unwrap_or_else(|| "normal".to_string()),
        bytes,
    })
}

fn first_data_source(src: &str) -> Option<Vec<u8>> {
    let mut rest = src;
    while let Some(start) = rest.find("url(") {
        let after = &rest[start + 4..];
        let close = after.find(')')?;
        let inner = after[..close].trim().trim_matches('"').trim_matches('\'');
        if let Some(uri) = parse_data_uri(inner) {
            return Some(uri.bytes);
        }
        rest = &after[close + 1..];
    }
    None
}

/// Parses one style block and applies it: classes merge into `classes`, each
/// `@font-face` is embedded (awaited) and registered in `fonts`.
pub async fn apply_style_block<F: FontEmbedder>(
    css: &str,
    classes: &mut ClassTable,
    fonts: &mut FontTable,
    embedder: &mut F,
) -> Result<()> {
    let block = parse_style_block(css)?;
    for (name, props) in block.classes {
        classes.merge(&name, props);
    }
    for face in block.font_faces {
        let hint = format!("{} {} {}", face.family, face.weight, face.style);
        let handle = embedder.embed_font(face.bytes, &hint).await?;
        fonts.insert(&face.family, &face.weight, &face.style, handle);
    }
    Ok(())
}
