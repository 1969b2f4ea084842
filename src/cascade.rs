// Attribute cascade: presentation attributes < class rules < inline style.

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{ParserOptions, StyleAttribute};
use lightningcss::traits::ToCss;
use std::collections::HashMap;

/// A flat property bag keyed by kebab-case property name.
pub type PropertyBag = HashMap<String, String>;

/// Attributes that take part in the cascade. Geometry attributes are read from the
/// element directly.
pub const PRESENTATION_ATTRIBUTES: &[&str] = &[
    "clip-path",
    "clip-rule",
    "color",
    "fill",
    "fill-opacity",
    "fill-rule",
    "filter",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "mask",
    "mix-blend-mode",
    "opacity",
    "stop-color",
    "stop-opacity",
    "stroke",
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-opacity",
    "stroke-width",
];

/// Class name to property bag, filled from `<style>` blocks.
#[derive(Debug, Default, Clone)]
pub struct ClassTable {
    classes: HashMap<String, PropertyBag>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `props` into the class; on key collision the later value wins.
    pub fn merge(&mut self, name: &str, props: PropertyBag) {
        self.classes.entry(name.to_string()).or_default().extend(props);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyBag> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// The effective property set of one element.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResolvedAttributes {
    props: PropertyBag,
}

impl ResolvedAttributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.props.insert(name.to_string(), value.to_string());
    }
}

/// Merges presentation attributes, then each listed class in order, then the inline
/// style. Unknown classes are ignored.
pub fn resolve_attributes<'a>(
    presentation: impl IntoIterator<Item = (&'a str, &'a str)>,
    class_attr: Option<&str>,
    classes: &ClassTable,
    inline_style: Option<&str>,
) -> ResolvedAttributes {
    let mut props = PropertyBag::new();
    for (name, value) in presentation {
        if PRESENTATION_ATTRIBUTES.contains(&name) {
            props.insert(name.to_string(), value.trim().to_string());
        }
    }
    for name in class_attr.unwrap_or_default().split_whitespace() {
        if let Some(bag) = classes.get(name) {
            props.extend(bag.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    if let Some(style) = inline_style {
        props.extend(parse_inline_style(style));
    }
    ResolvedAttributes { props }
}

/// Parses a `style` attribute into a property bag. lightningcss normalizes the block
/// first; input it rejects goes through a tolerant `;`/`:` splitter instead.
pub fn parse_inline_style(input: &str) -> PropertyBag {
    if let Ok(attr) = StyleAttribute::parse(input, ParserOptions::default()) {
        if let Ok(css) = attr.declarations.to_css_string(PrinterOptions::default()) {
            return split_declarations(&css).into_iter().collect();
        }
    }
    split_declarations(input).into_iter().collect()
}

/// Splits `a: b; c: d` into pairs, keeping `;` inside quotes or parentheses and
/// dropping `!important`. Keys are lowercased.
pub fn split_declarations(input: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;

    let mut push = |decl: &str| {
        let Some((k, v)) = decl.split_once(':') else {
            return;
        };
        let key = k.trim().to_ascii_lowercase();
        let mut value = v.trim();
        if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
            value = value[..idx].trim_end();
        }
        if !key.is_empty() && !value.is_empty() {
            out.push((key, value.to_string()));
        }
    };

    for (i, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push(&input[start..]);
    out
}

/// Parses a length in user units. Absolute units convert at 96 per inch; percentages
/// are not lengths here.
pub fn parse_length(input: &str) -> Option<f64> {
    let s = input.trim();
    let (num, scale) = [
        ("px", 1.0),
        ("pt", 96.0 / 72.0),
        ("pc", 16.0),
        ("mm", 96.0 / 25.4),
        ("cm", 96.0 / 2.54),
        ("in", 96.0),
    ]
    .iter()
    .find_map(|(unit, scale)| s.strip_suffix(unit).map(|n| (n, *scale)))
    .unwrap_or((s, 1.0));
    let v = num.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v * scale)
}

/// Whitespace/comma separated lengths, as in `stroke-dasharray`.
pub fn parse_length_list(input: &str) -> Option<Vec<f64>> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(parse_length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(pairs: &[(&str, &str)]) -> PropertyBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn inline_beats_class_beats_presentation() {
        let mut classes = ClassTable::new();
        classes.merge("a", bag(&[("fill", "green"), ("stroke", "blue")]));
        classes.merge("b", bag(&[("stroke", "purple")]));

        let attrs = resolve_attributes(
            [("fill", "red"), ("stroke-width", "3"), ("x", "10")],
            Some("a  b missing"),
            &classes,
            Some("stroke-width: 5"),
        );
        assert_eq!(attrs.get("fill"), Some("green"));
        assert_eq!(attrs.get("stroke"), Some("purple"));
        assert_eq!(attrs.get("stroke-width").and_then(parse_length), Some(5.0));
        // Geometry is not part of the cascade.
        assert_eq!(attrs.get("x"), None);
    }

    #[test]
    fn later_class_entries_merge_over_earlier() {
        let mut classes = ClassTable::new();
        classes.merge("a", bag(&[("fill", "red"), ("stroke", "blue")]));
        classes.merge("a", bag(&[("fill", "green")]));
        let a = classes.get("a").expect("class a");
        assert_eq!(a.get("fill").map(String::as_str), Some("green"));
        assert_eq!(a.get("stroke").map(String::as_str), Some("blue"));
    }

    #[test]
    fn splitter_respects_quotes_and_parens() {
        let decls = split_declarations(
            "fill: url('#a;b'); font-family: \"x;y\", serif ; stroke:red !important;bad",
        );
        assert_eq!(
            decls,
            vec![
                ("fill".to_string(), "url('#a;b')".to_string()),
                ("font-family".to_string(), "\"x;y\", serif".to_string()),
                ("stroke".to_string(), "red".to_string()),
            ]
        );
    }

    #[test]
    fn inline_style_yields_bag() {
        let props = parse_inline_style("fill:#ff0000; stroke-width: 2px");
        assert!(props.contains_key("fill"));
        assert_eq!(props.get("stroke-width").and_then(|v| parse_length(v)), Some(2.0));
    }

    #[test]
    fn lengths_convert_absolute_units() {
        assert_eq!(parse_length("12"), Some(12.0));
        assert_eq!(parse_length("12px"), Some(12.0));
        assert_eq!(parse_length("1in"), Some(96.0));
        assert!((parse_length("72pt").unwrap_or_default() - 96.0).abs() < 1e-9);
        assert_eq!(parse_length("50%"), None);
        assert_eq!(parse_length_list("4, 2 1"), Some(vec![4.0, 2.0, 1.0]));
        assert_eq!(parse_length_list("4 x"), None);
    }
}
