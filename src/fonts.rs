use crate::embed::{FontHandle, StandardFont};
use crate::error::{GraphicError, Result};

const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
];

type StyleMap = Vec<(String, FontHandle)>;
type WeightMap = Vec<(String, StyleMap)>;

/// `family -> weight -> style -> font`, in registration order so "first available"
/// is deterministic.
#[derive(Debug, Default, Clone)]
pub struct FontTable {
    families: Vec<(String, WeightMap)>,
}

impl FontTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Registers a face. Re-registering the same triple replaces the earlier font.
    pub fn insert(&mut self, family: &str, weight: &str, style: &str, font: FontHandle) {
        let family = normalize_family(family);
        let weight = normalize_weight(weight);
        let style = normalize_style(style);

        let weights = entry(&mut self.families, family);
        let styles = entry(weights, weight);
        match styles.iter_mut().find(|(k, _)| *k == style) {
            Some((_, existing)) => *existing = font,
            None => styles.push((style, font)),
        }
    }

    /// Looks up one family. `None` weight/style picks the first registered entry.
    /// Returns `Err` with the axis that failed.
    fn lookup(
        &self,
        family: &str,
        weight: Option<&str>,
        style: Option<&str>,
    ) -> std::result::Result<FontHandle, Miss> {
        let family = normalize_family(family);
        let weights = find(&self.families, &family).ok_or(Miss::Family)?;
        let styles = match weight {
            Some(w) => find(weights, &normalize_weight(w)).ok_or(Miss::Weight)?,
            None => &weights.first().ok_or(Miss::Weight)?.1,
        };
        let font = match style {
            Some(s) => find(styles, &normalize_style(s)).ok_or(Miss::Style)?,
            None => &styles.first().ok_or(Miss::Style)?.1,
        };
        Ok(font.clone())
    }

    /// Resolves text attributes to a font. Each family in a `font-family` list is tried
    /// in order; generic families and an absent family select the built-in default.
    /// A named family that cannot be matched fails under `strict` and falls back to
    /// the default otherwise.
    pub fn resolve(&self, tag: &str, attrs: &TextAttributes, strict: bool) -> Result<FontHandle> {
        let Some(list) = attrs.family.as_deref() else {
            return Ok(default_font());
        };
        let weight = attrs.weight.as_deref();
        let style = attrs.style.as_deref();

        let mut first_miss = None;
        for family in split_family_list(list) {
            if GENERIC_FAMILIES.contains(&family.to_ascii_lowercase().as_str()) {
                return Ok(default_font());
            }
            match self.lookup(&family, weight, style) {
                Ok(font) => return Ok(font),
                Err(miss) => {
                    first_miss.get_or_insert((family, miss));
                }
            }
        }

        let (family, miss) = first_miss.unwrap_or((list.to_string(), Miss::Family));
        if strict {
            return Err(GraphicError::UnresolvedFont {
                tag: tag.to_string(),
                family,
                weight: matches!(miss, Miss::Weight | Miss::Style)
                    .then(|| weight.map(str::to_string))
                    .flatten(),
                style: matches!(miss, Miss::Style)
                    .then(|| style.map(str::to_string))
                    .flatten(),
            });
        }
        log::warn!("<{tag}>: no font for {family:?}, using Helvetica");
        Ok(default_font())
    }
}

#[derive(Debug, Clone, Copy)]
enum Miss {
    Family,
    Weight,
    Style,
}

fn entry<T: Default>(map: &mut Vec<(String, T)>, key: String) -> &mut T {
    let idx = match map.iter().position(|(k, _)| *k == key) {
        Some(idx) => idx,
        None => {
            map.push((key, T::default()));
            map.len() - 1
        }
    };
    &mut map[idx].1
}

fn find<'a, T>(map: &'a [(String, T)], key: &str) -> Option<&'a T> {
    map.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

pub fn default_font() -> FontHandle {
    FontHandle::new(StandardFont::helvetica())
}

fn split_family_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|f| f.trim().trim_matches('"').trim_matches('\'').trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

fn normalize_family(family: &str) -> String {
    family
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_ascii_lowercase()
}

fn normalize_weight(weight: &str) -> String {
    match weight.trim().to_ascii_lowercase().as_str() {
        "normal" => "400".to_string(),
        "bold" => "700".to_string(),
        other => other.to_string(),
    }
}

fn normalize_style(style: &str) -> String {
    style.trim().to_ascii_lowercase()
}

/// Inherited text state. Cloned at every text nesting boundary so sibling runs never
/// see each other's overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct TextAttributes {
    pub family: Option<String>,
    pub weight: Option<String>,
    pub style: Option<String>,
    pub size: f64,
}

impl TextAttributes {
    pub fn new(default_size: f64) -> Self {
        Self {
            family: None,
            weight: None,
            style: None,
            size: default_size,
        }
    }

    /// Copy of `self` with any explicitly set values applied on top.
    pub fn descend(
        &self,
        family: Option<&str>,
        weight: Option<&str>,
        style: Option<&str>,
        size: Option<f64>,
    ) -> Self {
        Self {
            family: family.map(str::to_string).or_else(|| self.family.clone()),
            weight: weight.map(str::to_string).or_else(|| self.weight.clone()),
            style: style.map(str::to_string).or_else(|| self.style.clone()),
            size: size.unwrap_or(self.size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbeddedFont, ResourceKey};

    #[derive(Debug)]
    struct Named(&'static str);

    impl EmbeddedFont for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn encode_text(&self, text: &str) -> Vec<u8> {
            text.as_bytes().to_vec()
        }
        fn identity(&self) -> ResourceKey {
            ResourceKey::named(self.0)
        }
    }

    fn table() -> FontTable {
        let mut t = FontTable::new();
        t.insert("Inter", "400", "normal", FontHandle::new(Named("Inter-Regular")));
        t.insert("Inter", "400", "italic", FontHandle::new(Named("Inter-Italic")));
        t.insert("Inter", "bold", "normal", FontHandle::new(Named("Inter-Bold")));
        t
    }

    fn attrs(family: Option<&str>, weight: Option<&str>, style: Option<&str>) -> TextAttributes {
        TextAttributes::new(16.0).descend(family, weight, style, None)
    }

    #[test]
    fn explicit_axes_select_exact_face() {
        let t = table();
        let font = t
            .resolve("text", &attrs(Some("Inter"), Some("700"), Some("normal")), true)
            .expect("bold");
        assert_eq!(font.name(), "Inter-Bold");
        let font = t
            .resolve("text", &attrs(Some("'inter'"), Some("normal"), Some("italic")), true)
            .expect("italic");
        assert_eq!(font.name(), "Inter-Italic");
    }

    #[test]
    fn missing_axes_take_first_available() {
        let t = table();
        let font = t
            .resolve("text", &attrs(Some("Inter"), None, None), true)
            .expect("first face");
        assert_eq!(font.name(), "Inter-Regular");
    }

    #[test]
    fn family_lists_try_each_entry() {
        let t = table();
        let font = t
            .resolve("text", &attrs(Some("Roboto, \"Inter\""), None, None), true)
            .expect("second family");
        assert_eq!(font.name(), "Inter-Regular");
        let font = t
            .resolve("text", &attrs(Some("Roboto, sans-serif"), None, None), true)
            .expect("generic fallback");
        assert_eq!(font.name(), "Helvetica");
    }

    #[test]
    fn strict_policy_reports_missing_axis() {
        let t = table();
        let err = t
            .resolve("tspan", &attrs(Some("Inter"), Some("900"), None), true)
            .expect_err("no black weight");
        assert!(matches!(
            err,
            GraphicError::UnresolvedFont { ref weight, ref style, .. }
                if weight.as_deref() == Some("900") && style.is_none()
        ));
        let err = t
            .resolve("text", &attrs(Some("Roboto"), None, None), true)
            .expect_err("unknown family");
        assert!(matches!(err, GraphicError::UnresolvedFont { ref family, .. } if family == "Roboto"));
    }

    #[test]
    fn lenient_policy_falls_back_to_default() {
        let t = table();
        let font = t
            .resolve("text", &attrs(Some("Roboto"), None, None), false)
            .expect("fallback");
        assert_eq!(font.name(), "Helvetica");
        let font = t.resolve("text", &attrs(None, None, None), true).expect("no family");
        assert_eq!(font.name(), "Helvetica");
    }

    #[test]
    fn descend_copies_and_overrides() {
        let parent = TextAttributes::new(16.0).descend(Some("Inter"), Some("700"), None, Some(20.0));
        let child = parent.descend(None, None, Some("italic"), None);
        assert_eq!(child.family.as_deref(), Some("Inter"));
        assert_eq!(child.weight.as_deref(), Some("700"));
        assert_eq!(child.style.as_deref(), Some("italic"));
        assert_eq!(child.size, 20.0);
        assert_eq!(parent.style, None);
    }
}
