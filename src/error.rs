use thiserror::Error;

/// Every way a conversion can fail. The first error met in document order
/// aborts the whole conversion.
#[derive(Debug, Error)]
pub enum GraphicError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("unsupported element <{tag}>{}", .context.as_ref().map(|c| format!(" inside <{c}>")).unwrap_or_default())]
    UnsupportedElement {
        tag: String,
        context: Option<String>,
    },

    #[error("unsupported value {value:?} for attribute `{attribute}` on <{tag}>")]
    UnsupportedAttribute {
        tag: String,
        attribute: String,
        value: String,
    },

    #[error("<{tag}> references #{id}, which is not a defined {expected}")]
    UnresolvedReference {
        tag: String,
        id: String,
        expected: &'static str,
    },

    #[error(
        "no font for family {family:?} weight {} style {} on <{tag}>",
        .weight.as_deref().unwrap_or("*"),
        .style.as_deref().unwrap_or("*")
    )]
    UnresolvedFont {
        tag: String,
        family: String,
        weight: Option<String>,
        style: Option<String>,
    },

    #[error("malformed path data at byte {position}: {reason}")]
    MalformedPath { position: usize, reason: String },

    #[error("unsupported image type {mime:?}")]
    UnsupportedImageType { mime: String },

    #[error("malformed style block: {reason}")]
    MalformedStyleBlock { reason: String },

    #[error("duplicate definition #{id} on <{tag}>")]
    DuplicateDefinition { tag: String, id: String },

    #[error("failed to embed {kind}: {reason}")]
    Embed { kind: &'static str, reason: String },

    #[error("content stream error: {0}")]
    Content(#[from] lopdf::Error),
}

impl GraphicError {
    pub(crate) fn unsupported_attribute(tag: &str, attribute: &str, value: &str) -> Self {
        GraphicError::UnsupportedAttribute {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn unsupported_element(tag: &str, context: Option<&str>) -> Self {
        GraphicError::UnsupportedElement {
            tag: tag.to_string(),
            context: context.map(str::to_string),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphicError>;
