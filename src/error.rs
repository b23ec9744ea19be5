//! Error type shared by the reader, the model builder and the executor.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The source text is not well-formed markup.
    #[error("Markup ({line}:{column}): {message}")]
    Markup {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("IO ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unknown attribute '{attribute}' for {entity}")]
    UnknownAttribute { entity: &'static str, attribute: String },
    #[error("Unknown element <{element}> in {entity}")]
    UnknownElement { entity: &'static str, element: String },
    #[error("Invalid value '{value}' for {entity} attribute '{attribute}'")]
    InvalidValue {
        entity: &'static str,
        attribute: String,
        value: String,
    },
    #[error("Unresolved {entity} reference: {name}")]
    UnresolvedReference { entity: &'static str, name: String },
    #[error("Missing mandatory parameter(s) for {entity} '{name}'")]
    MissingParameter { entity: &'static str, name: String },
    #[error("Duplicate {entity}: {name}")]
    Duplicate { entity: &'static str, name: String },
    /// Cross-entity inconsistency found after the whole source was read, or a
    /// binding that turned out absent while running.
    #[error("Integrity check failed: {0}")]
    Integrity(String),
    #[error("Model not loaded: no valid state")]
    NotLoaded,
}

impl ModelError {
    pub(crate) fn invalid(entity: &'static str, attribute: &str, value: &str) -> Self {
        ModelError::InvalidValue {
            entity,
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn unknown_attribute(entity: &'static str, attribute: &str) -> Self {
        ModelError::UnknownAttribute {
            entity,
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn unknown_element(entity: &'static str, element: &str) -> Self {
        ModelError::UnknownElement {
            entity,
            element: element.to_string(),
        }
    }

    /// True for failures discovered by the deferred resolution pass or at run time.
    pub fn is_integrity(&self) -> bool {
        matches!(self, ModelError::Integrity(_))
    }
}

/// Parse a base-10 integer attribute, mapping failures to [`ModelError::InvalidValue`].
pub(crate) fn parse_int<T: std::str::FromStr>(
    entity: &'static str,
    attribute: &str,
    value: &str,
) -> Result<T, ModelError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ModelError::invalid(entity, attribute, value))
}

/// Parse a `TRUE`/`FALSE` attribute.
pub(crate) fn parse_flag(entity: &'static str, attribute: &str, value: &str) -> Result<bool, ModelError> {
    match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err(ModelError::invalid(entity, attribute, value)),
    }
}
