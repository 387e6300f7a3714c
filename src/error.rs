//! Error taxonomy for a generation run.
//!
//! Every variant is fatal: the pipeline aborts and no partial correspondence
//! graph reaches emission. Unresolvable *nested* members are not errors; the
//! builder logs them with `tracing::warn!` and keeps an opaque leaf.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A root type referenced by a function is unknown to the catalog.
    #[error("cannot resolve type `{type_name}` ({location})")]
    Resolution { type_name: String, location: String },

    /// A rule line has the wrong argument count or an uncompilable pattern.
    #[error("invalid `{category}` option `{text}` in {location}: {reason}")]
    OptionFormat {
        category: String,
        text: String,
        reason: String,
        location: String,
    },

    /// The root contract declaring the functions is missing.
    #[error("missing root contract `{0}` in setup")]
    Structural(String),

    #[error("invalid type signature `{text}` in {location}: {reason}")]
    Signature {
        text: String,
        reason: String,
        location: String,
    },

    #[error("setup error: {0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn option_format(
        category: impl Into<String>,
        text: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::OptionFormat {
            category: category.into(),
            text: text.into(),
            reason: reason.into(),
            location: "rule".to_string(),
        }
    }

    /// Attach a source location to errors that carry one.
    pub fn at(mut self, at: &str) -> Self {
        match &mut self {
            Error::OptionFormat { location, .. } | Error::Signature { location, .. } => {
                *location = at.to_string();
            }
            _ => {}
        }
        self
    }

    pub fn signature(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Signature {
            text: text.into(),
            reason: reason.into(),
            location: "type".to_string(),
        }
    }
}
