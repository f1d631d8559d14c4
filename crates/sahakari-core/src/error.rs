//! Error types for content decoding and rendering.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding CMS content.
#[derive(Error, Debug)]
pub enum Error {
    /// A field has a value the decoder does not understand.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// The name of the invalid field.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// The image asset reference does not follow the `image-<id>-<w>x<h>-<ext>` layout.
    #[error("invalid asset reference: {0}")]
    InvalidAssetRef(String),
}
