//! Error types for content conversion.

/// Error converting between Markdown and storage format.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// Storage markup is not parseable even with HTML leniencies applied.
    #[error("malformed storage markup")]
    Xml(#[from] quick_xml::Error),

    /// Encoding error while decoding markup.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// Embedded macro block could not be decoded.
    #[error("invalid embedded macro block: {0}")]
    MacroBlock(String),
}
