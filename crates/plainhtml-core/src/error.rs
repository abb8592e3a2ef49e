/// Error type for conversion operations.
///
/// Unreadable inputs and auxiliary files are recoverable by contract: the
/// converter reports them through `log::warn!` and continues, so they never
/// surface here. Only dictionary parse failures and output write failures
/// abort a conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// A link dictionary could not be compiled.
    #[error("dictionary parse error in {file}: {reason} near `{context}`")]
    DictionaryParse {
        file: String,
        reason: String,
        context: String,
    },

    /// Writing to the output stream failed.
    #[error("write error: {0}")]
    Write(#[from] std::io::Error),
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
