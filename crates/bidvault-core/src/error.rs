/// All errors surfaced by the ingestion and analysis pipeline.
///
/// Every variant renders as a one-line, human-readable message suitable for
/// showing to the user; none of them carries a raw reply payload.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file extension is not one of pdf, docx, xlsx, xls, txt.
    #[error("unsupported file type '.{extension}' for {file}: expected PDF, DOCX, Excel or TXT")]
    UnsupportedFormat { file: String, extension: String },

    /// The reader failed or the document had no extractable text.
    #[error("failed to parse {file}: {reason}")]
    ExtractionFailed { file: String, reason: String },

    /// Extraction succeeded but produced no usable text.
    #[error("{file} appears to be empty or unreadable")]
    EmptyDocument { file: String },

    /// No API credential is configured for the generation service.
    #[error("API key is missing: set the {env_var} environment variable")]
    MissingCredential { env_var: String },

    /// The network call or the remote service failed.
    #[error("generation service error: {0}")]
    UpstreamError(String),

    /// The service answered without any text.
    #[error("empty response from the generation service")]
    EmptyResponse,

    /// The reply could not be recovered as a JSON array of question/answer pairs.
    #[error("failed to parse the generation reply as JSON: {0}")]
    MalformedResponse(String),

    /// The store backend is not initialized or cannot be opened.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// An underlying store read or write failed.
    #[error("store I/O error: {0}")]
    StoreIo(String),

    /// The operation was refused because an analysis is in flight.
    #[error("an analysis is already running")]
    Busy,
}

impl Error {
    /// True for failures that a second attempt may cure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::UpstreamError(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
