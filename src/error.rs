use thiserror::Error;

/// Errors raised while talking to the upload server or storage.
///
/// The `Display` text is what ends up in an item's info column and in
/// notifications, so keep it short and readable.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No files pending upload")]
    NoPendingFiles,

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Progress channel error: {0}")]
    Channel(String),

    #[error("{message} (status code: {status})")]
    Rejected { status: u16, message: String },

    #[error("Upload failed, status code: {0}")]
    UnexpectedStatus(u16),

    #[error("Failed to get presigned URL")]
    PresignFailed,

    #[error("Failed to get download link")]
    DownloadLinkFailed,

    #[error("Failed to generate short link")]
    ShortLinkFailed,

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid server response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Upload cancelled")]
    Cancelled,
}

impl From<tokio_tungstenite::tungstenite::Error> for UploadError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        UploadError::Channel(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
