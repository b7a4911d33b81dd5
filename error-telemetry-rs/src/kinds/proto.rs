//! Protocol-layer failures.

/// Well-known HTTP protocol violations.
///
/// Each variant is a fixed marker with no payload; the classifier maps them
/// through the protocol sentinel table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ProtocolError {
    #[error("header too long")]
    HeaderTooLong,
    #[error("entity body too short")]
    ShortBody,
    #[error("feature not supported")]
    NotSupported,
    #[error("trailer header without chunked transfer encoding")]
    UnexpectedTrailer,
    #[error("missing ContentLength in HEAD response")]
    MissingContentLength,
    #[error("request Content-Type isn't multipart/form-data")]
    NotMultipart,
    #[error("no multipart boundary param in Content-Type")]
    MissingBoundary,
}

/// An error reply from a line-oriented text protocol (SMTP, FTP and the like)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code:03} {msg}")]
pub struct ResponseError {
    pub code: u16,
    pub msg: String,
}
