//! TLS and certificate verification failures.

/// Length of a TLS record header
pub const RECORD_HEADER_LEN: usize = 5;

/// The peer sent something that is not a valid TLS record header
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{msg}")]
pub struct RecordHeaderError {
    pub msg: String,
    /// The bytes received where a record header was expected
    pub header: [u8; RECORD_HEADER_LEN],
}

/// Certificate chain verification failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertificateError {
    #[error("x509: certificate is not valid: {reason}")]
    Invalid { reason: String },

    #[error("x509: invalid signature: parent certificate cannot sign this kind of certificate")]
    ConstraintViolation,

    #[error("x509: certificate is valid for {valid_for}, not {host}")]
    Hostname { host: String, valid_for: String },

    #[error("x509: cannot verify signature: insecure algorithm {algorithm}")]
    InsecureAlgorithm { algorithm: String },

    #[error("x509: failed to load system roots and no roots provided")]
    SystemRoots,

    #[error("x509: unhandled critical extension")]
    UnhandledCriticalExtension,

    #[error("x509: certificate signed by unknown authority")]
    UnknownAuthority,
}

/// The private key could not be decrypted with the supplied password
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("x509: decryption password incorrect")]
pub struct IncorrectPassword;

/// The signature algorithm is not implemented
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("x509: cannot verify signature: algorithm unimplemented")]
pub struct UnsupportedAlgorithm;
