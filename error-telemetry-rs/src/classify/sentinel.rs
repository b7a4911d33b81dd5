//! Sentinel stage.
//!
//! Some failures carry no payload and are only told apart by which marker
//! they are: an `io::ErrorKind`, a unit error type, a fieldless enum variant.
//! Two read-only tables map those markers to tags, one for protocol
//! violations and one for everything else.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::io;

use once_cell::sync::Lazy;

use super::{Classification, Classifier, Stage};
use crate::kinds::process::NotFound;
use crate::kinds::proto::ProtocolError;
use crate::kinds::tls::{IncorrectPassword, UnsupportedAlgorithm};

/// Stable identity of a payload-less failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// An `io::Error` without an OS error code
    Io(io::ErrorKind),
    Fmt,
    ChannelClosed,
    HexOddLength,
    HexStringLength,
    ProgramNotFound,
    IncorrectPassword,
    UnsupportedAlgorithm,
}

impl Sentinel {
    /// Identifies the marker a failure stands for, if any
    pub fn of(err: &(dyn StdError + 'static)) -> Option<Self> {
        if let Some(e) = err.downcast_ref::<io::Error>() {
            return e.raw_os_error().is_none().then(|| Sentinel::Io(e.kind()));
        }
        if err.is::<std::fmt::Error>() {
            return Some(Sentinel::Fmt);
        }
        if err.is::<std::sync::mpsc::RecvError>() {
            return Some(Sentinel::ChannelClosed);
        }
        if let Some(e) = err.downcast_ref::<hex::FromHexError>() {
            return match e {
                hex::FromHexError::OddLength => Some(Sentinel::HexOddLength),
                hex::FromHexError::InvalidStringLength => Some(Sentinel::HexStringLength),
                _ => None,
            };
        }
        if err.is::<NotFound>() {
            return Some(Sentinel::ProgramNotFound);
        }
        if err.is::<IncorrectPassword>() {
            return Some(Sentinel::IncorrectPassword);
        }
        if err.is::<UnsupportedAlgorithm>() {
            return Some(Sentinel::UnsupportedAlgorithm);
        }
        None
    }
}

static PROTOCOL_SENTINELS: Lazy<HashMap<ProtocolError, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (ProtocolError::HeaderTooLong, "http.ErrHeaderTooLong"),
        (ProtocolError::ShortBody, "http.ErrShortBody"),
        (ProtocolError::NotSupported, "http.ErrNotSupported"),
        (ProtocolError::UnexpectedTrailer, "http.ErrUnexpectedTrailer"),
        (ProtocolError::MissingContentLength, "http.ErrMissingContentLength"),
        (ProtocolError::NotMultipart, "http.ErrNotMultipart"),
        (ProtocolError::MissingBoundary, "http.ErrMissingBoundary"),
    ])
});

static MISC_SENTINELS: Lazy<HashMap<Sentinel, &'static str>> = Lazy::new(|| {
    use io::ErrorKind;

    HashMap::from([
        (Sentinel::Io(ErrorKind::UnexpectedEof), "io.ErrUnexpectedEOF"),
        (Sentinel::Io(ErrorKind::BrokenPipe), "io.ErrClosedPipe"),
        (Sentinel::Io(ErrorKind::WriteZero), "io.ErrShortWrite"),
        (Sentinel::Io(ErrorKind::Interrupted), "io.ErrInterrupted"),
        (Sentinel::Io(ErrorKind::WouldBlock), "io.ErrWouldBlock"),
        (Sentinel::Io(ErrorKind::InvalidData), "io.ErrInvalidData"),
        (Sentinel::Io(ErrorKind::Unsupported), "io.ErrUnsupported"),
        (Sentinel::Io(ErrorKind::OutOfMemory), "io.ErrOutOfMemory"),
        (Sentinel::Io(ErrorKind::InvalidInput), "os.ErrInvalid"),
        (Sentinel::Io(ErrorKind::PermissionDenied), "os.ErrPermission"),
        (Sentinel::Io(ErrorKind::AlreadyExists), "os.ErrExist"),
        (Sentinel::Io(ErrorKind::NotFound), "os.ErrNotExist"),
        (Sentinel::Io(ErrorKind::TimedOut), "os.ErrDeadlineExceeded"),
        (Sentinel::Fmt, "fmt.Error"),
        (Sentinel::ChannelClosed, "mpsc.RecvError"),
        (Sentinel::HexOddLength, "hex.ErrLength"),
        (Sentinel::HexStringLength, "hex.ErrStringLength"),
        (Sentinel::ProgramNotFound, "process.ErrNotFound"),
        (Sentinel::IncorrectPassword, "x509.IncorrectPasswordError"),
        (Sentinel::UnsupportedAlgorithm, "x509.ErrUnsupportedAlgorithm"),
    ])
});

/// Tag of a protocol sentinel
pub fn protocol_tag(err: ProtocolError) -> Option<&'static str> {
    PROTOCOL_SENTINELS.get(&err).copied()
}

/// Tag of any other sentinel
pub fn misc_tag(sentinel: Sentinel) -> Option<&'static str> {
    MISC_SENTINELS.get(&sentinel).copied()
}

pub(super) fn register(classifier: &mut Classifier) {
    classifier.push(
        Stage::Sentinel,
        Box::new(|err: &(dyn StdError + 'static), _: &Classifier| {
            sentinel_tag(err).map(|tag| Classification::new(tag, err.to_string()))
        }),
    );
}

fn sentinel_tag(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    if let Some(e) = err.downcast_ref::<ProtocolError>() {
        return protocol_tag(*e);
    }
    if let Some(tag) = Sentinel::of(err).and_then(misc_tag) {
        return Some(tag);
    }
    err.is::<io::Error>().then_some("io.Error")
}
