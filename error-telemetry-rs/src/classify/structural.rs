//! Structural stage: failures recognized by their concrete type.
//!
//! Rules are registered in a fixed order; each one only ever matches its own
//! type, so the order only matters for readability of the table.

use std::error::Error as StdError;
use std::num::{ParseFloatError, ParseIntError, TryFromIntError};
use std::str::Utf8Error;
use std::string::FromUtf8Error;

use super::sentinel::protocol_tag;
use super::{Classification, Classifier, Stage};
use crate::kinds::fs::{LinkError, PathError, SyscallError};
use crate::kinds::process::{ExitError, ProcessError, SpawnError};
use crate::kinds::proto::{ProtocolError, ResponseError};
use crate::kinds::tls::{CertificateError, RecordHeaderError};

const STAGE: Stage = Stage::Structural;

pub(super) fn register(c: &mut Classifier) {
    // protocol layer
    c.rule::<ProtocolError, _>(STAGE, |e, _| {
        let tag = protocol_tag(*e).unwrap_or("proto.ProtocolError");
        Some(Classification::new(tag, e.to_string()))
    });
    c.rule::<ResponseError, _>(STAGE, |e, _| {
        Some(Classification::new("proto.ResponseError", e.to_string()).extra("code", e.code.to_string()))
    });
    c.push(
        STAGE,
        Box::new(|err: &(dyn StdError + 'static), _: &Classifier| http_types(err)),
    );

    // URL validation
    c.rule::<url::ParseError, _>(STAGE, |e, _| {
        Some(match e {
            url::ParseError::InvalidDomainCharacter | url::ParseError::IdnaError => {
                Classification::new("url.InvalidHostError", "invalid character in host name")
            }
            other => Classification::new("url.ParseError", other.to_string()),
        })
    });

    // TLS
    c.rule::<RecordHeaderError, _>(STAGE, |e, _| {
        Some(Classification::new("tls.RecordHeaderError", &e.msg).extra("header", hex::encode(e.header)))
    });
    c.rule::<CertificateError, _>(STAGE, |e, _| Some(certificate(e)));

    // encodings
    c.rule::<hex::FromHexError, _>(STAGE, |e, _| match e {
        hex::FromHexError::InvalidHexCharacter { .. } => {
            Some(Classification::new("hex.InvalidByteError", "invalid byte"))
        }
        _ => None,
    });
    c.rule::<Utf8Error, _>(STAGE, |_, _| Some(invalid_utf8()));
    c.rule::<FromUtf8Error, _>(STAGE, |_, _| Some(invalid_utf8()));
    c.rule::<serde_json::Error, _>(STAGE, |e, _| Some(json(e)));

    // filesystem
    c.rule::<LinkError, _>(STAGE, |e, _| {
        Some(Classification::new("fs.LinkError", e.to_string()).op(&e.op))
    });
    c.rule::<PathError, _>(STAGE, |e, _| {
        Some(
            Classification::new("fs.PathError", e.source.to_string())
                .op(&e.op)
                .extra("path", e.path.to_string_lossy()),
        )
    });
    c.rule::<SyscallError, _>(STAGE, |e, _| {
        Some(Classification::new("fs.SyscallError", e.source.to_string()).op(&e.syscall))
    });

    // external processes
    c.rule::<ProcessError, _>(STAGE, |e, c| {
        Some(match e {
            ProcessError::NotFound(inner) => c.classify(inner),
            ProcessError::Spawn(inner) => c.classify(inner),
            ProcessError::Exit(inner) => c.classify(inner),
        })
    });
    c.rule::<SpawnError, _>(STAGE, |e, _| {
        Some(
            Classification::new("process.SpawnError", e.source.to_string())
                .extra("program", &e.program),
        )
    });
    c.rule::<ExitError, _>(STAGE, |e, c| {
        let stderr = String::from_utf8_lossy(&e.stderr);
        Some(
            Classification::new("process.ExitError", e.to_string())
                .extra("stderr", truncate(&stderr, c.stderr_limit())),
        )
    });

    // numbers and time
    c.rule::<ParseIntError, _>(STAGE, |e, _| Some(numeric("num.ParseIntError", "parse_int", e)));
    c.rule::<ParseFloatError, _>(STAGE, |e, _| {
        Some(numeric("num.ParseFloatError", "parse_float", e))
    });
    c.rule::<TryFromIntError, _>(STAGE, |e, _| Some(numeric("num.TryFromIntError", "try_from", e)));
    c.rule::<chrono::ParseError, _>(STAGE, |e, _| {
        Some(Classification::new("time.ParseError", e.to_string()))
    });
}

fn http_types(err: &(dyn StdError + 'static)) -> Option<Classification> {
    if let Some(e) = err.downcast_ref::<http::Error>() {
        let tag = http_tag(e.get_ref()).unwrap_or("http.Error");
        return Some(Classification::new(tag, e.to_string()));
    }
    http_tag(err).map(|tag| Classification::new(tag, err.to_string()))
}

fn http_tag(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    if err.is::<http::uri::InvalidUri>() {
        Some("http.InvalidUri")
    } else if err.is::<http::uri::InvalidUriParts>() {
        Some("http.InvalidUriParts")
    } else if err.is::<http::header::InvalidHeaderName>() {
        Some("http.InvalidHeaderName")
    } else if err.is::<http::header::InvalidHeaderValue>() {
        Some("http.InvalidHeaderValue")
    } else if err.is::<http::method::InvalidMethod>() {
        Some("http.InvalidMethod")
    } else if err.is::<http::status::InvalidStatusCode>() {
        Some("http.InvalidStatusCode")
    } else {
        None
    }
}

fn certificate(e: &CertificateError) -> Classification {
    let tag = match e {
        CertificateError::Invalid { .. } => "x509.CertificateInvalidError",
        CertificateError::ConstraintViolation => "x509.ConstraintViolationError",
        CertificateError::Hostname { .. } => "x509.HostnameError",
        CertificateError::InsecureAlgorithm { .. } => "x509.InsecureAlgorithmError",
        CertificateError::SystemRoots => "x509.SystemRootsError",
        CertificateError::UnhandledCriticalExtension => "x509.UnhandledCriticalExtension",
        CertificateError::UnknownAuthority => "x509.UnknownAuthorityError",
    };
    let class = Classification::new(tag, e.to_string());
    match e {
        CertificateError::Hostname { host, .. } => class.extra("host", host),
        _ => class,
    }
}

fn invalid_utf8() -> Classification {
    Classification::new("utf8.InvalidUTF8Error", "invalid UTF-8 in string")
}

fn json(e: &serde_json::Error) -> Classification {
    use serde_json::error::Category;

    let tag = match e.classify() {
        Category::Syntax => "json.SyntaxError",
        Category::Eof => "json.EofError",
        Category::Data => "json.DataError",
        Category::Io => "json.IoError",
    };
    let class = Classification::new(tag, e.to_string());
    if e.line() == 0 {
        return class;
    }
    class
        .extra("line", e.line().to_string())
        .extra("column", e.column().to_string())
}

fn numeric(tag: &str, function: &str, e: &dyn StdError) -> Classification {
    Classification::new(tag, e.to_string()).extra("function", function)
}

/// Cuts `text` to at most `limit` bytes without splitting a character
fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::process::NotFound;
    use pretty_assertions::assert_eq;
    use std::io;

    fn classify<E: StdError + 'static>(err: &E) -> Classification {
        Classifier::builtin().classify(err)
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("abcdef", 4), "abcd");
        assert_eq!(truncate("abc", 10), "abc");
        // 'é' is two bytes; cutting inside it backs off
        assert_eq!(truncate("aé", 2), "a");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn test_exit_error_stderr_is_capped() {
        let err = ExitError {
            code: Some(1),
            stderr: vec![b'x'; 100],
        };
        let class = Classifier::builtin().with_stderr_limit(10).classify(&err);
        assert_eq!(class.type_tag, "process.ExitError");
        assert_eq!(class.description, "exit status 1");
        assert_eq!(class.extra["stderr"], "x".repeat(10));
    }

    #[test]
    fn test_process_error_delegates() {
        let class = classify(&ProcessError::NotFound(NotFound));
        assert_eq!(class.type_tag, "process.ErrNotFound");

        let spawn = ProcessError::Spawn(SpawnError::new(
            "convert",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        ));
        let class = classify(&spawn);
        assert_eq!(class.type_tag, "process.SpawnError");
        assert_eq!(class.description, "permission denied");
        assert_eq!(class.extra["program"], "convert");
    }

    #[test]
    fn test_http_error_unwraps_kind() {
        let err = http::Request::builder()
            .header("bad header\n", "v")
            .body(())
            .unwrap_err();
        let class = classify(&err);
        assert_eq!(class.type_tag, "http.InvalidHeaderName");

        let err = "http://[::1".parse::<http::Uri>().unwrap_err();
        assert_eq!(classify(&err).type_tag, "http.InvalidUri");
    }

    #[test]
    fn test_url_host() {
        for input in ["http://exa mple.com", "http://exa<mple.com", "http://a^b.com"] {
            let err = url::Url::parse(input).unwrap_err();
            let class = classify(&err);
            assert_eq!(class.type_tag, "url.InvalidHostError", "{input}");
            assert_eq!(class.description, "invalid character in host name");
        }

        let err = url::Url::parse("no scheme here").unwrap_err();
        assert_eq!(classify(&err).type_tag, "url.ParseError");
    }

    #[test]
    fn test_json_categories() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\": }").unwrap_err();
        let class = classify(&err);
        assert_eq!(class.type_tag, "json.SyntaxError");
        assert_eq!(class.extra["line"], "1");
        assert!(class.extra.contains_key("column"));

        let err = serde_json::from_str::<u8>("\"seven\"").unwrap_err();
        assert_eq!(classify(&err).type_tag, "json.DataError");

        let err = serde_json::from_str::<serde_json::Value>("[1,").unwrap_err();
        assert_eq!(classify(&err).type_tag, "json.EofError");
    }

    #[test]
    fn test_time_parse() {
        let err = chrono::NaiveDate::parse_from_str("2024-13-45", "%Y-%m-%d").unwrap_err();
        let class = classify(&err);
        assert_eq!(class.type_tag, "time.ParseError");
        assert_eq!(class.description, err.to_string());
    }
}
