//! Network stage: operation wrappers and the failures they usually carry.

use std::error::Error as StdError;
use std::io;

use super::{type_tag, Classification, Classifier, Stage};
use crate::kinds::net::{
    AddrError, DnsError, InvalidAddrError, OpError, ParseError, UnknownNetworkError, UrlError,
};

pub(super) fn register(classifier: &mut Classifier) {
    classifier.push(
        Stage::Network,
        Box::new(|err: &(dyn StdError + 'static), _: &Classifier| classify_network(err)),
    );
}

fn classify_network(err: &(dyn StdError + 'static)) -> Option<Classification> {
    let Some(op_err) = err.downcast_ref::<OpError>() else {
        return identify(err);
    };

    let inner: &(dyn StdError + 'static) = op_err.cause().get_ref();
    let mut class = identify(inner).unwrap_or_else(|| {
        Classification::new(type_tag(op_err.cause().type_name()), inner.to_string())
    });
    // an operation found on the inner failure is more specific
    if class.op.is_none() {
        class.op = Some(op_err.op.clone());
    }
    if let Some(local) = &op_err.source_addr {
        class.extra.insert("local_addr".into(), local.clone());
    }
    if let Some(remote) = &op_err.addr {
        class.extra.insert("remote_addr".into(), remote.clone());
    }
    if !op_err.net.is_empty() {
        class.extra.insert("network".into(), op_err.net.clone());
    }
    Some(class)
}

fn identify(err: &(dyn StdError + 'static)) -> Option<Classification> {
    if let Some(e) = err.downcast_ref::<AddrError>() {
        return Some(Classification::new("net.AddrError", &e.err).extra("addr", &e.addr));
    }
    if let Some(e) = err.downcast_ref::<DnsError>() {
        let mut class = Classification::new("net.DNSError", &e.err).extra("domain", &e.name);
        if let Some(server) = &e.server {
            class = class.extra("dns_server", server);
        }
        if e.is_timeout {
            class = class.extra("dns_timeout", "true");
        }
        return Some(class);
    }
    if let Some(e) = err.downcast_ref::<InvalidAddrError>() {
        return Some(Classification::new("net.InvalidAddrError", e.to_string()));
    }
    if let Some(e) = err.downcast_ref::<ParseError>() {
        return Some(
            Classification::new("net.ParseError", format!("invalid {}", e.kind))
                .extra("text_to_parse", &e.text),
        );
    }
    if let Some(e) = err.downcast_ref::<std::net::AddrParseError>() {
        return Some(Classification::new("net.AddrParseError", e.to_string()));
    }
    if err.is::<UnknownNetworkError>() {
        return Some(Classification::new("net.UnknownNetworkError", "unknown network"));
    }
    if let Some(e) = err.downcast_ref::<io::Error>() {
        return e
            .raw_os_error()
            .map(|_| Classification::new("os.Errno", e.to_string()));
    }
    if let Some(e) = err.downcast_ref::<UrlError>() {
        return Some(
            Classification::new("url.Error", e.cause().to_string())
                .op(&e.op)
                .extra("url", &e.url),
        );
    }
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        return Some(http_client(e));
    }
    None
}

fn http_client(e: &reqwest::Error) -> Classification {
    let phase = if e.is_builder() {
        "builder"
    } else if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_redirect() {
        "redirect"
    } else if e.is_status() {
        "status"
    } else if e.is_body() {
        "body"
    } else if e.is_decode() {
        "decode"
    } else {
        "request"
    };

    let mut class = Classification::new("reqwest.Error", e.to_string()).op(phase);
    if let Some(url) = e.url() {
        class = class.extra("url", url.as_str());
    }
    if let Some(status) = e.status() {
        class = class.extra("status", status.as_u16().to_string());
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify<E: StdError + 'static>(err: &E) -> Classification {
        Classifier::builtin().classify(err)
    }

    #[test]
    fn test_op_error_unwraps_addresses() {
        let err = OpError::new(
            "dial",
            "tcp",
            DnsError {
                err: "no such host".into(),
                name: "db.internal".into(),
                server: None,
                is_timeout: false,
            },
        )
        .local("10.0.0.1:4100")
        .remote("10.0.0.9:5432");

        let class = classify(&err);
        assert_eq!(class.type_tag, "net.DNSError");
        assert_eq!(class.op.as_deref(), Some("dial"));
        assert_eq!(class.description, "no such host");
        let keys: Vec<_> = class.extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["domain", "local_addr", "network", "remote_addr"]);
        assert_eq!(class.extra["local_addr"], "10.0.0.1:4100");
        assert_eq!(class.extra["remote_addr"], "10.0.0.9:5432");
        assert_eq!(class.extra["network"], "tcp");
    }

    #[test]
    fn test_dns_timeout_is_flagged() {
        let err = DnsError {
            err: "i/o timeout".into(),
            name: "db.internal".into(),
            server: Some("10.0.0.53:53".into()),
            is_timeout: true,
        };
        let class = classify(&err);
        assert_eq!(class.extra["dns_timeout"], "true");
        assert_eq!(class.extra["dns_server"], "10.0.0.53:53");
    }

    #[test]
    fn test_op_error_unknown_inner_uses_inner_type() {
        #[derive(Debug, thiserror::Error)]
        #[error("handshake stalled")]
        struct Stalled;

        let class = classify(&OpError::new("read", "tcp", Stalled));
        assert!(class.type_tag.ends_with(".Stalled"));
        assert_eq!(class.description, "handshake stalled");
        assert_eq!(class.op.as_deref(), Some("read"));
    }

    #[test]
    fn test_url_error_op_wins_over_wrapper() {
        let err = OpError::new(
            "proxy",
            "",
            UrlError::new("Get", "http://example.com/x", InvalidAddrError("bad".into())),
        );
        let class = classify(&err);
        assert_eq!(class.type_tag, "url.Error");
        assert_eq!(class.op.as_deref(), Some("Get"));
        assert_eq!(class.description, "bad");
        assert!(!class.extra.contains_key("network"));
    }

    #[test]
    fn test_os_errno() {
        let class = classify(&io::Error::from_raw_os_error(111));
        assert_eq!(class.type_tag, "os.Errno");
        assert!(!class.description.is_empty());
    }

    #[test]
    fn test_reqwest_builder_error() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let class = classify(&err);
        assert_eq!(class.type_tag, "reqwest.Error");
        assert_eq!(class.op.as_deref(), Some("builder"));
        assert_eq!(class.description, err.to_string());
    }
}
