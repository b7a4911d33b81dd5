//! Network failures.

use std::error::Error as StdError;
use std::fmt;

use super::Cause;

/// A failed network operation, wrapping the lower-level cause.
#[derive(Debug)]
pub struct OpError {
    /// Operation that failed, such as `dial`, `read` or `write`
    pub op: String,
    /// Network kind, such as `tcp` or `udp`
    pub net: String,
    /// Local address, when bound
    pub source_addr: Option<String>,
    /// Remote address
    pub addr: Option<String>,
    cause: Cause,
}

impl OpError {
    pub fn new<E>(op: impl Into<String>, net: impl Into<String>, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            op: op.into(),
            net: net.into(),
            source_addr: None,
            addr: None,
            cause: Cause::new(err),
        }
    }

    /// Sets the local address
    pub fn local(mut self, addr: impl fmt::Display) -> Self {
        self.source_addr = Some(addr.to_string());
        self
    }

    /// Sets the remote address
    pub fn remote(mut self, addr: impl fmt::Display) -> Self {
        self.addr = Some(addr.to_string());
        self
    }

    /// The wrapped failure
    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if !self.net.is_empty() {
            write!(f, " {}", self.net)?;
        }
        match (&self.source_addr, &self.addr) {
            (Some(local), Some(remote)) => write!(f, " {}->{}", local, remote)?,
            (Some(addr), None) | (None, Some(addr)) => write!(f, " {}", addr)?,
            (None, None) => {}
        }
        write!(f, ": {}", self.cause)
    }
}

impl StdError for OpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.get_ref())
    }
}

/// An address that is syntactically valid but unusable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("address {addr}: {err}")]
pub struct AddrError {
    pub err: String,
    pub addr: String,
}

/// A failed name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsError {
    pub err: String,
    /// Name being looked up
    pub name: String,
    /// Server used, if known
    pub server: Option<String>,
    pub is_timeout: bool,
}

impl fmt::Display for DnsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lookup {}", self.name)?;
        if let Some(server) = &self.server {
            write!(f, " on {}", server)?;
        }
        write!(f, ": {}", self.err)
    }
}

impl StdError for DnsError {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidAddrError(pub String);

/// Text that could not be parsed as the named kind of network value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {text}")]
pub struct ParseError {
    /// What was expected, e.g. `IP address` or `CIDR address`
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network {0}")]
pub struct UnknownNetworkError(pub String);

/// A failed operation on a URL
#[derive(Debug)]
pub struct UrlError {
    /// Operation, typically the HTTP method
    pub op: String,
    pub url: String,
    cause: Cause,
}

impl UrlError {
    pub fn new<E>(op: impl Into<String>, url: impl Into<String>, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            op: op.into(),
            url: url.into(),
            cause: Cause::new(err),
        }
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}: {}", self.op, self.url, self.cause)
    }
}

impl StdError for UrlError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.get_ref())
    }
}
