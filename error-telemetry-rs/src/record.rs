//! # Records
//!
//! A [`Record`] is the structured form of a single failure occurrence: a flat
//! map of normalized keys to string values, seeded from ambient context,
//! filled in by the classifier and enriched by the caller before it is
//! reported.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;

use serde::{Serialize, Serializer};

use crate::classify::{self, Classification};
use crate::context::{self, Contextual};
use crate::normalize::{normalize_key, stringify};
use crate::types::{Fields, ERROR, ERROR_OP, ERROR_TYPE, RECORD_TYPE_TAG};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Structured, chainable failure record
#[derive(Debug)]
pub struct Record {
    fields: Fields,
    source: Option<BoxError>,
    location: &'static Location<'static>,
}

impl Record {
    /// Creates a record from a bare description
    #[track_caller]
    pub fn new(description: impl Into<String>) -> Self {
        let mut record = Self::seeded(Location::caller());
        record.fields.insert(ERROR.to_string(), description.into());
        record
            .fields
            .insert(ERROR_TYPE.to_string(), RECORD_TYPE_TAG.to_string());
        record
    }

    /// Creates a record describing `err`.
    ///
    /// An empty `description` falls back to the classifier's description.
    /// When `err` is itself a record its fields are inherited as they are.
    #[track_caller]
    pub fn with_source<E>(description: impl Into<String>, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let source: BoxError = Box::new(err);
        Self::from_boxed(
            description.into(),
            source,
            Some(type_name::<E>()),
            Location::caller(),
        )
    }

    /// Wraps a failure, returning it unchanged if it is already a record
    #[track_caller]
    pub fn wrap<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let source: BoxError = Box::new(err);
        match source.downcast::<Record>() {
            Ok(record) => *record,
            Err(source) => Self::from_boxed(
                String::new(),
                source,
                Some(type_name::<E>()),
                Location::caller(),
            ),
        }
    }

    /// Wraps a boxed failure, unboxing it if it is already a record
    #[track_caller]
    pub fn wrap_boxed(err: BoxError) -> Self {
        match err.downcast::<Record>() {
            Ok(record) => *record,
            Err(source) => Self::from_boxed(String::new(), source, None, Location::caller()),
        }
    }

    fn seeded(location: &'static Location<'static>) -> Self {
        let mut fields = Fields::new();
        for (key, value) in context::capture() {
            fields.insert(normalize_key(&key), value);
        }
        Self {
            fields,
            source: None,
            location,
        }
    }

    fn from_boxed(
        description: String,
        source: BoxError,
        type_name: Option<&str>,
        location: &'static Location<'static>,
    ) -> Self {
        let mut record = Self::seeded(location);
        match source.downcast_ref::<Record>() {
            Some(inner) => record.inherit(description, inner),
            None => {
                let err: &(dyn StdError + 'static) = &*source;
                let class = classify::registry().classify_named(err, type_name);
                record.apply(description, class, err);
            }
        }
        record.source = Some(source);
        record
    }

    fn inherit(&mut self, description: String, inner: &Record) {
        for (key, value) in inner.fields.iter().filter(|(key, _)| key.as_str() != ERROR) {
            self.fields.insert(key.clone(), value.clone());
        }
        let description = if description.is_empty() {
            inner.describe().to_string()
        } else {
            description
        };
        self.fields.insert(ERROR.to_string(), description);
    }

    fn apply(
        &mut self,
        description: String,
        class: Classification,
        err: &(dyn StdError + 'static),
    ) {
        if let Some(op) = class.op {
            self.fields.insert(ERROR_OP.to_string(), op);
        }
        self.fields.insert(ERROR_TYPE.to_string(), class.type_tag);
        for (key, value) in class.extra {
            self.fields.insert(normalize_key(&key), value);
        }

        let description = if !description.is_empty() {
            description
        } else if !class.description.is_empty() {
            class.description
        } else {
            err.to_string()
        };
        self.fields.insert(ERROR.to_string(), description);
    }

    /// Sets the operation that failed
    pub fn with_op(&mut self, op: impl Into<String>) -> &mut Self {
        self.fields.insert(ERROR_OP.to_string(), op.into());
        self
    }

    /// Sets a field. The key is normalized; values that cannot be
    /// serialized are left out with a warning.
    pub fn with<V>(&mut self, key: &str, value: V) -> &mut Self
    where
        V: Serialize,
    {
        let key = normalize_key(key);
        match stringify(&value) {
            Some(value) => {
                self.fields.insert(key, value);
            }
            None => tracing::warn!(key = %key, "Dropping field that cannot be serialized"),
        }
        self
    }

    /// Builder form of [`with_op`](Self::with_op)
    pub fn op(mut self, op: impl Into<String>) -> Self {
        self.with_op(op);
        self
    }

    /// Builder form of [`with`](Self::with)
    pub fn field<V>(mut self, key: &str, value: V) -> Self
    where
        V: Serialize,
    {
        self.with(key, value);
        self
    }

    /// Records the proxy the failing connection went through
    pub fn proxy_addr(&mut self, addr: impl fmt::Display) -> &mut Self {
        self.with("proxy_addr", addr.to_string())
    }

    /// Records the method, URL, host and protocol of an HTTP request
    pub fn request<B>(&mut self, request: &http::Request<B>) -> &mut Self {
        let host = request
            .uri()
            .authority()
            .map(|authority| authority.as_str().to_string())
            .or_else(|| {
                request
                    .headers()
                    .get(http::header::HOST)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            });

        self.with("request_method", request.method().as_str());
        self.with("request_url", request.uri().to_string());
        if let Some(host) = host {
            self.with("request_host", host);
        }
        self.with("request_protocol", format!("{:?}", request.version()))
    }

    /// Records the status of an HTTP response
    pub fn response<B>(&mut self, response: &http::Response<B>) -> &mut Self {
        self.with("response_status", response.status().as_u16())
    }

    /// The human-readable description
    pub fn describe(&self) -> &str {
        debug_assert!(self.fields.contains_key(ERROR));
        self.fields.get(ERROR).map_or("", String::as_str)
    }

    /// The classifier type tag
    pub fn error_type(&self) -> &str {
        self.fields.get(ERROR_TYPE).map_or("", String::as_str)
    }

    /// The operation that failed, if known
    pub fn operation(&self) -> Option<&str> {
        self.fields.get(ERROR_OP).map(String::as_str)
    }

    /// Looks up a field by (unnormalized) key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Where the record was created
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Logging namespace of the creation site
    pub fn namespace(&self) -> String {
        crate::logging::namespace_of(self.location)
    }

    /// Hands the record to the process-wide reporter
    pub fn report(&self) {
        crate::reporting::report(self);
    }
}

impl Contextual for Record {
    fn fill(&self, target: &mut Fields) {
        self.fields.fill(target);
    }
}

// The source is not cloneable; clones keep fields and location only.
impl Clone for Record {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            source: None,
            location: self.location,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

impl StdError for Record {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.fields.serialize(serializer)
    }
}

impl From<anyhow::Error> for Record {
    #[track_caller]
    fn from(err: anyhow::Error) -> Self {
        let location = Location::caller();
        match err.downcast::<Record>() {
            Ok(record) => record,
            Err(err) => {
                let mut record = Self::seeded(location);
                {
                    let inner: &(dyn StdError + 'static) = err.as_ref();
                    let class = classify::registry().classify_named(inner, Some("anyhow::Error"));
                    record.apply(String::new(), class, inner);
                }
                record.source = Some(BoxError::from(err));
                record
            }
        }
    }
}

/// Wraps an optional failure; absence stays absence
#[track_caller]
pub fn wrap<E>(err: Option<E>) -> Option<Record>
where
    E: StdError + Send + Sync + 'static,
{
    match err {
        Some(err) => Some(Record::wrap(err)),
        None => None,
    }
}

/// Converts the error side of a `Result` into a [`Record`]
pub trait ResultExt<T> {
    /// Wraps the error
    fn wrap_err(self) -> Result<T, Record>;

    /// Wraps the error and sets the operation that failed
    fn wrap_err_with_op(self, op: &str) -> Result<T, Record>;

    /// Wraps the error under a caller-supplied description
    fn describe_err<D: Into<String>>(self, description: D) -> Result<T, Record>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    #[track_caller]
    fn wrap_err(self) -> Result<T, Record> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(Record::wrap(err)),
        }
    }

    #[track_caller]
    fn wrap_err_with_op(self, op: &str) -> Result<T, Record> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(Record::wrap(err).op(op)),
        }
    }

    #[track_caller]
    fn describe_err<D: Into<String>>(self, description: D) -> Result<T, Record> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(Record::with_source(description, err)),
        }
    }
}
