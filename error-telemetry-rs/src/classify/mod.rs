//! # Failure Classification
//!
//! Turns an arbitrary failure into an operation name, a type tag, a
//! description and a set of extra fields.
//!
//! A [`Classifier`] is an ordered list of rules. Every rule belongs to a
//! [`Stage`]; stages run in declaration order and the first rule that
//! recognizes the failure wins. Failures no rule recognizes are tagged with
//! their own type name. Classification never fails.

mod network;
mod runtime;
pub mod sentinel;
mod structural;

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;

use once_cell::sync::OnceCell;

use crate::types::{Fields, Result, TelemetryError};

pub use sentinel::Sentinel;

/// Tag used when the concrete type of a failure cannot be known
pub const DYN_TYPE_TAG: &str = "dyn.Error";

/// Default cap on captured process stderr, in bytes
pub const DEFAULT_STDERR_LIMIT: usize = 4096;

/// Outcome of classifying a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Operation that failed, when the failure carries one
    pub op: Option<String>,
    /// Dotted `namespace.Identifier` tag
    pub type_tag: String,
    pub description: String,
    /// Extra fields; keys are already normalized
    pub extra: Fields,
}

impl Classification {
    pub fn new(type_tag: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            op: None,
            type_tag: type_tag.into(),
            description: description.into(),
            extra: Fields::new(),
        }
    }

    /// Sets the operation
    pub fn op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Adds an extra field under the normalized form of `key`
    pub fn extra(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra.insert(crate::normalize_key(key), value.into());
        self
    }
}

/// Classification stages, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Network failures, including operation wrappers
    Network,
    /// Runtime type and borrow failures
    Runtime,
    /// Failures recognized by their concrete type
    Structural,
    /// Payload-less failures recognized by identity
    Sentinel,
}

type Matcher =
    Box<dyn Fn(&(dyn StdError + 'static), &Classifier) -> Option<Classification> + Send + Sync>;

struct Rule {
    stage: Stage,
    matcher: Matcher,
}

/// Ordered rule registry
pub struct Classifier {
    rules: Vec<Rule>,
    stderr_limit: usize,
}

impl Classifier {
    /// A classifier with no rules; everything hits the default fallback
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            stderr_limit: DEFAULT_STDERR_LIMIT,
        }
    }

    /// A classifier with every built-in rule registered
    pub fn builtin() -> Self {
        let mut classifier = Self::empty();
        network::register(&mut classifier);
        runtime::register(&mut classifier);
        structural::register(&mut classifier);
        sentinel::register(&mut classifier);
        classifier
    }

    /// Caps the captured stderr of failed processes at `limit` bytes
    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit;
        self
    }

    pub fn stderr_limit(&self) -> usize {
        self.stderr_limit
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registers a rule for failures of type `E`.
    ///
    /// The rule runs after every rule already registered for `stage` and
    /// before the rules of later stages.
    pub fn register<E, F>(&mut self, stage: Stage, extract: F) -> &mut Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> Classification + Send + Sync + 'static,
    {
        self.rule::<E, _>(stage, move |err, _| Some(extract(err)))
    }

    /// Registers a rule that inspects the failure itself and returns `None`
    /// when it does not apply.
    pub fn register_with<F>(&mut self, stage: Stage, matcher: F) -> &mut Self
    where
        F: Fn(&(dyn StdError + 'static)) -> Option<Classification> + Send + Sync + 'static,
    {
        self.push(
            stage,
            Box::new(move |err: &(dyn StdError + 'static), _: &Classifier| matcher(err)),
        )
    }

    pub(crate) fn rule<E, F>(&mut self, stage: Stage, matcher: F) -> &mut Self
    where
        E: StdError + 'static,
        F: Fn(&E, &Classifier) -> Option<Classification> + Send + Sync + 'static,
    {
        self.push(
            stage,
            Box::new(move |err: &(dyn StdError + 'static), classifier: &Classifier| {
                err.downcast_ref::<E>()
                    .and_then(|err| matcher(err, classifier))
            }),
        )
    }

    pub(crate) fn push(&mut self, stage: Stage, matcher: Matcher) -> &mut Self {
        let at = self
            .rules
            .iter()
            .position(|rule| rule.stage > stage)
            .unwrap_or(self.rules.len());
        self.rules.insert(at, Rule { stage, matcher });
        self
    }

    /// Classifies a failure whose concrete type is known
    pub fn classify<E>(&self, err: &E) -> Classification
    where
        E: StdError + 'static,
    {
        self.classify_named(err, Some(type_name::<E>()))
    }

    /// Classifies a type-erased failure
    pub fn classify_dyn(&self, err: &(dyn StdError + 'static)) -> Classification {
        self.classify_named(err, None)
    }

    pub(crate) fn classify_named(
        &self,
        err: &(dyn StdError + 'static),
        type_name: Option<&str>,
    ) -> Classification {
        let mut class = self
            .match_rules(err)
            .unwrap_or_else(|| fallback(err, type_name));
        // rules that copy an inner message can come up empty
        if class.description.is_empty() {
            class.description = err.to_string();
        }
        class
    }

    /// Runs the rules only, without the default fallback
    pub(crate) fn match_rules(&self, err: &(dyn StdError + 'static)) -> Option<Classification> {
        self.rules
            .iter()
            .find_map(|rule| (rule.matcher)(err, self))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("rules", &self.rules.len())
            .field("stderr_limit", &self.stderr_limit)
            .finish()
    }
}

/// Default classification: own type name, own message, no extra fields
pub fn fallback(err: &(dyn StdError + 'static), type_name: Option<&str>) -> Classification {
    let tag = type_name.map_or_else(|| DYN_TYPE_TAG.to_string(), type_tag);
    Classification::new(tag, err.to_string())
}

/// Converts a Rust type path into a dotted tag.
///
/// Generic arguments are dropped: `my_app::db::QueryError<u8>` becomes
/// `my_app.db.QueryError`.
pub fn type_tag(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.split("::").collect::<Vec<_>>().join(".")
}

static REGISTRY: OnceCell<Classifier> = OnceCell::new();

/// Installs the process-wide classifier.
///
/// Must happen before the first classification; afterwards the registry is
/// fixed and this returns [`TelemetryError::ClassifierInstalled`].
pub fn install(classifier: Classifier) -> Result<()> {
    REGISTRY
        .set(classifier)
        .map_err(|_| TelemetryError::ClassifierInstalled)
}

/// The process-wide classifier, the built-in one unless another was installed
pub fn registry() -> &'static Classifier {
    REGISTRY.get_or_init(Classifier::builtin)
}

/// Classifies with the process-wide classifier
pub fn classify<E>(err: &E) -> Classification
where
    E: StdError + 'static,
{
    registry().classify(err)
}

/// Classifies a type-erased failure with the process-wide classifier
pub fn classify_dyn(err: &(dyn StdError + 'static)) -> Classification {
    registry().classify_dyn(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded for {tenant}")]
    struct QuotaError {
        tenant: String,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("wrapped")]
    struct Generic<T: fmt::Debug>(T);

    #[test]
    fn test_type_tag() {
        assert_eq!(type_tag("my_app::db::QueryError"), "my_app.db.QueryError");
        assert_eq!(type_tag("my_app::Wrapper<alloc::string::String>"), "my_app.Wrapper");
        assert_eq!(type_tag("Plain"), "Plain");
    }

    #[test]
    fn test_default_fallback() {
        let err = QuotaError {
            tenant: "acme".into(),
        };
        let class = Classifier::builtin().classify(&err);
        assert!(class.type_tag.ends_with("classify.tests.QuotaError"));
        assert!(class.type_tag.starts_with("error_telemetry."));
        assert_eq!(class.description, "quota exceeded for acme");
        assert_eq!(class.op, None);
        assert!(class.extra.is_empty());
    }

    #[test]
    fn test_fallback_strips_generics() {
        let class = Classifier::empty().classify(&Generic(3u8));
        assert!(class.type_tag.ends_with("tests.Generic"));
    }

    #[test]
    fn test_dyn_fallback() {
        let err: Box<dyn StdError + Send + Sync> = Box::new(QuotaError {
            tenant: "acme".into(),
        });
        let class = Classifier::builtin().classify_dyn(err.as_ref());
        assert_eq!(class.type_tag, DYN_TYPE_TAG);
        assert_eq!(class.description, "quota exceeded for acme");
    }

    #[test]
    fn test_register_custom_rule() {
        let mut classifier = Classifier::builtin();
        let before = classifier.len();
        classifier.register::<QuotaError, _>(Stage::Structural, |err| {
            Classification::new("billing.QuotaError", err.to_string()).extra("tenant", &err.tenant)
        });
        assert_eq!(classifier.len(), before + 1);

        let class = classifier.classify(&QuotaError {
            tenant: "acme".into(),
        });
        assert_eq!(class.type_tag, "billing.QuotaError");
        assert_eq!(class.extra.get("tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_stage_order_beats_registration_order() {
        let mut classifier = Classifier::empty();
        classifier.register::<QuotaError, _>(Stage::Sentinel, |_| Classification::new("late", ""));
        classifier.register::<QuotaError, _>(Stage::Network, |_| Classification::new("early", ""));
        let class = classifier.classify(&QuotaError {
            tenant: "acme".into(),
        });
        assert_eq!(class.type_tag, "early");
    }

    #[test]
    fn test_extra_keys_are_normalized() {
        let mut classifier = Classifier::empty();
        classifier.register::<QuotaError, _>(Stage::Structural, |err| {
            Classification::new("billing.QuotaError", err.to_string()).extra("Tenant-ID", &err.tenant)
        });
        let class = classifier.classify(&QuotaError {
            tenant: "acme".into(),
        });
        assert_eq!(class.extra.get("tenant_id").map(String::as_str), Some("acme"));
        assert!(!class.extra.contains_key("Tenant-ID"));
    }

    #[test]
    fn test_empty_rule_description_falls_back_to_message() {
        use crate::kinds::fs::PathError;
        use crate::kinds::net::{AddrError, UrlError};
        use std::io;

        let addr = AddrError {
            err: String::new(),
            addr: "x:1".into(),
        };
        let class = Classifier::builtin().classify(&addr);
        assert_eq!(class.type_tag, "net.AddrError");
        assert_eq!(class.description, addr.to_string());

        let path = PathError::new("open", "/p", io::Error::new(io::ErrorKind::Other, ""));
        assert_eq!(Classifier::builtin().classify(&path).description, path.to_string());

        let url = UrlError::new("GET", "http://h", io::Error::new(io::ErrorKind::Other, ""));
        assert_eq!(Classifier::builtin().classify(&url).description, url.to_string());

        let mut classifier = Classifier::empty();
        classifier.register::<QuotaError, _>(Stage::Structural, |_| {
            Classification::new("billing.QuotaError", "")
        });
        let class = classifier.classify(&QuotaError {
            tenant: "acme".into(),
        });
        assert_eq!(class.description, "quota exceeded for acme");
    }

    #[test]
    fn test_register_with_can_decline() {
        let mut classifier = Classifier::empty();
        classifier.register_with(Stage::Structural, |err| {
            err.to_string()
                .contains("beta")
                .then(|| Classification::new("tenant.Beta", err.to_string()))
        });
        let alpha = classifier.classify(&QuotaError {
            tenant: "alpha".into(),
        });
        let beta = classifier.classify(&QuotaError {
            tenant: "beta".into(),
        });
        assert!(alpha.type_tag.ends_with("QuotaError"));
        assert_eq!(beta.type_tag, "tenant.Beta");
    }
}
