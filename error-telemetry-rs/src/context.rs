//! # Ambient Context
//!
//! Thread-scoped key/value state that every new [`Record`](crate::Record)
//! inherits. Frames are pushed for the duration of a closure and popped
//! afterwards, so context set for one request never leaks into the next.
//! Inner frames shadow outer ones key by key.

use std::cell::RefCell;

use serde::Serialize;

use crate::normalize::{normalize_key, stringify};
use crate::types::Fields;

/// Key under which the request correlation ID is kept
pub const CORRELATION_ID: &str = "correlation_id";

thread_local! {
    static FRAMES: RefCell<Vec<Fields>> = RefCell::new(Vec::new());
}

/// Something that can contribute fields to ambient context
pub trait Contextual {
    /// Copies this value's fields into `target` without clearing it
    fn fill(&self, target: &mut Fields);
}

impl Contextual for Fields {
    fn fill(&self, target: &mut Fields) {
        target.extend(self.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

impl Contextual for std::collections::HashMap<String, String> {
    fn fill(&self, target: &mut Fields) {
        target.extend(self.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Pops the frame it pushed, even if the scoped closure panics
struct FrameGuard;

impl FrameGuard {
    fn push(frame: Fields) -> Self {
        FRAMES.with(|frames| frames.borrow_mut().push(frame));
        FrameGuard
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}

/// Runs `f` with `fields` pushed as a new context frame
pub fn scope<F, R>(fields: Fields, f: F) -> R
where
    F: FnOnce() -> R,
{
    let frame = fields
        .into_iter()
        .map(|(k, v)| (normalize_key(&k), v))
        .collect();
    let _guard = FrameGuard::push(frame);
    f()
}

/// Runs `f` with the fields of `source` pushed as a new context frame
pub fn scope_with<C, F, R>(source: &C, f: F) -> R
where
    C: Contextual + ?Sized,
    F: FnOnce() -> R,
{
    let mut fields = Fields::new();
    source.fill(&mut fields);
    scope(fields, f)
}

/// Sets a key in the innermost frame, creating a frame if there is none.
///
/// A value set outside of any [`scope`] lives until [`clear`] is called.
pub fn set<V>(key: &str, value: V)
where
    V: Serialize,
{
    let Some(value) = stringify(&value) else {
        tracing::warn!(key = %key, "Dropping context value that cannot be serialized");
        return;
    };
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        if frames.is_empty() {
            frames.push(Fields::new());
        }
        if let Some(top) = frames.last_mut() {
            top.insert(normalize_key(key), value);
        }
    });
}

/// Drops every frame on the current thread
pub fn clear() {
    FRAMES.with(|frames| frames.borrow_mut().clear());
}

/// Merges all frames, innermost winning
pub fn capture() -> Fields {
    FRAMES.with(|frames| {
        let mut merged = Fields::new();
        for frame in frames.borrow().iter() {
            frame.fill(&mut merged);
        }
        merged
    })
}

/// Looks up a single ambient value
pub fn get(key: &str) -> Option<String> {
    let key = normalize_key(key);
    FRAMES.with(|frames| {
        frames
            .borrow()
            .iter()
            .rev()
            .find_map(|frame| frame.get(&key).cloned())
    })
}

/// Executes a function with a specific correlation ID
pub fn with_correlation_id<F, R, S>(correlation_id: S, f: F) -> R
where
    F: FnOnce() -> R,
    S: Into<String>,
{
    let mut frame = Fields::new();
    frame.insert(CORRELATION_ID.to_string(), correlation_id.into());
    scope(frame, f)
}

/// Retrieves the current correlation ID
pub fn current_correlation_id() -> Option<String> {
    get(CORRELATION_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_scope_restores() {
        assert!(capture().is_empty());
        let inside = scope(fields(&[("Request-ID", "abc")]), capture);
        assert_eq!(inside, fields(&[("request_id", "abc")]));
        assert!(capture().is_empty());
    }

    #[test]
    fn test_inner_frame_shadows() {
        scope(fields(&[("user", "outer"), ("tenant", "acme")]), || {
            scope(fields(&[("user", "inner")]), || {
                assert_eq!(capture(), fields(&[("tenant", "acme"), ("user", "inner")]));
                assert_eq!(get("USER").as_deref(), Some("inner"));
            });
            assert_eq!(get("user").as_deref(), Some("outer"));
        });
    }

    #[test]
    fn test_set_without_scope() {
        set("Retry Count", 3);
        assert_eq!(get("retry_count").as_deref(), Some("3"));
        clear();
        assert!(get("retry_count").is_none());
    }

    #[test]
    fn test_set_inside_scope_is_dropped_with_it() {
        scope(Fields::new(), || {
            set("phase", "handshake");
            assert_eq!(get("phase").as_deref(), Some("handshake"));
        });
        assert!(get("phase").is_none());
    }

    #[test]
    fn test_correlation_id() {
        assert!(current_correlation_id().is_none());

        let result = with_correlation_id("nested-id", || {
            assert_eq!(current_correlation_id(), Some("nested-id".to_string()));
            "test-result"
        });

        assert_eq!(result, "test-result");
        assert!(current_correlation_id().is_none());

        with_correlation_id("outer-id", || {
            with_correlation_id("inner-id", || {
                assert_eq!(current_correlation_id(), Some("inner-id".to_string()));
            });
            assert_eq!(current_correlation_id(), Some("outer-id".to_string()));
        });
    }

    #[test]
    fn test_frame_popped_on_panic() {
        let result = std::panic::catch_unwind(|| {
            scope(fields(&[("doomed", "yes")]), || panic!("boom"));
        });
        assert!(result.is_err());
        assert!(get("doomed").is_none());
    }
}
