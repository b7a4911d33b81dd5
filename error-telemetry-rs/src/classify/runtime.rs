//! Runtime stage: dynamic type and borrow failures.

use std::array::TryFromSliceError;
use std::cell::{BorrowError, BorrowMutError};
use std::error::Error as StdError;

use super::{Classification, Classifier, Stage};
use crate::kinds::runtime::TypeAssertionError;

pub(super) fn register(classifier: &mut Classifier) {
    classifier.push(
        Stage::Runtime,
        Box::new(|err: &(dyn StdError + 'static), _: &Classifier| {
            runtime_tag(err).map(|tag| Classification::new(tag, err.to_string()))
        }),
    );
}

fn runtime_tag(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    if err.is::<TypeAssertionError>() {
        Some("runtime.TypeAssertionError")
    } else if err.is::<BorrowError>() {
        Some("cell.BorrowError")
    } else if err.is::<BorrowMutError>() {
        Some("cell.BorrowMutError")
    } else if err.is::<TryFromSliceError>() {
        Some("array.TryFromSliceError")
    } else {
        None
    }
}
