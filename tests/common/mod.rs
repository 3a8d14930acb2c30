#![allow(unused_imports)]
//! Shared test utilities for integration tests.
//!
//! # Modules
//!
//! - `assertions`: assertion helpers with descriptive failure messages

pub mod assertions;

use sandbox_core::{Namespace, Value};

pub use assertions::{assert_err, assert_error_contains, assert_error_kind, assert_ok};

/// Build a plain namespace from `(name, value)` pairs.
#[allow(dead_code)]
pub fn namespace<const N: usize>(pairs: [(&str, Value); N]) -> Namespace {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
