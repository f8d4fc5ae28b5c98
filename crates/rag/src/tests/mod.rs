//! Pipeline-level tests.

mod support;
