#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared test helpers used across the core and HTTP suites.
//! Layout: fixtures.rs (served root directories and deterministic payloads).

pub mod fixtures;

pub use fixtures::{ServedRoot, patterned_bytes};
