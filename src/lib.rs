//! Purpose: Typed record collections stored as escaped, tab-separated text files.
//! Exports: `api` (record schemas, converters, table reader/writer, errors).
//! Role: Library backing the `tsvrec` CLI and any caller that persists records.
//! Invariants: `api` is the only public path; `core` stays private.
//! Invariants: The library reports failures as `Error` values and never logs them.
mod macros;

pub mod api;
mod core;
