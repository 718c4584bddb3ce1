//! quill: multi-language analysis front end
//!
//! Re-exports the workspace crates for convenience.

pub use quill_symbols as symbols;
