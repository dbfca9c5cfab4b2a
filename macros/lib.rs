//! Re-exports the proc-macros used to declare and register solver options.
//!
//! Kept as its own crate (rather than folding `options` directly into the
//! main crate) so the proc-macro crate-type restriction doesn't force the
//! whole library to be `proc-macro = true`.

pub use options::{build_option_enum, build_options, explicit_options, use_option};
