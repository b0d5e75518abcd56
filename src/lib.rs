//! A small, reference-counted parser-combinator core.
//!
//! A grammar is a tree of [`Parser`] handles built from the constructors in
//! [`node`] (`char`, `string`, `and`, `or`, `many`, `fix`, ...) and run
//! against a [`Source`] with [`parse`]. See each module for the part of the
//! design it owns:
//!
//! - [`node`] — the closed set of parser kinds and their constructors.
//! - [`eval`] — the recursive-descent evaluator that walks a tree.
//! - [`source`] — owned UTF-8 input buffers and [`Location`]s.
//! - [`error`] — accumulated, renderable parse failures.
//! - [`value`] — the opaque result type threaded through folds/applies.
//! - [`text`] — UTF-8 decoding and character-class predicates.
//! - [`folds`] — a handful of convenience fold/apply callbacks.
//! - [`trace`] — optional execution tracing, gated behind the `debug` feature.
//!
//! ```
//! use pcomb::node::{and, char, string};
//! use pcomb::folds::concat;
//! use pcomb::source::Source;
//!
//! let greeting = and(Some(concat()), [string("hello, "), string("world")]);
//! let src = Source::from_str("hello, world");
//! let result = pcomb::parse(&src, greeting).unwrap();
//! assert_eq!(
//!     pcomb::value::downcast::<String>(&result.unwrap()).unwrap(),
//!     "hello, world"
//! );
//! ```

pub mod error;
pub mod eval;
pub mod folds;
pub mod node;
pub mod source;
pub mod text;
pub mod trace;
pub mod value;

pub use error::ErrorReport;
pub use eval::{parse, InternalError, ParseError};
pub use node::{ConstructError, Parser};
pub use source::{Location, Source};
pub use value::Value;

/// The crate's semver version, as the string from `Cargo.toml`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// The major version component.
pub fn version_major() -> u32 {
    env!("CARGO_PKG_VERSION_MAJOR")
        .parse()
        .expect("CARGO_PKG_VERSION_MAJOR is always a valid integer")
}

/// The minor version component.
pub fn version_minor() -> u32 {
    env!("CARGO_PKG_VERSION_MINOR")
        .parse()
        .expect("CARGO_PKG_VERSION_MINOR is always a valid integer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_functions_agree_with_cargo_toml() {
        assert_eq!(version(), "0.1.0");
        assert_eq!(version_major(), 0);
        assert_eq!(version_minor(), 1);
    }
}
