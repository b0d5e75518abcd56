//! Source handles: owned UTF-8 buffers the evaluator walks over.

use std::fmt;
use std::path::Path;
use std::rc::Rc;

/// A line/column/byte-offset triple into a [`Source`]'s buffer.
///
/// Both `line` and `column` are 1-based; `byte_offset` is 0-based. The
/// default value, used at the start of a parse, is `{1, 1, 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
    pub byte_offset: usize,
}

impl Default for Location {
    fn default() -> Self {
        Location {
            line: 1,
            column: 1,
            byte_offset: 0,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An in-memory, owned UTF-8 buffer plus the metadata the evaluator and
/// error reporting need: an origin name and a recursion cap.
///
/// Unlike `examples/original_source`, there is no separate mmap'd-file
/// code path with its own fd/destructor bookkeeping — opening a file is
/// just `std::fs::read_to_string` followed by [`Source::from_string`].
/// `Source::close` from the C API has no Rust equivalent: the buffer is
/// freed when the `Source` (or its last `Rc` clone) is dropped.
pub struct Source {
    origin: String,
    buffer: String,
    max_recursion_depth: u32,
}

impl Source {
    /// Wrap an owned `String` as a source, with origin `"<string>"`.
    pub fn from_string(s: impl Into<String>) -> Rc<Source> {
        Rc::new(Source {
            origin: "<string>".to_string(),
            buffer: s.into(),
            max_recursion_depth: 0,
        })
    }

    /// Wrap a `&str` slice as a source (copies it), with origin `"<string>"`.
    ///
    /// Mirrors `cc_nstring_source`, which takes a counted (not
    /// NUL-terminated) slice rather than scanning for a terminator.
    pub fn from_str(s: &str) -> Rc<Source> {
        Self::from_string(s.to_string())
    }

    /// Read a file from disk and wrap its contents as a source, with
    /// origin set to `filename`.
    pub fn open(filename: impl AsRef<Path>) -> std::io::Result<Rc<Source>> {
        let path = filename.as_ref();
        let buffer = std::fs::read_to_string(path)?;
        Ok(Rc::new(Source {
            origin: path.display().to_string(),
            buffer,
            max_recursion_depth: 0,
        }))
    }

    /// Origin name used in error rendering: the filename, or `"<string>"`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn max_recursion_depth(&self) -> u32 {
        self.max_recursion_depth
    }

    /// Set the maximum recursion depth for parsers run against this source;
    /// `0` disables the check. Returns `self` so it can be chained onto a
    /// constructor the way `cc_max_recursion` chains onto `cc_open`.
    pub fn with_max_recursion(self: Rc<Self>, max: u32) -> Rc<Source> {
        match Rc::try_unwrap(self) {
            Ok(mut src) => {
                src.max_recursion_depth = max;
                Rc::new(src)
            }
            Err(shared) => Rc::new(Source {
                origin: shared.origin.clone(),
                buffer: shared.buffer.clone(),
                max_recursion_depth: max,
            }),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("origin", &self.origin)
            .field("buffer_len", &self.buffer.len())
            .field("max_recursion_depth", &self.max_recursion_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_location_is_one_one_zero() {
        assert_eq!(Location::default(), Location { line: 1, column: 1, byte_offset: 0 });
    }

    #[test]
    fn string_source_origin() {
        let src = Source::from_str("hello");
        assert_eq!(src.origin(), "<string>");
        assert_eq!(src.buffer(), "hello");
        assert_eq!(src.max_recursion_depth(), 0);
    }

    #[test]
    fn max_recursion_is_chainable() {
        let src = Source::from_str("x").with_max_recursion(64);
        assert_eq!(src.max_recursion_depth(), 64);
    }
}
