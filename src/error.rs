//! Error accumulation and rendering.
//!
//! A parse failure surfaces as an [`ErrorReport`]: either a single custom
//! `failure` message (from [`crate::node::fail`]/[`crate::node::failf`]) or
//! a bounded list of "expected X" labels gathered from
//! [`crate::node::expect`] wrappers at the furthest-reached location —
//! never both (`spec.md` §3: "if `failure` is set, `expected` is ignored
//! during rendering").

use std::fmt;

use crate::source::Location;

/// Bound on the number of "expected" labels collected for one error
/// report, matching `CC_ERR_MAX_EXPECTED` in `examples/original_source`.
pub const MAX_EXPECTED: usize = 16;

/// A parse error: source location, the code point actually found there,
/// and either a custom failure message or a bounded expected-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub(crate) origin: Option<String>,
    pub(crate) location: Location,
    pub(crate) received: Option<char>,
    pub(crate) failure: Option<String>,
    pub(crate) expected: Vec<String>,
}

impl ErrorReport {
    pub(crate) fn blank() -> Self {
        ErrorReport {
            origin: None,
            location: Location::default(),
            received: None,
            failure: None,
            expected: Vec::new(),
        }
    }

    pub(crate) fn set_failure(&mut self, origin: &str, location: Location, received: Option<char>, msg: String) {
        self.origin = Some(origin.to_string());
        self.location = location;
        self.received = received;
        self.failure = Some(msg);
        self.expected.clear();
    }

    /// Append `label` to the expected-list if there's still room and no
    /// `failure` has been recorded instead. Captures `origin`/`location`/
    /// `received` lazily, only on the first append at a given failure —
    /// matching `spec.md` §4.9's "subsequent appends ... leave those
    /// unchanged".
    ///
    /// The `failure.is_some()` half of the guard has no counterpart in
    /// `cc_eval.c`'s `cc_err_expect`, which only checks `NOERR`/capacity.
    /// One `ErrorReport` is shared across an entire parse (e.g. every
    /// branch of an `or`), so a `fail`/depth-limit node in one branch can
    /// latch `failure` before a later sibling branch's `expect` wrapper
    /// calls this; without the extra check that sibling would still push
    /// into `expected`, a list `Display` already ignores but that would
    /// sit there inconsistent with the latched failure.
    pub(crate) fn add_expected(&mut self, origin: &str, location: Location, received: Option<char>, label: &str) {
        if self.failure.is_some() || self.expected.len() >= MAX_EXPECTED {
            return;
        }
        if self.expected.is_empty() {
            self.origin = Some(origin.to_string());
            self.location = location;
            self.received = received;
        }
        self.expected.push(label.to_string());
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn received(&self) -> Option<char> {
        self.received
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn expected(&self) -> &[String] {
        &self.expected
    }
}

impl fmt::Display for ErrorReport {
    /// Renders exactly the format in `spec.md` §6:
    /// - with a custom failure: `[origin: ]error: <failure>`
    /// - otherwise: `[origin:]LINE:COL: error: expected <list> at <received>`
    ///   where `<list>` is nothing / a single item / an Oxford-comma list
    ///   ending in `"... or z"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(failure) = &self.failure {
            if let Some(origin) = &self.origin {
                write!(f, "{origin}: ")?;
            }
            return writeln!(f, "error: {failure}");
        }

        if let Some(origin) = &self.origin {
            write!(f, "{origin}:")?;
        }
        write!(f, "{}: error: expected ", self.location)?;

        match self.expected.len() {
            0 => write!(f, "nothing")?,
            1 => write!(f, "{}", self.expected[0])?,
            n => {
                for item in &self.expected[..n - 2] {
                    write!(f, "{item}, ")?;
                }
                write!(f, "{} or {}", self.expected[n - 2], self.expected[n - 1])?;
            }
        }

        write!(f, " at {}", crate::text::printable(self.received))?;
        writeln!(f)
    }
}

impl std::error::Error for ErrorReport {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_failure() {
        let mut e = ErrorReport::blank();
        e.set_failure("<string>", Location::default(), Some('a'), "bad thing".to_string());
        assert_eq!(e.to_string(), "<string>: error: bad thing\n");
    }

    #[test]
    fn renders_single_expected() {
        let mut e = ErrorReport::blank();
        e.add_expected("<string>", Location::default(), Some('a'), "identifier");
        assert_eq!(e.to_string(), "<string>:1:1: error: expected identifier at 'a'\n");
    }

    #[test]
    fn renders_list_with_or() {
        let mut e = ErrorReport::blank();
        e.add_expected("f", Location::default(), Some('z'), "a");
        e.add_expected("f", Location::default(), Some('z'), "b");
        e.add_expected("f", Location::default(), Some('z'), "c");
        assert_eq!(e.to_string(), "f:1:1: error: expected a, b or c at 'z'\n");
    }

    #[test]
    fn renders_eof_received() {
        let mut e = ErrorReport::blank();
        e.add_expected("f", Location::default(), None, "letter a");
        assert_eq!(e.to_string(), "f:1:1: error: expected letter a at <end of file>\n");
    }

    #[test]
    fn expected_list_is_bounded() {
        let mut e = ErrorReport::blank();
        for i in 0..20 {
            e.add_expected("f", Location::default(), Some('x'), &format!("item{i}"));
        }
        assert_eq!(e.expected().len(), MAX_EXPECTED);
        assert_eq!(e.expected()[0], "item0");
        assert_eq!(e.expected()[15], "item15");
    }

    #[test]
    fn first_append_captures_location_later_ones_dont() {
        let mut e = ErrorReport::blank();
        let loc1 = Location { line: 1, column: 1, byte_offset: 0 };
        let loc2 = Location { line: 2, column: 5, byte_offset: 10 };
        e.add_expected("f", loc1, Some('a'), "x");
        e.add_expected("f", loc2, Some('b'), "y");
        assert_eq!(e.location(), loc1);
        assert_eq!(e.received(), Some('a'));
    }

    #[test]
    fn failure_suppresses_expected_rendering() {
        let mut e = ErrorReport::blank();
        e.add_expected("f", Location::default(), Some('a'), "x");
        e.set_failure("f", Location::default(), Some('a'), "custom".to_string());
        assert_eq!(e.to_string(), "f: error: custom\n");
    }
}
