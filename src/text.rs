//! UTF-8 decoding helpers and character-class predicates.
//!
//! The evaluator (`crate::eval`) only ever needs to look at *one* code point
//! at a byte offset, know how many bytes it occupies, and sometimes render
//! it for an error message. Everything else in the crate is built on top of
//! `char`, a Unicode scalar value, the same way `winnow`'s `stream` module
//! builds its primitives on top of `u8`/`char`.

/// Decode the first Unicode scalar value starting at byte offset `at` in
/// `buf`, returning the `char` and its encoded length in bytes.
///
/// `buf` is assumed to be valid UTF-8 (guaranteed by [`crate::source::Source`],
/// which is always built from a `&str` or a file read with
/// `std::fs::read_to_string`). Panics only if that invariant is violated,
/// which would itself indicate a bug in `Source` construction.
pub fn decode_at(buf: &str, at: usize) -> Option<(char, usize)> {
    let rest = buf.get(at..)?;
    let ch = rest.chars().next()?;
    Some((ch, ch.len_utf8()))
}

/// Render `ch` the way error messages want to see it: special names for
/// EOF/whitespace control characters, a quoted literal for anything else
/// printable, and a `<U+XXXX>` escape otherwise.
pub fn printable(ch: Option<char>) -> String {
    match ch {
        None => "<end of file>".to_string(),
        Some('\t') => "<tab>".to_string(),
        Some('\n') => "<newline>".to_string(),
        Some('\r') => "<carriage return>".to_string(),
        Some('\u{0B}') => "<vertical tab>".to_string(),
        Some(c) if is_printable(c) => format!("'{c}'"),
        Some(c) => format!("<U+{:04X}>", c as u32),
    }
}

/// Whether `c` should be rendered literally rather than as a `<U+XXXX>`
/// escape. Mirrors `isprint` for ASCII and treats any non-control Unicode
/// scalar value as printable, since this crate's input is full UTF-8 text
/// rather than the C source's Latin-1-limited `isprint`.
pub fn is_printable(c: char) -> bool {
    !c.is_control()
}

/// ASCII-or-Unicode whitespace, per the open question in `spec.md` §9:
/// this crate resolves it to `char::is_whitespace`, which already
/// implements the Unicode `White_Space` property and includes the ASCII
/// set (`\t\n\x0B\x0C\r `) the C source hard-codes.
pub fn is_whitespace(c: char) -> bool {
    c.is_whitespace()
}

/// "Blank" = horizontal whitespace only (space and tab), matching the C
/// source's `isblank`.
pub fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// ASCII decimal digit, per `spec.md`'s explicit `'0'..='9'` wording.
pub fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

pub fn is_hexdigit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

pub fn is_octdigit(c: char) -> bool {
    ('0'..='7').contains(&c)
}

/// Alphabetic, extended to full Unicode (see `SPEC_FULL.md` §9).
pub fn is_alpha(c: char) -> bool {
    c.is_alphabetic()
}

pub fn is_lower(c: char) -> bool {
    c.is_lowercase()
}

pub fn is_upper(c: char) -> bool {
    c.is_uppercase()
}

pub fn is_underscore(c: char) -> bool {
    c == '_'
}

pub fn is_alphanum(c: char) -> bool {
    is_alpha(c) || is_digit(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ascii_and_multibyte() {
        assert_eq!(decode_at("abc", 0), Some(('a', 1)));
        assert_eq!(decode_at("héllo", 1), Some(('é', 2)));
        assert_eq!(decode_at("", 0), None);
    }

    #[test]
    fn decode_past_end_is_none() {
        assert_eq!(decode_at("abc", 3), None);
        assert_eq!(decode_at("abc", 10), None);
    }

    #[test]
    fn printable_special_cases() {
        assert_eq!(printable(None), "<end of file>");
        assert_eq!(printable(Some('\t')), "<tab>");
        assert_eq!(printable(Some('\n')), "<newline>");
        assert_eq!(printable(Some('a')), "'a'");
        assert_eq!(printable(Some('\u{7}')), "<U+0007>");
    }

    #[test]
    fn classes() {
        assert!(is_whitespace(' '));
        assert!(is_whitespace('\u{A0}')); // Unicode NBSP
        assert!(is_digit('5'));
        assert!(!is_digit('a'));
        assert!(is_alpha('é'));
        assert!(is_alphanum('5'));
        assert!(is_underscore('_'));
    }
}
