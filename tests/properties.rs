//! Property-based tests over the invariants the evaluator is expected to
//! hold for any grammar, not just the worked examples in `scenarios.rs`.

use proptest::prelude::*;

use pcomb::node;
use pcomb::source::Source;
use pcomb::value::downcast;
use pcomb::{folds, parse, Location};

fn succeeds_as_string(input: &str, parser: node::Parser) -> Option<String> {
    let src = Source::from_str(input);
    match parse(&src, parser) {
        Ok(Some(v)) => Some(downcast::<String>(&v).expect("result is a string").clone()),
        Ok(None) => Some(String::new()),
        Err(_) => None,
    }
}

proptest! {
    /// `retain`/`release` are symmetric: retaining and then releasing a
    /// handle leaves the strong count exactly where it started.
    #[test]
    fn retain_release_is_symmetric(n in 0u8..5) {
        let p = node::char('x');
        let before = p.strong_count();
        let mut handles = Vec::new();
        for _ in 0..n {
            handles.push(node::retain(&p));
        }
        prop_assert_eq!(p.strong_count(), before + n as usize);
        for h in handles {
            node::release(h);
        }
        prop_assert_eq!(p.strong_count(), before);
    }

    /// `or` with a single child behaves exactly like that child, on any
    /// single ASCII letter input.
    #[test]
    fn single_child_or_matches_the_child(head in "[a-z]", rest in "[a-z]{0,4}") {
        let c = head.chars().next().unwrap();
        let input = format!("{head}{rest}");
        let direct = succeeds_as_string(&input, node::char(c));
        let wrapped = succeeds_as_string(&input, node::or([node::char(c)]));
        prop_assert_eq!(direct, wrapped);
    }

    /// `maybe(pass())` always succeeds and never consumes a byte: matching
    /// it against the start of any string, followed by a literal match of
    /// the whole string, still consumes the string exactly once.
    #[test]
    fn maybe_pass_consumes_nothing(s in "[a-z]{0,12}") {
        let parser = node::and(
            Some(folds::concat()),
            [node::maybe(node::pass()), node::string(s.clone())],
        );
        let result = succeeds_as_string(&s, parser);
        prop_assert_eq!(result, Some(s));
    }

    /// `not(not(p))` succeeds exactly when `p` would, and consumes
    /// nothing: a zero-width lookahead for `char('a')` followed by a
    /// literal match of the whole string only ever succeeds when the
    /// string starts with 'a', and when it does, the whole string is
    /// still there to match.
    #[test]
    fn double_not_is_a_zero_width_lookahead(s in "[a-z]{1,12}") {
        let lookahead = node::not(node::not(node::char('a')));
        let parser = node::and(Some(folds::last()), [lookahead, node::string(s.clone())]);
        let result = succeeds_as_string(&s, parser);
        if s.starts_with('a') {
            prop_assert_eq!(result, Some(s));
        } else {
            prop_assert_eq!(result, None);
        }
    }

    /// `many(p)` is greedy: immediately following it with another `p`
    /// always fails, since `many` has already consumed every match it
    /// could.
    #[test]
    fn many_then_same_parser_always_fails(n in 0usize..20) {
        let s = "a".repeat(n);
        let parser = node::and(None, [node::many(None, node::char('a')), node::char('a')]);
        let src = Source::from_str(&s);
        prop_assert!(parse(&src, parser).is_err());
    }

    /// Inside a `noreturn` subtree, every match produces no value.
    #[test]
    fn noreturn_suppresses_every_result(c in "[a-z]") {
        let ch = c.chars().next().unwrap();
        let src = Source::from_str(&c);
        let parser = node::noreturn(node::char(ch));
        prop_assert!(matches!(parse(&src, parser), Ok(None)));
    }

    /// `count(n, ...)` always collects exactly `n` values, whatever `n` is.
    #[test]
    fn count_collects_exactly_n_values(n in 0usize..20) {
        let s = "1".repeat(n);
        let counting: node::Fold = std::rc::Rc::new(|values: Vec<pcomb::Value>| {
            Some(pcomb::value::boxed(values.len()))
        });
        let parser = node::count(n, Some(counting), node::digit());
        let src = Source::from_str(&s);
        let result = parse(&src, parser).expect("should succeed");
        let count = result.map(|v| *downcast::<usize>(&v).unwrap());
        prop_assert_eq!(count, Some(n));
    }

    /// Byte consumption after a successful literal match equals the sum of
    /// UTF-8 encoded lengths of its characters, and the line count equals
    /// one plus the number of newlines consumed.
    #[test]
    fn location_tracks_bytes_and_lines(lines in 0usize..6, tail in "[a-z]{0,6}") {
        let s = format!("{}{}", "x\n".repeat(lines), tail);
        let parser = node::and(
            Some(folds::last()),
            [node::string(s.clone()), node::location()],
        );
        let src = Source::from_str(&s);
        let result = parse(&src, parser).expect("should succeed").expect("has a value");
        let loc = downcast::<Location>(&result).expect("result is a Location");
        prop_assert_eq!(loc.byte_offset, s.len());
        prop_assert_eq!(loc.line as usize, 1 + lines);
    }
}

/// The expected-label list on one [`pcomb::ErrorReport`] never grows past
/// its fixed capacity, however many `expect`-wrapped alternatives all fail
/// at the same position.
#[test]
fn expected_list_stays_bounded_under_many_alternatives() {
    let alternatives: Vec<node::Parser> = (0..30)
        .map(|i| node::expect(node::char('\0'), format!("alt{i}")))
        .collect();
    let parser = node::or(alternatives);
    let src = Source::from_str("z");
    match parse(&src, parser) {
        Err(pcomb::ParseError::Failure(report)) => {
            assert!(report.expected().len() <= pcomb::error::MAX_EXPECTED);
        }
        other => panic!("expected a reported failure, got {other:?}"),
    }
}
