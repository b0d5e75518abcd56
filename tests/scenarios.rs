//! End-to-end worked examples.
//!
//! Each test below mirrors one of the six scenarios that exercise the
//! evaluator's contract end to end: a literal repeat count, a
//! string-building grammar built from alternation/repetition, a small
//! recursive-descent arithmetic evaluator built with `fix` and `chain`,
//! two flavors of reported failure, and a recursion-depth cutoff.

use std::rc::Rc;

use pcomb::node::{self, Fold};
use pcomb::source::Source;
use pcomb::value::{self, downcast};
use pcomb::{folds, parse, ParseError};

#[test]
fn repeats_a_fixed_count_with_no_fold_produces_no_result() {
    let src = Source::from_str("hellohellohello");
    let parser = node::count(3, None, node::string("hello"));
    let result = parse(&src, parser).expect("should succeed");
    assert!(result.is_none());
}

#[test]
fn and_with_concat_fold_builds_an_identifier_with_trailing_bang() {
    let src = Source::from_str("uint64_t!");
    let head = node::or([node::alpha(), node::underscore()]);
    let tail = node::many(
        Some(folds::concat()),
        node::or([node::alpha(), node::digit(), node::underscore()]),
    );
    let bang = node::maybe(node::char('!'));
    let parser = node::and(Some(folds::concat()), [head, tail, bang, node::eof()]);

    let result = parse(&src, parser).expect("should succeed").expect("has a value");
    assert_eq!(downcast::<String>(&result).unwrap(), "uint64_t!");
}

fn arith_fold() -> Fold {
    Rc::new(|values| {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let mut acc = *downcast::<i64>(&first).expect("term is an integer");
        while let (Some(op), Some(term)) = (iter.next(), iter.next()) {
            let opstr = downcast::<String>(&op).expect("operator is a string").clone();
            let t = *downcast::<i64>(&term).expect("term is an integer");
            acc = match opstr.as_str() {
                "+" => acc + t,
                "-" => acc - t,
                "*" => acc * t,
                "/" => acc / t,
                other => panic!("unexpected operator {other}"),
            };
        }
        Some(value::boxed(acc))
    })
}

fn build_arithmetic_grammar() -> node::Parser {
    node::fix(|expr_self| {
        let atom = node::fix(|atom_self| {
            let negate = node::apply(
                node::and(Some(folds::last()), [node::char('-'), node::retain(&atom_self)]),
                |v| {
                    let n = *downcast::<i64>(&v).expect("negate operand is an integer");
                    value::boxed(-n)
                },
            );
            let number = node::apply(
                node::least(1, Some(folds::concat()), node::digit()),
                |v| {
                    let digits = downcast::<String>(&v).expect("number operand is a string");
                    value::boxed(digits.parse::<i64>().expect("digits parse as an integer"))
                },
            );
            let parens = node::and(
                Some(folds::middle()),
                [node::char('('), node::retain(&expr_self), node::char(')')],
            );
            node::or([negate, number, parens])
        });

        let mul_div = node::chain(Some(arith_fold()), atom, node::or([node::char('*'), node::char('/')]));
        node::chain(Some(arith_fold()), mul_div, node::or([node::char('+'), node::char('-')]))
    })
}

#[test]
fn recursive_arithmetic_grammar_evaluates_with_precedence() {
    let src = Source::from_str("2+2*(16/4-2)");
    let parser = build_arithmetic_grammar();
    let result = parse(&src, parser).expect("should succeed").expect("has a value");
    // 16/4-2 = 2, 2*2 = 4, 2+4 = 6.
    assert_eq!(*downcast::<i64>(&result).unwrap(), 6);
}

#[test]
fn expect_reports_its_label_on_failure() {
    let src = Source::from_str("abc");
    let parser = node::expect(node::string("xyz"), "identifier");
    match parse(&src, parser) {
        Err(ParseError::Failure(report)) => {
            assert_eq!(report.expected().len(), 1);
            assert_eq!(report.expected()[0], "identifier");
            assert_eq!(report.received(), Some('a'));
            assert_eq!(report.location().to_string(), "1:1");
        }
        other => panic!("expected a reported failure, got {other:?}"),
    }
}

#[test]
fn expect_reports_end_of_file_when_input_is_empty() {
    let src = Source::from_str("");
    let parser = node::expect(node::char('a'), "letter a");
    match parse(&src, parser) {
        Err(ParseError::Failure(report)) => {
            assert_eq!(report.received(), None);
            assert!(report.to_string().ends_with("at <end of file>\n"));
        }
        other => panic!("expected a reported failure, got {other:?}"),
    }
}

#[test]
fn deep_right_recursion_fails_once_max_recursion_is_exceeded() {
    // A right-recursive `fix(self -> ('a' self) | pass)` consumes one
    // character per recursive descent, so a long enough run of 'a's drives
    // the evaluator's call depth past any configured ceiling.
    let input = "a".repeat(500);
    let src = Source::from_string(input).with_max_recursion(50);

    let parser = node::fix(|self_| {
        node::or([
            node::and(None, [node::char('a'), node::retain(&self_)]),
            node::pass(),
        ])
    });

    match parse(&src, parser) {
        Err(ParseError::Failure(report)) => {
            let msg = report.failure_message().expect("a custom failure message");
            assert!(msg.contains("maximum recursion depth of 50 reached"), "message was: {msg}");
        }
        other => panic!("expected a recursion-depth failure, got {other:?}"),
    }
}
