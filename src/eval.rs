//! The recursive-descent evaluator.
//!
//! Walks a [`Parser`] tree against a [`Source`], tracking the current
//! [`Location`], a small set of mode flags (`EOF`, `NOERROR`, `NORETURN`),
//! and a dynamic scope stack of active [`crate::node::bind`] nodes. See
//! `spec.md` §4 for the full combinator-by-combinator contract this module
//! implements.

use std::fmt;
use std::rc::Rc;

use crate::error::ErrorReport;
use crate::node::{Fold, Kind, Parser};
use crate::source::{Location, Source};
use crate::text;
use crate::trace;
use crate::value::{unit, Value};

#[derive(Clone, Copy, Default)]
struct Flags {
    eof: bool,
    noerror: bool,
    noreturn: bool,
}

struct State<'s> {
    source: &'s Source,
    location: Location,
    flags: Flags,
    scope: Vec<(Rc<str>, Parser)>,
}

#[derive(Clone, Copy)]
struct Save {
    location: Location,
    flags: Flags,
    scope_len: usize,
}

impl<'s> State<'s> {
    fn new(source: &'s Source) -> Self {
        State {
            source,
            location: Location::default(),
            flags: Flags::default(),
            scope: Vec::new(),
        }
    }

    fn save(&self) -> Save {
        Save {
            location: self.location,
            flags: self.flags,
            scope_len: self.scope.len(),
        }
    }

    fn restore(&mut self, save: Save) {
        debug_assert!(self.scope.len() >= save.scope_len);
        self.location = save.location;
        self.flags = save.flags;
        self.scope.truncate(save.scope_len);
    }

    /// Peek the code point at the current offset without consuming it.
    /// Sets the `EOF` flag as a side effect when the buffer is exhausted,
    /// matching `peek_at` in `examples/original_source/cc_eval.c`.
    fn peek(&mut self) -> Option<char> {
        match text::decode_at(self.source.buffer(), self.location.byte_offset) {
            Some((c, _)) => Some(c),
            None => {
                self.flags.eof = true;
                None
            }
        }
    }

    /// Advance past `ch`, updating line/column/byte offset.
    fn advance(&mut self, ch: char) {
        self.location.byte_offset += ch.len_utf8();
        if ch == '\n' {
            self.location.line += 1;
            self.location.column = 1;
        } else {
            self.location.column += 1;
        }
    }

    fn set_noerror(&mut self, value: bool) -> bool {
        let before = self.flags.noerror;
        self.flags.noerror = value;
        before
    }

    fn set_noreturn(&mut self, value: bool) -> bool {
        let before = self.flags.noreturn;
        self.flags.noreturn = value;
        before
    }
}

/// The result of evaluating one node: either success (possibly with a
/// value) or failure. Internal errors are reported out-of-band via
/// `Result<Outcome, InternalError>` so call sites can propagate them with
/// `?` exactly like the C source's negative-vs-zero/one return convention.
pub(crate) enum Outcome {
    Success(Option<Value>),
    Failure,
}

/// A condition distinct from an ordinary parse failure: it indicates a bug
/// in the tree itself (an un-patched [`crate::node::fix`] placeholder, or a
/// recursion edge whose target has been dropped) rather than input that
/// failed to match. See `spec.md` §7 layer 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    /// A [`crate::node::fix`] placeholder was evaluated before being patched.
    UndefinedNode,
    /// A recursive reference's target has been dropped.
    DanglingRecursion,
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::UndefinedNode => write!(f, "evaluated an undefined parser node"),
            InternalError::DanglingRecursion => write!(f, "recursive parser reference is dangling"),
        }
    }
}

impl std::error::Error for InternalError {}

/// Either a parse failure or an internal error, returned by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Failure(ErrorReport),
    Internal(InternalError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Failure(e) => write!(f, "{e}"),
            ParseError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl std::error::Error for ParseError {}

fn report_failure(state: &State<'_>, err: &mut ErrorReport, msg: String) {
    if state.flags.noerror {
        return;
    }
    let origin = state.source.origin().to_string();
    err.set_failure(&origin, state.location, peek_readonly(state), msg);
}

/// Non-mutating peek used only to fill in a `received` field for error
/// reporting after the real (flag-mutating) peek has already happened via
/// [`State::peek`] earlier in the same call.
fn peek_readonly(state: &State<'_>) -> Option<char> {
    text::decode_at(state.source.buffer(), state.location.byte_offset).map(|(c, _)| c)
}

fn add_expected(state: &State<'_>, err: &mut ErrorReport, label: &str) {
    if state.flags.noerror {
        return;
    }
    let origin = state.source.origin().to_string();
    err.add_expected(&origin, state.location, peek_readonly(state), label);
}

fn char_result(state: &State<'_>, ch: char) -> Option<Value> {
    if state.flags.noreturn {
        None
    } else {
        Some(crate::value::boxed(ch.to_string()))
    }
}

fn string_result(state: &State<'_>, s: &str) -> Option<Value> {
    if state.flags.noreturn {
        None
    } else {
        Some(crate::value::boxed(s.to_string()))
    }
}

fn to_value(out: Option<Value>) -> Value {
    out.unwrap_or_else(unit)
}

/// Runs `node` against `state`, accumulating failures into `err`.
/// `depth` is the number of enclosing `run` calls on the Rust stack; it
/// plays the role of the C source's recursion-depth counter without
/// needing a mutable field threaded through `State` (see `spec.md` §4.2).
pub(crate) fn run(
    state: &mut State<'_>,
    node: &Parser,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let max = state.source.max_recursion_depth();
    if max > 0 && depth > max {
        report_failure(state, err, format!("maximum recursion depth of {max} reached"));
        return Ok(Outcome::Failure);
    }

    let kind_name;
    let trace_token;
    {
        let borrow = node.0.borrow();
        kind_name = borrow.name();
    }
    trace_token = trace::enter(kind_name);

    let result = run_kind(state, node, err, depth);

    let success = matches!(result, Ok(Outcome::Success(_)));
    trace::exit(kind_name, trace_token, success);
    result
}

fn run_kind(
    state: &mut State<'_>,
    node: &Parser,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    // Borrowing the node once up front and matching by reference keeps the
    // `RefCell` borrow short-lived: combinator children are run through
    // `run(..)` recursively only after this borrow on the *current* node
    // has ended, since children live behind their own, separate `RefCell`s.
    enum Dispatch {
        Leaf(Outcome),
        Expect(Parser, String),
        Apply(Parser, crate::node::Apply),
        Not(Parser),
        Maybe(Parser),
        NoError(Parser),
        NoReturn(Parser),
        Many(Parser, Option<Fold>),
        ManyUntil(Parser, Parser, Option<Fold>),
        Count(Parser, usize, Option<Fold>),
        Least(Parser, usize, Option<Fold>),
        And(Vec<Parser>, Option<Fold>),
        Or(Vec<Parser>),
        Chain(Parser, Parser, Option<Fold>),
        Postfix(Parser, Parser, Option<Fold>),
        Bind(Rc<str>, Parser),
        Lookup(Rc<str>),
        Recurse(std::rc::Weak<std::cell::RefCell<Kind>>),
        Undefined,
    }

    let dispatch = {
        let kind = node.0.borrow();
        match &*kind {
            Kind::Fail(msg) => Dispatch::Leaf({
                report_failure(state, err, msg.clone());
                Outcome::Failure
            }),
            Kind::Pass => Dispatch::Leaf(Outcome::Success(None)),
            Kind::Lift(f) => {
                let v = if state.flags.noreturn { None } else { Some(f()) };
                Dispatch::Leaf(Outcome::Success(v))
            }
            Kind::LiftVal(v) => {
                let v = if state.flags.noreturn { None } else { Some(v.clone()) };
                Dispatch::Leaf(Outcome::Success(v))
            }
            Kind::Location => {
                let v = if state.flags.noreturn {
                    None
                } else {
                    Some(crate::value::boxed(state.location))
                };
                Dispatch::Leaf(Outcome::Success(v))
            }
            Kind::Eof => {
                state.peek();
                Dispatch::Leaf(if state.flags.eof {
                    Outcome::Success(None)
                } else {
                    Outcome::Failure
                })
            }
            Kind::Sof => Dispatch::Leaf(if state.location.byte_offset == 0 {
                Outcome::Success(None)
            } else {
                Outcome::Failure
            }),
            Kind::Any => {
                let next = state.peek();
                match next {
                    None => Dispatch::Leaf(Outcome::Failure),
                    Some(c) => {
                        let v = char_result(state, c);
                        state.advance(c);
                        Dispatch::Leaf(Outcome::Success(v))
                    }
                }
            }
            Kind::Char(expected) => {
                let next = state.peek();
                match next {
                    Some(c) if c == *expected => {
                        let v = char_result(state, c);
                        state.advance(c);
                        Dispatch::Leaf(Outcome::Success(v))
                    }
                    _ => Dispatch::Leaf(Outcome::Failure),
                }
            }
            Kind::CharRange(lo, hi) => {
                let next = state.peek();
                match next {
                    Some(c) if c >= *lo && c <= *hi => {
                        let v = char_result(state, c);
                        state.advance(c);
                        Dispatch::Leaf(Outcome::Success(v))
                    }
                    _ => Dispatch::Leaf(Outcome::Failure),
                }
            }
            Kind::Match(f) => {
                let next = state.peek();
                match next {
                    Some(c) if f(c) => {
                        let v = char_result(state, c);
                        state.advance(c);
                        Dispatch::Leaf(Outcome::Success(v))
                    }
                    _ => Dispatch::Leaf(Outcome::Failure),
                }
            }
            Kind::AnyOf(chars) => {
                let next = state.peek();
                match next {
                    Some(c) if chars.iter().any(|&x| x == c) => {
                        let v = char_result(state, c);
                        state.advance(c);
                        Dispatch::Leaf(Outcome::Success(v))
                    }
                    _ => Dispatch::Leaf(Outcome::Failure),
                }
            }
            Kind::OneOf(chars) => {
                let next = state.peek();
                match next {
                    Some(c) if chars.iter().filter(|&&x| x == c).count() == 1 => {
                        let v = char_result(state, c);
                        state.advance(c);
                        Dispatch::Leaf(Outcome::Success(v))
                    }
                    _ => Dispatch::Leaf(Outcome::Failure),
                }
            }
            Kind::NoneOf(chars) => {
                let next = state.peek();
                match next {
                    Some(c) if !chars.iter().any(|&x| x == c) => {
                        let v = char_result(state, c);
                        state.advance(c);
                        Dispatch::Leaf(Outcome::Success(v))
                    }
                    _ => Dispatch::Leaf(Outcome::Failure),
                }
            }
            Kind::Str(s) => {
                let save = state.save();
                let mut matched = true;
                for expected in s.chars() {
                    match state.peek() {
                        Some(c) if c == expected => state.advance(c),
                        _ => {
                            matched = false;
                            break;
                        }
                    }
                }
                if matched {
                    let v = string_result(state, s);
                    Dispatch::Leaf(Outcome::Success(v))
                } else {
                    state.restore(save);
                    Dispatch::Leaf(Outcome::Failure)
                }
            }
            Kind::Expect(inner, label) => Dispatch::Expect(inner.clone(), label.clone()),
            Kind::Apply(inner, f) => Dispatch::Apply(inner.clone(), f.clone()),
            Kind::Not(inner) => Dispatch::Not(inner.clone()),
            Kind::Maybe(inner) => Dispatch::Maybe(inner.clone()),
            Kind::NoError(inner) => Dispatch::NoError(inner.clone()),
            Kind::NoReturn(inner) => Dispatch::NoReturn(inner.clone()),
            Kind::Many(inner, fold) => Dispatch::Many(inner.clone(), fold.clone()),
            Kind::ManyUntil(inner, term, fold) => Dispatch::ManyUntil(inner.clone(), term.clone(), fold.clone()),
            Kind::Count(inner, n, fold) => Dispatch::Count(inner.clone(), *n, fold.clone()),
            Kind::Least(inner, n, fold) => Dispatch::Least(inner.clone(), *n, fold.clone()),
            Kind::And(items, fold) => Dispatch::And(items.clone(), fold.clone()),
            Kind::Or(items) => Dispatch::Or(items.clone()),
            Kind::Chain(term, sep, fold) => Dispatch::Chain(term.clone(), sep.clone(), fold.clone()),
            Kind::Postfix(term, op, fold) => Dispatch::Postfix(term.clone(), op.clone(), fold.clone()),
            Kind::Bind(name, child) => Dispatch::Bind(name.clone(), child.clone()),
            Kind::Lookup(name) => Dispatch::Lookup(name.clone()),
            Kind::Recurse(weak) => Dispatch::Recurse(weak.clone()),
            Kind::Undefined => Dispatch::Undefined,
        }
    };

    match dispatch {
        Dispatch::Leaf(outcome) => Ok(outcome),
        Dispatch::Expect(inner, label) => {
            match run(state, &inner, err, depth + 1)? {
                Outcome::Success(v) => Ok(Outcome::Success(v)),
                Outcome::Failure => {
                    add_expected(state, err, &label);
                    Ok(Outcome::Failure)
                }
            }
        }
        Dispatch::Apply(inner, f) => match run(state, &inner, err, depth + 1)? {
            Outcome::Success(Some(v)) if !state.flags.noreturn => Ok(Outcome::Success(Some(f(v)))),
            other => Ok(other),
        },
        Dispatch::Not(inner) => {
            let save = state.save();
            let noerr_before = state.set_noerror(true);
            let res = run(state, &inner, err, depth + 1)?;
            state.set_noerror(noerr_before);
            match res {
                Outcome::Success(_) => {
                    state.restore(save);
                    Ok(Outcome::Failure)
                }
                Outcome::Failure => {
                    state.restore(save);
                    Ok(Outcome::Success(None))
                }
            }
        }
        Dispatch::Maybe(inner) => {
            let save = state.save();
            let noerr_before = state.set_noerror(true);
            let res = run(state, &inner, err, depth + 1)?;
            state.set_noerror(noerr_before);
            match res {
                Outcome::Success(v) => Ok(Outcome::Success(v)),
                Outcome::Failure => {
                    state.restore(save);
                    Ok(Outcome::Success(None))
                }
            }
        }
        Dispatch::NoError(inner) => {
            let before = state.set_noerror(true);
            let res = run(state, &inner, err, depth + 1)?;
            state.set_noerror(before);
            Ok(res)
        }
        Dispatch::NoReturn(inner) => {
            let before = state.set_noreturn(true);
            let res = run(state, &inner, err, depth + 1)?;
            state.set_noreturn(before);
            Ok(match res {
                Outcome::Success(_) => Outcome::Success(None),
                Outcome::Failure => Outcome::Failure,
            })
        }
        Dispatch::Many(inner, fold) => combine_many(state, &inner, fold, err, depth),
        Dispatch::ManyUntil(inner, term, fold) => combine_many_until(state, &inner, &term, fold, err, depth),
        Dispatch::Count(inner, n, fold) => combine_count(state, &inner, n, fold, err, depth),
        Dispatch::Least(inner, n, fold) => combine_least(state, &inner, n, fold, err, depth),
        Dispatch::And(items, fold) => combine_and(state, &items, fold, err, depth),
        Dispatch::Or(items) => combine_or(state, &items, err, depth),
        Dispatch::Chain(term, sep, fold) => combine_chain(state, &term, &sep, fold, err, depth),
        Dispatch::Postfix(term, op, fold) => combine_postfix(state, &term, &op, fold, err, depth),
        Dispatch::Bind(name, child) => {
            state.scope.push((name, child.clone()));
            let res = run(state, &child, err, depth + 1);
            state.scope.pop();
            res
        }
        Dispatch::Lookup(name) => match find_binding(state, &name) {
            Some(target) => run(state, &target, err, depth + 1),
            None => {
                report_failure(state, err, format!("undefined parser \"{name}\""));
                Ok(Outcome::Failure)
            }
        },
        Dispatch::Recurse(weak) => match weak.upgrade() {
            Some(cell) => run(state, &Parser(cell), err, depth + 1),
            None => Err(InternalError::DanglingRecursion),
        },
        Dispatch::Undefined => Err(InternalError::UndefinedNode),
    }
}

fn find_binding(state: &State<'_>, name: &str) -> Option<Parser> {
    state.scope.iter().rev().find(|(n, _)| n.as_ref() == name).map(|(_, p)| p.clone())
}

fn combine_many(
    state: &mut State<'_>,
    inner: &Parser,
    fold: Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let noerr_before = state.set_noerror(true);
    let noret_before = if fold.is_none() { Some(state.set_noreturn(true)) } else { None };

    let mut values = fold.is_some().then(Vec::new);

    loop {
        let save = state.save();
        match run(state, inner, err, depth + 1)? {
            Outcome::Failure => {
                state.restore(save);
                break;
            }
            Outcome::Success(v) => {
                if let Some(vals) = values.as_mut() {
                    vals.push(to_value(v));
                }
            }
        }
    }

    state.set_noerror(noerr_before);
    if let Some(before) = noret_before {
        state.set_noreturn(before);
    }

    let out = match (fold, values) {
        (Some(f), Some(vals)) => f(vals),
        _ => None,
    };
    Ok(Outcome::Success(out))
}

fn combine_many_until(
    state: &mut State<'_>,
    inner: &Parser,
    terminator: &Parser,
    fold: Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let noret_before = if fold.is_none() { Some(state.set_noreturn(true)) } else { None };

    let result = combine_many_until_inner(state, inner, terminator, fold, err, depth);

    if let Some(before) = noret_before {
        state.set_noreturn(before);
    }
    result
}

fn combine_many_until_inner(
    state: &mut State<'_>,
    inner: &Parser,
    terminator: &Parser,
    fold: Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let mut values = Vec::new();

    loop {
        let save = state.save();
        let noerr_before = state.set_noerror(true);
        let term_res = run(state, terminator, err, depth + 1)?;
        state.set_noerror(noerr_before);

        match term_res {
            Outcome::Success(v) => {
                values.push(to_value(v));
                break;
            }
            Outcome::Failure => {
                state.restore(save);
                let save2 = state.save();
                match run(state, inner, err, depth + 1)? {
                    Outcome::Success(v) => {
                        values.push(to_value(v));
                        continue;
                    }
                    Outcome::Failure => {
                        state.restore(save2);
                        // retry the terminator without suppressing errors,
                        // so its failure is what gets reported.
                        match run(state, terminator, err, depth + 1)? {
                            Outcome::Success(v) => {
                                values.push(to_value(v));
                                break;
                            }
                            Outcome::Failure => return Ok(Outcome::Failure),
                        }
                    }
                }
            }
        }
    }

    let out = fold.and_then(|f| f(values));
    Ok(Outcome::Success(out))
}

fn combine_count(
    state: &mut State<'_>,
    inner: &Parser,
    n: usize,
    fold: Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let noret_before = if fold.is_none() { Some(state.set_noreturn(true)) } else { None };

    let mut values = fold.is_some().then(Vec::new);
    for _ in 0..n {
        match run(state, inner, err, depth + 1)? {
            Outcome::Failure => {
                if let Some(before) = noret_before {
                    state.set_noreturn(before);
                }
                return Ok(Outcome::Failure);
            }
            Outcome::Success(v) => {
                if let Some(vals) = values.as_mut() {
                    vals.push(to_value(v));
                }
            }
        }
    }

    if let Some(before) = noret_before {
        state.set_noreturn(before);
    }
    let out = match (fold, values) {
        (Some(f), Some(vals)) => f(vals),
        _ => None,
    };
    Ok(Outcome::Success(out))
}

fn combine_least(
    state: &mut State<'_>,
    inner: &Parser,
    n: usize,
    fold: Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let noerr_before = state.flags.noerror;
    let noret_before = if fold.is_none() { Some(state.set_noreturn(true)) } else { None };
    let mut values = fold.is_some().then(Vec::new);

    let mut i = 0usize;
    loop {
        let required = i < n;
        if !required {
            state.set_noerror(true);
        }

        let save = state.save();
        let res = run(state, inner, err, depth + 1)?;

        match res {
            Outcome::Failure => {
                state.restore(save);
                state.flags.noerror = noerr_before;
                if let Some(before) = noret_before {
                    state.set_noreturn(before);
                }
                if required {
                    return Ok(Outcome::Failure);
                }
                break;
            }
            Outcome::Success(v) => {
                if let Some(vals) = values.as_mut() {
                    vals.push(to_value(v));
                }
            }
        }
        i += 1;
    }

    let out = match (fold, values) {
        (Some(f), Some(vals)) => f(vals),
        _ => None,
    };
    Ok(Outcome::Success(out))
}

fn combine_and(
    state: &mut State<'_>,
    items: &[Parser],
    fold: Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let noret_before = if fold.is_none() { Some(state.set_noreturn(true)) } else { None };

    let mut values = fold.is_some().then(Vec::new);
    for item in items {
        match run(state, item, err, depth + 1)? {
            Outcome::Failure => {
                if let Some(before) = noret_before {
                    state.set_noreturn(before);
                }
                // AND commits: no state restore on inner failure (spec.md §4.5).
                return Ok(Outcome::Failure);
            }
            Outcome::Success(v) => {
                if let Some(vals) = values.as_mut() {
                    vals.push(to_value(v));
                }
            }
        }
    }

    if let Some(before) = noret_before {
        state.set_noreturn(before);
    }
    let out = match (fold, values) {
        (Some(f), Some(vals)) => f(vals),
        _ => None,
    };
    Ok(Outcome::Success(out))
}

fn combine_or(
    state: &mut State<'_>,
    items: &[Parser],
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    for item in items {
        match run(state, item, err, depth + 1)? {
            Outcome::Success(v) => return Ok(Outcome::Success(v)),
            Outcome::Failure => continue,
        }
    }
    Ok(Outcome::Failure)
}

fn combine_chain(
    state: &mut State<'_>,
    term: &Parser,
    sep: &Parser,
    fold: Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let noret_before = if fold.is_none() { Some(state.set_noreturn(true)) } else { None };
    let result = combine_chain_inner(state, term, sep, &fold, err, depth);
    if let Some(before) = noret_before {
        state.set_noreturn(before);
    }
    result
}

fn combine_chain_inner(
    state: &mut State<'_>,
    term: &Parser,
    sep: &Parser,
    fold: &Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let first = match run(state, term, err, depth + 1)? {
        Outcome::Failure => return Ok(Outcome::Failure),
        Outcome::Success(v) => v,
    };

    let mut values = vec![to_value(first.clone())];
    let mut any_sep = false;

    loop {
        let save = state.save();
        let noerr_before = state.set_noerror(true);
        let sep_res = run(state, sep, err, depth + 1)?;
        state.set_noerror(noerr_before);

        match sep_res {
            Outcome::Failure => {
                state.restore(save);
                break;
            }
            Outcome::Success(sv) => {
                any_sep = true;
                values.push(to_value(sv));
                match run(state, term, err, depth + 1)? {
                    Outcome::Failure => return Ok(Outcome::Failure),
                    Outcome::Success(tv) => values.push(to_value(tv)),
                }
            }
        }
    }

    if any_sep {
        let out = fold.as_ref().and_then(|f| f(values));
        Ok(Outcome::Success(out))
    } else {
        Ok(Outcome::Success(first))
    }
}

fn combine_postfix(
    state: &mut State<'_>,
    term: &Parser,
    op: &Parser,
    fold: Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let noret_before = if fold.is_none() { Some(state.set_noreturn(true)) } else { None };
    let result = combine_postfix_inner(state, term, op, &fold, err, depth);
    if let Some(before) = noret_before {
        state.set_noreturn(before);
    }
    result
}

fn combine_postfix_inner(
    state: &mut State<'_>,
    term: &Parser,
    op: &Parser,
    fold: &Option<Fold>,
    err: &mut ErrorReport,
    depth: u32,
) -> Result<Outcome, InternalError> {
    let first = match run(state, term, err, depth + 1)? {
        Outcome::Failure => return Ok(Outcome::Failure),
        Outcome::Success(v) => v,
    };

    let mut values = vec![to_value(first.clone())];
    let mut any_op = false;

    loop {
        let save = state.save();
        let noerr_before = state.set_noerror(true);
        let op_res = run(state, op, err, depth + 1)?;
        state.set_noerror(noerr_before);

        match op_res {
            Outcome::Failure => {
                state.restore(save);
                break;
            }
            Outcome::Success(ov) => {
                any_op = true;
                values.push(to_value(ov));
            }
        }
    }

    if any_op {
        let out = fold.as_ref().and_then(|f| f(values));
        Ok(Outcome::Success(out))
    } else {
        Ok(Outcome::Success(first))
    }
}

/// The top-level entry point: evaluates `parser` against `source`.
///
/// `parser` is dropped (its reference released) exactly once, regardless
/// of outcome — matching `cc_parse`'s unconditional `cc_release(p)`
/// (`spec.md` §4.10 step 6). Unlike the C API there is no separate
/// `cc_result`/`cc_err_free` pair to manage: the returned `Result` owns
/// everything it needs and is dropped normally.
pub fn parse(source: &Rc<Source>, parser: Parser) -> Result<Option<Value>, ParseError> {
    let mut state = State::new(source.as_ref());
    let mut err = ErrorReport::blank();

    let outcome = run(&mut state, &parser, &mut err, 0);
    drop(parser);

    match outcome {
        Ok(Outcome::Success(v)) => Ok(v),
        Ok(Outcome::Failure) => Err(ParseError::Failure(err)),
        Err(internal) => Err(ParseError::Internal(internal)),
    }
}
