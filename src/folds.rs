//! Convenience fold/apply callbacks.
//!
//! `spec.md` §1 explicitly puts these out of THE CORE's scope ("convenience
//! fold callbacks (concat, first, middle, last, null)" are listed among the
//! external collaborators), but a caller can't drive any of the worked
//! examples in `spec.md` §8 without at least `concat`, so this module ships
//! them anyway, grounded in `examples/original_source/include/ccombinator.h`'s
//! "Folding functions" section.

use std::rc::Rc;

use crate::node::{Apply, Fold};
use crate::value::{boxed, downcast, Value};

/// Concatenates every element that holds a `String` (as produced by the
/// primitive matchers) into one `String`; any element that isn't one
/// (`Pass`, `Eof`, `Sof`, and a non-matching `Maybe` all produce no
/// result) contributes nothing. This lets `concat` sit directly on an
/// `and`/`chain` whose children mix string-producing parsers with
/// result-less ones, per `cc_fold_concat`'s usage throughout
/// `examples/original_source`.
pub fn concat() -> Fold {
    Rc::new(|values: Vec<Value>| {
        let mut out = String::new();
        for v in values {
            if let Some(s) = downcast::<String>(&v) {
                out.push_str(s);
            }
        }
        Some(boxed(out))
    })
}

/// Keeps the first element, discarding the rest.
pub fn first() -> Fold {
    Rc::new(|values: Vec<Value>| values.into_iter().next())
}

/// Keeps the middle element (`values[len / 2]`), discarding the rest.
/// With exactly 3 elements (`token`'s `[ws, inner, ws]` shape) this is the
/// inner one.
pub fn middle() -> Fold {
    Rc::new(|values: Vec<Value>| {
        if values.is_empty() {
            None
        } else {
            let mid = values.len() / 2;
            values.into_iter().nth(mid)
        }
    })
}

/// Keeps the last element, discarding the rest.
pub fn last() -> Fold {
    Rc::new(|values: Vec<Value>| values.into_iter().next_back())
}

/// Discards every element, producing no result.
pub fn null() -> Fold {
    Rc::new(|_values: Vec<Value>| None)
}

/// Discards a single value, producing no result. The `apply` analogue of
/// [`null`] (`cc_apply_free`).
pub fn apply_free() -> Apply {
    Rc::new(|_value: Value| boxed(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_joins_strings() {
        let f = concat();
        let v = f(vec![boxed("foo".to_string()), boxed("bar".to_string())]).unwrap();
        assert_eq!(downcast::<String>(&v).unwrap(), "foobar");
    }

    #[test]
    fn first_middle_last() {
        let values = || vec![boxed(1i32), boxed(2i32), boxed(3i32)];
        assert_eq!(*downcast::<i32>(&first()(values()).unwrap()).unwrap(), 1);
        assert_eq!(*downcast::<i32>(&middle()(values()).unwrap()).unwrap(), 2);
        assert_eq!(*downcast::<i32>(&last()(values()).unwrap()).unwrap(), 3);
    }

    #[test]
    fn null_discards_everything() {
        assert!(null()(vec![boxed(1i32), boxed(2i32)]).is_none());
    }
}
