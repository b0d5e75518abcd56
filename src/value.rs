//! The opaque result type threaded through the evaluator.
//!
//! `spec.md` §9 lays out three ways a typed systems language can replace
//! the C source's untyped `void*` + fold/apply callbacks: parameterize the
//! whole library by a result type, use a dynamic/any wrapper with a
//! user-supplied drop function, or give fold/apply a boxed object with a
//! known vtable. This crate takes the second option, realized as
//! `Rc<dyn Any>`: `Drop` on the trait object *is* the "user-supplied drop
//! function", recovered automatically once a caller downcasts to the
//! concrete type they expect.
//!
//! `Rc` rather than `Box` matters for one specific node: [`crate::node::lift_val`]
//! hands back the *same* value every time it matches (e.g. inside
//! [`crate::node::many`]), which an owning `Box` can't do without cloning
//! the user's type. Sharing is otherwise invisible — a single-owner chain
//! of folds/applies sees ordinary move-like semantics.

use std::any::Any;
use std::rc::Rc;

/// The result produced by a parser on success. `None` represents the
/// [`crate::node::pass`]/`noreturn`-suppressed case ("result = null").
pub type Value = Rc<dyn Any>;

/// Wrap a concrete value as a [`Value`].
pub fn boxed<T: 'static>(value: T) -> Value {
    Rc::new(value)
}

/// Downcast a [`Value`] back to `T`, returning `None` on a type mismatch.
pub fn downcast<T: 'static>(value: &Value) -> Option<&T> {
    value.downcast_ref::<T>()
}

/// A concrete placeholder standing in for "no result" when a child of a
/// folding combinator (`and`, `many`, ...) matched under `noreturn` or
/// otherwise produced `None`. Folds that care about positions rather than
/// values (e.g. counting repetitions) can still rely on one list element
/// per match; folds that only ever see real results (the common case)
/// never observe this value because it's only synthesized in contexts
/// where the caller passed no fold at all.
pub(crate) fn unit() -> Value {
    Rc::new(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_boxed_and_downcast() {
        let v = boxed(42i64);
        assert_eq!(downcast::<i64>(&v), Some(&42));
        assert_eq!(downcast::<String>(&v), None);
    }

    #[test]
    fn clone_shares_the_same_allocation() {
        let v = boxed(String::from("hi"));
        let v2 = v.clone();
        assert_eq!(downcast::<String>(&v2).unwrap(), "hi");
    }
}
