//! Equality functions for [`Store::select_with`](crate::Store::select_with) and
//! [`SelectionBuilder::equality`](crate::SelectionBuilder::equality).

use std::{collections::BTreeMap, rc::Rc};


/// Compares two `Rc` by pointer.
pub fn identity<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::ptr_eq(a, b)
}

/// Compares two slices of `Rc` element by element, by pointer.
pub fn shallow<T: ?Sized>(a: &[Rc<T>], b: &[Rc<T>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| Rc::ptr_eq(a, b))
}

/// Compares two maps of `Rc`: same keys, values by pointer.
pub fn shallow_map<K: Ord, T: ?Sized>(a: &BTreeMap<K, Rc<T>>, b: &BTreeMap<K, Rc<T>>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|((ka, va), (kb, vb))| ka == kb && Rc::ptr_eq(va, vb))
}

/// Never equal: every broadcast notifies.
pub fn never<S: ?Sized>(_: &S, _: &S) -> bool {
    false
}
