//! An observable state container.
//!
//! A [`Store`] holds a single value and notifies its listeners each time the value is
//! replaced. A [`Selection`] observes a slice of that value and is notified only when the
//! slice changes according to an equality function.
//!
//! ```
//! use std::collections::BTreeMap;
//! use slice_store::Store;
//!
//! let store = Store::from_value(BTreeMap::from([("a", 1), ("b", 2)]));
//! let a = store.select(|v| v["a"]).attach(|a, _| println!("a = {a}"));
//!
//! store.set(BTreeMap::from([("b", 3)])); // `a` is not notified
//! store.set(BTreeMap::from([("a", 5)])); // prints "a = 5"
//! assert_eq!(a.get(), 5);
//! ```

extern crate self as slice_store;

pub mod equality;
mod error;
mod merge;
mod selection;
mod store;
mod subscription;

pub use error::*;
pub use merge::*;
pub use selection::*;
pub use slice_store_macros::Merge;
pub use store::*;
pub use subscription::*;
