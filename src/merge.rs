use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
};


/// Shallow merge used by [`Store::set`](crate::Store::set).
///
/// `merge` returns a new value holding every field of `self`, with the fields
/// present in `partial` overwriting those of the same name.
///
/// Can be derived for structs with named fields:
///
/// - `Option<_>` fields are overwritten only when `partial` holds `Some`.
/// - Fields marked `#[merge(skip)]` always keep the current value.
/// - Other fields are taken from `partial`.
pub trait Merge {
    fn merge(&self, partial: &Self) -> Self;
}

impl<K, V> Merge for BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn merge(&self, partial: &Self) -> Self {
        let mut value = self.clone();
        value.extend(partial.iter().map(|(k, v)| (k.clone(), v.clone())));
        value
    }
}

impl<K, V, S> Merge for HashMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn merge(&self, partial: &Self) -> Self {
        let mut value = self.clone();
        value.extend(partial.iter().map(|(k, v)| (k.clone(), v.clone())));
        value
    }
}

#[cfg(feature = "json")]
impl Merge for serde_json::Map<String, serde_json::Value> {
    fn merge(&self, partial: &Self) -> Self {
        let mut value = self.clone();
        for (k, v) in partial {
            value.insert(k.clone(), v.clone());
        }
        value
    }
}
