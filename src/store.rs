use std::{
    cell::RefCell,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;
use parse_display::Display;
use serde::{Deserialize, Serialize};
use slabmap::SlabMap;

use crate::{Merge, StoreError, Subscription};


type Listener<T> = Rc<dyn Fn(&Rc<T>, &Rc<T>)>;
type Resolver<T> = Box<dyn FnOnce(&Rc<T>) -> Rc<T>>;

/// How a panicking listener affects the rest of a broadcast.
#[derive(Clone, Copy, Display, Debug, Default, PartialEq, Eq)]
#[display(style = "snake_case")]
pub enum ListenerPanic {
    /// Log the panic and keep delivering to the remaining listeners.
    #[default]
    Isolate,
    /// Let the panic unwind out of the mutating call.
    Propagate,
}

/// Settings for a [`Store`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Name attached to log events.
    pub name: &'static str,
    pub listener_panic: ListenerPanic,
}
impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store",
            listener_panic: ListenerPanic::default(),
        }
    }
}

/// A value passed to [`Store::set`] or [`Store::replace`].
pub enum Update<T: 'static> {
    /// A literal value.
    Value(Rc<T>),
    /// A function called once with the current value.
    Fn(Resolver<T>),
}
impl<T: 'static> Update<T> {
    pub fn from_fn<R: Into<Rc<T>>>(f: impl FnOnce(&Rc<T>) -> R + 'static) -> Self {
        Update::Fn(Box::new(move |current| f(current).into()))
    }
    pub(crate) fn resolve(self, current: &Rc<T>) -> Rc<T> {
        match self {
            Update::Value(value) => value,
            Update::Fn(f) => f(current),
        }
    }
}
impl<T: 'static> From<T> for Update<T> {
    fn from(value: T) -> Self {
        Update::Value(Rc::new(value))
    }
}
impl<T: 'static> From<Rc<T>> for Update<T> {
    fn from(value: Rc<T>) -> Self {
        Update::Value(value)
    }
}

/// An observable container holding a single value.
///
/// Every accepted mutation replaces the value as a whole and notifies all
/// listeners synchronously with the new and previous value.
/// A mutation that resolves to the current value (by `Rc` identity) is ignored.
#[derive_ex(Clone, bound())]
pub struct Store<T: 'static>(Rc<StoreNode<T>>);

impl<T: 'static> Store<T> {
    /// Create a new `Store` whose initial value is produced by `creator`.
    ///
    /// `creator` receives the store's own capabilities, so that actions embedded in the
    /// value can read and update the store once it is constructed.
    pub fn new(creator: impl FnOnce(&StoreApi<T>) -> T) -> Self {
        Self::with_config(StoreConfig::default(), creator)
    }

    /// Create a new `Store` with the specified [`StoreConfig`].
    pub fn with_config(config: StoreConfig, creator: impl FnOnce(&StoreApi<T>) -> T) -> Self {
        Self(Rc::new_cyclic(|this| {
            let api = StoreApi(this.clone());
            let value = Rc::new(creator(&api));
            StoreNode {
                value: RefCell::new(value.clone()),
                initial: value,
                listeners: RefCell::new(SlabMap::new()),
                config,
            }
        }))
    }

    /// Create a new `Store` with the given initial value.
    pub fn from_value(value: T) -> Self {
        Self::new(|_| value)
    }

    /// Returns the current value.
    pub fn get(&self) -> Rc<T> {
        self.0.get()
    }

    /// Returns the value produced by the initializer.
    pub fn get_initial(&self) -> Rc<T> {
        self.0.initial.clone()
    }

    /// Merges `update` into the current value and notifies the listeners.
    ///
    /// Does nothing if `update` resolves to the current value.
    pub fn set(&self, update: impl Into<Update<T>>)
    where
        T: Merge,
    {
        let update = update.into();
        self.0.apply(|current| update.resolve(current), Some(T::merge))
    }

    /// Merges the result of `f` into the current value and notifies the listeners.
    ///
    /// `f` is called exactly once with the current value.
    pub fn set_with<R: Into<Rc<T>>>(&self, f: impl FnOnce(&Rc<T>) -> R)
    where
        T: Merge,
    {
        self.0.apply(|current| f(current).into(), Some(T::merge))
    }

    /// Like [`set_with`](Self::set_with), but `f` may fail.
    ///
    /// If `f` returns `Err`, the value is left unchanged and the error is returned.
    pub fn try_set_with<R: Into<Rc<T>>, E>(
        &self,
        f: impl FnOnce(&Rc<T>) -> Result<R, E>,
    ) -> Result<(), E>
    where
        T: Merge,
    {
        let next: Rc<T> = f(&self.get())?.into();
        self.set(next);
        Ok(())
    }

    /// Replaces the whole value and notifies the listeners.
    ///
    /// Does nothing if `update` resolves to the current value.
    pub fn replace(&self, update: impl Into<Update<T>>) {
        let update = update.into();
        self.0.apply(|current| update.resolve(current), None)
    }

    /// Replaces the whole value with the result of `f` and notifies the listeners.
    pub fn replace_with<R: Into<Rc<T>>>(&self, f: impl FnOnce(&Rc<T>) -> R) {
        self.0.apply(|current| f(current).into(), None)
    }

    /// Like [`replace_with`](Self::replace_with), but `f` may fail.
    pub fn try_replace_with<R: Into<Rc<T>>, E>(
        &self,
        f: impl FnOnce(&Rc<T>) -> Result<R, E>,
    ) -> Result<(), E> {
        let next: Rc<T> = f(&self.get())?.into();
        self.replace(next);
        Ok(())
    }

    /// Registers a listener called with `(new, previous)` after every accepted mutation.
    ///
    /// Each call creates an independent registration, even for the same function.
    /// The listener is removed when the returned [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe(&self, listener: impl Fn(&Rc<T>, &Rc<T>) + 'static) -> Subscription {
        self.0.subscribe(Rc::new(listener))
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    /// Returns the capabilities handed to the initializer.
    pub fn api(&self) -> StoreApi<T> {
        StoreApi(Rc::downgrade(&self.0))
    }
}
impl<T: std::fmt::Debug> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.0.config.name)
            .field("value", &self.get())
            .finish()
    }
}
impl<T> Serialize for Store<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        T::serialize(&self.get(), serializer)
    }
}
impl<'de, T> Deserialize<'de> for Store<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Store<T>, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Store::from_value)
    }
}

/// Weak handle to a [`Store`], given to the initializer.
///
/// Every method returns [`StoreError::Unavailable`] while the initializer is running
/// and after the store has been dropped.
#[derive_ex(Clone, bound())]
pub struct StoreApi<T: 'static>(Weak<StoreNode<T>>);

impl<T: 'static> StoreApi<T> {
    fn node(&self) -> Result<Rc<StoreNode<T>>, StoreError> {
        self.0.upgrade().ok_or(StoreError::Unavailable)
    }

    /// Returns the current value.
    pub fn get(&self) -> Result<Rc<T>, StoreError> {
        Ok(self.node()?.get())
    }

    /// Merges `update` into the current value, as [`Store::set`].
    ///
    /// Returns [`StoreError::Unavailable`] without resolving `update` if the store is unavailable.
    pub fn set(&self, update: impl Into<Update<T>>) -> Result<(), StoreError>
    where
        T: Merge,
    {
        Store(self.node()?).set(update);
        Ok(())
    }

    /// Merges the result of `f`, as [`Store::set_with`]. `f` is not called if the store is unavailable.
    pub fn set_with<R: Into<Rc<T>>>(&self, f: impl FnOnce(&Rc<T>) -> R) -> Result<(), StoreError>
    where
        T: Merge,
    {
        Store(self.node()?).set_with(f);
        Ok(())
    }

    /// Replaces the whole value, as [`Store::replace`].
    ///
    /// Returns [`StoreError::Unavailable`] without resolving `update` if the store is unavailable.
    pub fn replace(&self, update: impl Into<Update<T>>) -> Result<(), StoreError> {
        Store(self.node()?).replace(update);
        Ok(())
    }

    /// Replaces the value with the result of `f`, as [`Store::replace_with`].
    pub fn replace_with<R: Into<Rc<T>>>(
        &self,
        f: impl FnOnce(&Rc<T>) -> R,
    ) -> Result<(), StoreError> {
        Store(self.node()?).replace_with(f);
        Ok(())
    }

    /// Registers a listener, as [`Store::subscribe`].
    pub fn subscribe(
        &self,
        listener: impl Fn(&Rc<T>, &Rc<T>) + 'static,
    ) -> Result<Subscription, StoreError> {
        Ok(self.node()?.subscribe(Rc::new(listener)))
    }

    /// Returns the store, if it is still alive.
    pub fn store(&self) -> Option<Store<T>> {
        self.0.upgrade().map(Store)
    }
}

struct StoreNode<T: 'static> {
    value: RefCell<Rc<T>>,
    initial: Rc<T>,
    listeners: RefCell<SlabMap<Listener<T>>>,
    config: StoreConfig,
}
impl<T: 'static> StoreNode<T> {
    fn get(&self) -> Rc<T> {
        self.value.borrow().clone()
    }

    fn apply(&self, resolve: impl FnOnce(&Rc<T>) -> Rc<T>, merge: Option<fn(&T, &T) -> T>) {
        let next = resolve(&self.get());
        // The resolver may have committed a value of its own.
        let current = self.get();
        if Rc::ptr_eq(&next, &current) {
            tracing::debug!(store = self.config.name, "update resolved to current value");
            return;
        }
        let next = match merge {
            Some(merge) => Rc::new(merge(&current, &next)),
            None => next,
        };
        *self.value.borrow_mut() = next.clone();
        self.broadcast(&next, &current);
    }

    fn broadcast(&self, value: &Rc<T>, previous: &Rc<T>) {
        let listeners: Vec<(usize, Listener<T>)> = self
            .listeners
            .borrow()
            .iter()
            .map(|(key, l)| (key, l.clone()))
            .collect();
        tracing::trace!(
            store = self.config.name,
            listeners = listeners.len(),
            "broadcast"
        );
        for (key, listener) in listeners {
            if !self.is_registered(key, &listener) {
                continue;
            }
            match self.config.listener_panic {
                ListenerPanic::Propagate => listener(value, previous),
                ListenerPanic::Isolate => {
                    if let Err(e) = catch_unwind(AssertUnwindSafe(|| listener(value, previous)))
                    {
                        tracing::error!(
                            store = self.config.name,
                            key,
                            message = panic_message(&*e),
                            "listener panicked"
                        );
                    }
                }
            }
        }
    }
    fn is_registered(&self, key: usize, listener: &Listener<T>) -> bool {
        self.listeners
            .borrow()
            .get(key)
            .is_some_and(|l| Rc::ptr_eq(l, listener))
    }

    fn subscribe(self: &Rc<Self>, listener: Listener<T>) -> Subscription {
        let key = self.listeners.borrow_mut().insert(listener);
        Subscription::from_weak_fn(Rc::downgrade(self), move |this| this.unsubscribe(key))
    }
    fn unsubscribe(&self, key: usize) {
        self.listeners.borrow_mut().remove(key);
    }
}

fn panic_message(e: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = e.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = e.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}
