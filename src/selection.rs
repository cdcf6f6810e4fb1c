use std::{
    cell::{Cell, Ref, RefCell},
    rc::{Rc, Weak},
};

use parse_display::Display;

use crate::{Store, Subscription};


type Selector<T, S> = Rc<dyn Fn(&Rc<T>) -> S>;
type Equality<S> = Rc<dyn Fn(&S, &S) -> bool>;
type OnChange<S> = Box<dyn Fn(&S, &S)>;

impl<T: 'static> Store<T> {
    /// Starts building a [`Selection`] of the slice returned by `selector`.
    ///
    /// Slices are compared with `PartialEq`.
    pub fn select<S>(&self, selector: impl Fn(&Rc<T>) -> S + 'static) -> SelectionBuilder<T, S>
    where
        S: PartialEq + Clone + 'static,
    {
        self.select_with(selector, <S as PartialEq>::eq)
    }

    /// Starts building a [`Selection`] of the slice returned by `selector`, compared with `equality`.
    pub fn select_with<S>(
        &self,
        selector: impl Fn(&Rc<T>) -> S + 'static,
        equality: impl Fn(&S, &S) -> bool + 'static,
    ) -> SelectionBuilder<T, S>
    where
        S: Clone + 'static,
    {
        SelectionBuilder {
            store: self.clone(),
            selector: Rc::new(selector),
            equality: Rc::new(equality),
            fire_immediately: false,
        }
    }

    /// Starts building a [`Selection`] of the whole value, compared by `Rc` identity.
    pub fn watch(&self) -> SelectionBuilder<T, Rc<T>> {
        self.select_with(|value| value.clone(), Rc::<T>::ptr_eq)
    }
}

/// Builder for [`Selection`].
pub struct SelectionBuilder<T: 'static, S: 'static> {
    store: Store<T>,
    selector: Selector<T, S>,
    equality: Equality<S>,
    fire_immediately: bool,
}

impl<T: 'static, S: Clone + 'static> SelectionBuilder<T, S> {
    /// Replaces the equality function.
    pub fn equality(mut self, equality: impl Fn(&S, &S) -> bool + 'static) -> Self {
        self.equality = Rc::new(equality);
        self
    }

    /// If `true`, `on_change` is called once with the initial slice during [`attach`](Self::attach).
    pub fn fire_immediately(mut self, value: bool) -> Self {
        self.fire_immediately = value;
        self
    }

    /// Attaches to the store.
    ///
    /// `on_change` is called with `(new, previous)` slices each time a broadcast
    /// produces a slice that the equality function reports as different from the cached one.
    pub fn attach(self, on_change: impl Fn(&S, &S) + 'static) -> Selection<T, S> {
        let slice = (self.selector)(&self.store.get());
        let node = Rc::new(SelectionNode {
            selector: RefCell::new(self.selector),
            equality: RefCell::new(self.equality),
            slice: RefCell::new(slice.clone()),
            on_change: Box::new(on_change),
            is_attached: Cell::new(true),
        });
        let weak = Rc::downgrade(&node);
        let api = self.store.api();
        let subscription = self.store.subscribe(move |value, _| {
            // A listener may have committed a newer value before this one was reached.
            let latest = api.get().unwrap_or_else(|_| value.clone());
            SelectionNode::on_broadcast(&weak, &latest)
        });
        if self.fire_immediately {
            (node.on_change)(&slice, &slice);
        }
        Selection { node, subscription }
    }
}

/// State of a [`Selection`].
#[derive(Clone, Copy, Display, Debug, PartialEq, Eq)]
#[display(style = "snake_case")]
pub enum SelectionState {
    Attached,
    Detached,
}

/// An observer of a derived slice of a [`Store`] value.
///
/// Dropping a `Selection` detaches it.
pub struct Selection<T: 'static, S: 'static> {
    node: Rc<SelectionNode<T, S>>,
    subscription: Subscription,
}

impl<T: 'static, S: 'static> Selection<T, S> {
    /// Returns the last slice delivered.
    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.node.slice.borrow().clone()
    }

    /// Borrows the last slice delivered.
    ///
    /// A broadcast that reaches this selection while the borrow is held is dropped
    /// for this selection, and the cached slice keeps its value.
    pub fn borrow(&self) -> Ref<'_, S> {
        self.node.slice.borrow()
    }

    /// Replaces the selector used by subsequent broadcasts.
    ///
    /// The cached slice is left untouched and no notification is sent.
    pub fn set_selector(&self, selector: impl Fn(&Rc<T>) -> S + 'static) {
        *self.node.selector.borrow_mut() = Rc::new(selector);
    }

    /// Replaces the equality function used by subsequent broadcasts.
    pub fn set_equality(&self, equality: impl Fn(&S, &S) -> bool + 'static) {
        *self.node.equality.borrow_mut() = Rc::new(equality);
    }

    /// Stops receiving notifications. Calling this more than once has no effect.
    pub fn detach(&mut self) {
        self.node.is_attached.set(false);
        self.subscription.unsubscribe();
    }

    pub fn state(&self) -> SelectionState {
        if self.node.is_attached.get() {
            SelectionState::Attached
        } else {
            SelectionState::Detached
        }
    }
    pub fn is_attached(&self) -> bool {
        self.state() == SelectionState::Attached
    }
}
impl<T: 'static, S: std::fmt::Debug + 'static> std::fmt::Debug for Selection<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Selection");
        match self.node.slice.try_borrow() {
            Ok(slice) => d.field("slice", &*slice),
            Err(_) => d.field("slice", &"<borrowed>"),
        };
        d.field("state", &self.state()).finish()
    }
}

struct SelectionNode<T: 'static, S: 'static> {
    selector: RefCell<Selector<T, S>>,
    equality: RefCell<Equality<S>>,
    slice: RefCell<S>,
    on_change: OnChange<S>,
    is_attached: Cell<bool>,
}
impl<T: 'static, S: Clone + 'static> SelectionNode<T, S> {
    fn on_broadcast(this: &Weak<Self>, value: &Rc<T>) {
        let Some(this) = this.upgrade() else {
            return;
        };
        if !this.is_attached.get() {
            return;
        }
        let selector = this.selector.borrow().clone();
        let equality = this.equality.borrow().clone();
        let next = selector(value);
        let previous = this.slice.borrow().clone();
        if equality(&previous, &next) {
            return;
        }
        let Ok(mut slice) = this.slice.try_borrow_mut() else {
            tracing::warn!("selection slice is borrowed, broadcast dropped");
            return;
        };
        *slice = next.clone();
        drop(slice);
        (this.on_change)(&next, &previous);
    }
}
