use std::rc::Rc;

use assert_call::{call, CallRecorder};
use slice_store::*;

#[derive(Clone, Debug, PartialEq, Merge)]
struct Cart {
    a: Option<i32>,
    b: Option<i32>,
    items: Option<Rc<Vec<String>>>,
}

fn cart() -> Store<Cart> {
    Store::from_value(Cart {
        a: Some(1),
        b: Some(2),
        items: Some(Rc::new(vec!["apple".into()])),
    })
}

fn partial() -> Cart {
    Cart {
        a: None,
        b: None,
        items: None,
    }
}

#[test]
fn unrelated_field_does_not_notify() {
    let mut cr = CallRecorder::new();
    let s = cart();
    let _a = s.select(|v| v.a).attach(|new, _| call!("a {:?}", new));

    s.set_with(|v| Cart {
        b: v.b.map(|b| b + 1),
        ..partial()
    });
    cr.verify(());

    s.set_with(|v| Cart {
        a: v.a.map(|a| a + 1),
        ..partial()
    });
    cr.verify("a Some(2)");
}

#[test]
fn deep_equality_ignores_new_allocation() {
    let mut cr = CallRecorder::new();
    let s = cart();
    let _items = s
        .select_with(|v| v.items.clone(), |x, y| x == y)
        .attach(|new, _| call!("items {:?}", new.as_deref()));

    s.set(Cart {
        items: Some(Rc::new(vec!["apple".into()])),
        ..partial()
    });
    cr.verify(());

    s.set(Cart {
        items: Some(Rc::new(vec!["apple".into(), "pear".into()])),
        ..partial()
    });
    cr.verify(r#"items Some(["apple", "pear"])"#);
}

#[test]
fn shallow_equality_notifies_on_new_allocation() {
    let mut cr = CallRecorder::new();
    let s = cart();
    let _items = s
        .select_with(
            |v| v.items.clone().unwrap_or_default(),
            equality::identity,
        )
        .attach(|new, _| call!("items {}", new.len()));

    s.set(Cart {
        items: Some(Rc::new(vec!["apple".into()])),
        ..partial()
    });
    cr.verify("items 1");
}

#[test]
fn detach_twice_then_no_notifications() {
    let mut cr = CallRecorder::new();
    let s = cart();
    let mut a = s.select(|v| v.a).attach(|new, _| call!("a {:?}", new));

    a.detach();
    a.detach();
    assert!(!a.is_attached());

    for i in 0..3 {
        s.set(Cart {
            a: Some(10 + i),
            ..partial()
        });
    }
    cr.verify(());
    assert_eq!(a.get(), Some(1));
}

#[test]
fn rebind_selector_keeps_cache_until_broadcast() {
    let mut cr = CallRecorder::new();
    let s = cart();
    let a = s.select(|v| v.a).attach(|new, prev| call!("{:?} {:?}", prev, new));

    a.set_selector(|v| v.b);
    a.set_equality(|x, y| x == y);
    cr.verify(());
    assert_eq!(a.get(), Some(1));

    s.set(Cart {
        b: Some(7),
        ..partial()
    });
    cr.verify("Some(1) Some(7)");
}

#[test]
fn many_observers_each_gated() {
    let mut cr = CallRecorder::new();
    let s = cart();
    let _a = s.select(|v| v.a).attach(|_, _| call!("a"));
    let _b = s.select(|v| v.b).attach(|_, _| call!("b"));
    let _all = s.watch().attach(|_, _| call!("all"));

    s.set(Cart {
        b: Some(3),
        ..partial()
    });
    cr.verify(["b", "all"]);

    s.set(s.get());
    cr.verify(());
}
