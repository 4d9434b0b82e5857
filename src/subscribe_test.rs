use std::sync::{Arc, Mutex};

use super::*;

#[derive(Default)]
struct State {
    count: u32,
    label: String,
}

fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(&T) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |v: &T| sink.lock().unwrap().push(v.clone()))
}

#[test]
fn fires_only_on_change() {
    let mut state = State::default();
    let mut subs = Subscriptions::new();
    let (seen, cb) = recorder::<u32>();
    subs.subscribe(&state, |s: &State| s.count, cb);

    assert_eq!(subs.notify(&state), 0);
    state.count = 2;
    assert_eq!(subs.notify(&state), 1);
    assert_eq!(subs.notify(&state), 0);
    state.count = 3;
    subs.notify(&state);
    assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
}

#[test]
fn unrelated_change_does_not_fire() {
    let mut state = State::default();
    let mut subs = Subscriptions::new();
    let (seen, cb) = recorder::<String>();
    subs.subscribe(&state, |s: &State| s.label.clone(), cb);

    state.count = 9;
    assert_eq!(subs.notify(&state), 0);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn unsubscribe_stops_callbacks() {
    let mut state = State::default();
    let mut subs = Subscriptions::new();
    let (seen, cb) = recorder::<u32>();
    let id = subs.subscribe(&state, |s: &State| s.count, cb);

    assert!(subs.unsubscribe(id));
    assert!(!subs.unsubscribe(id));
    state.count = 1;
    subs.notify(&state);
    assert!(seen.lock().unwrap().is_empty());
    assert!(subs.is_empty());
}

#[test]
fn ids_are_unique() {
    let state = State::default();
    let mut subs: Subscriptions<State> = Subscriptions::new();
    let a = subs.subscribe(&state, |s: &State| s.count, |_: &u32| {});
    let b = subs.subscribe(&state, |s: &State| s.count, |_: &u32| {});
    assert_ne!(a, b);
    assert_eq!(subs.len(), 2);
    assert_eq!(a.to_string(), "sub#1");
}
