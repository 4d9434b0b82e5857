//! Selector-based change notifications.
//!
//! A subscriber hands in a selector (a pure projection of the state) and a
//! callback. After every mutation the owner calls [`Subscriptions::notify`];
//! each selector runs again and its callback fires only when the projected
//! value differs from the last one it saw. Render surfaces use this to
//! repaint only the slices they care about.

#[cfg(test)]
#[path = "subscribe_test.rs"]
mod subscribe_test;

use std::fmt;

/// Handle returned by [`Subscriptions::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Re-runs the selector; returns whether the callback fired.
type Check<S> = Box<dyn FnMut(&S) -> bool + Send>;

/// Registry of selector subscriptions over a state type `S`.
pub struct Subscriptions<S> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Check<S>)>,
}

impl<S> Default for Subscriptions<S> {
    fn default() -> Self {
        Self { next_id: 1, entries: Vec::new() }
    }
}

impl<S> fmt::Debug for Subscriptions<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions").field("len", &self.entries.len()).finish()
    }
}

impl<S> Subscriptions<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` on changes of `selector(state)`.
    ///
    /// The current value is captured immediately and does not fire.
    pub fn subscribe<T, Sel, Cb>(&mut self, state: &S, selector: Sel, mut callback: Cb) -> SubscriptionId
    where
        T: PartialEq + Send + 'static,
        Sel: Fn(&S) -> T + Send + 'static,
        Cb: FnMut(&T) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let mut last = selector(state);
        let check: Check<S> = Box::new(move |s: &S| {
            let next = selector(s);
            if next == last {
                return false;
            }
            callback(&next);
            last = next;
            true
        });
        self.entries.push((id, check));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Re-evaluate every selector against `state`. Returns how many callbacks fired.
    pub fn notify(&mut self, state: &S) -> usize {
        self.entries.iter_mut().map(|(_, check)| check(state)).filter(|fired| *fired).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
