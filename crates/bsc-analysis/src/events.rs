//! Explicit signal/slot graph (spec.md §9 "Event-driven parent linkage →
//! explicit signal graph"). Each [`SignalBus`] is an append-only list of
//! listeners during a single `emit`; a listener added mid-dispatch sees
//! only subsequent events (spec.md §5). Every [`SubscriptionHandle`] is
//! owned by exactly one object and releases itself on `Drop`, satisfying
//! §5's "subscribers must call their handle on disposal" by making release
//! automatic rather than advisory.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct BusInner<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A bus of listeners for events of type `T`. Cloning a `SignalBus` shares
/// the same underlying listener list (it is a handle, not a copy).
pub struct SignalBus<T> {
    inner: Rc<RefCell<BusInner<T>>>,
}

impl<T> Clone for SignalBus<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> Default for SignalBus<T> {
    fn default() -> Self {
        Self { inner: Rc::new(RefCell::new(BusInner { next_id: 0, listeners: Vec::new() })) }
    }
}

impl<T> SignalBus<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl FnMut(&T) + 'static) -> SubscriptionHandle<T> {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Rc::new(RefCell::new(listener))));
            id
        };
        SubscriptionHandle { bus: Rc::downgrade(&self.inner), id }
    }

    /// Dispatches `event` to a snapshot of the current listener list, so
    /// listeners registered by a callback run during this emission do not
    /// themselves fire for this same event.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self.inner.borrow().listeners.iter().map(|(_, l)| l.clone()).collect();
        for listener in snapshot {
            (listener.borrow_mut())(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// An opaque handle returned by [`SignalBus::subscribe`]. Dropping it
/// unsubscribes; there is no separate `unsubscribe` method because the
/// failure mode spec.md §5 warns about (a dangling listener after its
/// owner disposes) can only be closed by making release unconditional.
pub struct SubscriptionHandle<T> {
    bus: Weak<RefCell<BusInner<T>>>,
    id: u64,
}

impl<T> Drop for SubscriptionHandle<T> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.borrow_mut().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    #[test]
    fn emits_to_subscribers() {
        let bus: SignalBus<i32> = SignalBus::new();
        let seen = StdRc::new(Cell::new(0));
        let seen2 = seen.clone();
        let _handle = bus.subscribe(move |v| seen2.set(seen2.get() + v));
        bus.emit(&5);
        bus.emit(&2);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn drop_unsubscribes() {
        let bus: SignalBus<i32> = SignalBus::new();
        let seen = StdRc::new(Cell::new(0));
        let seen2 = seen.clone();
        let handle = bus.subscribe(move |v| seen2.set(seen2.get() + v));
        drop(handle);
        bus.emit(&5);
        assert_eq!(seen.get(), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn listener_added_during_dispatch_is_not_called_for_current_event() {
        let bus: SignalBus<i32> = SignalBus::new();
        let seen = StdRc::new(Cell::new(0));
        let bus2 = bus.clone();
        let seen_outer = seen.clone();
        let handles: StdRc<RefCell<Vec<SubscriptionHandle<i32>>>> = StdRc::new(RefCell::new(Vec::new()));
        let handles2 = handles.clone();
        let _first = bus.subscribe(move |_| {
            let seen3 = seen_outer.clone();
            let h = bus2.subscribe(move |v| seen3.set(seen3.get() + v));
            handles2.borrow_mut().push(h);
        });
        bus.emit(&100);
        assert_eq!(seen.get(), 0, "listener registered during dispatch must not see the same event");
        bus.emit(&1);
        assert_eq!(seen.get(), 1);
        let _keep = handles;
    }
}
