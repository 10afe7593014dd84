//! Synchronous publish/subscribe primitives.
//!
//! A [`Hub`] fans values out to every live [`Subscription`] in subscription
//! order. Each subscription owns an inbox that its holder drains on the event
//! loop thread. Dropping a subscription removes it from the hub immediately.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

type Inbox<T> = Rc<RefCell<VecDeque<T>>>;

struct HubInner<T> {
    next_id: u64,
    inboxes: Vec<(u64, Inbox<T>)>,
}

pub struct Hub<T> {
    inner: Rc<RefCell<HubInner<T>>>,
}

impl<T> Default for Hub<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HubInner {
                next_id: 0,
                inboxes: Vec::new(),
            })),
        }
    }
}

impl<T: Clone> Hub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let inbox: Inbox<T> = Rc::new(RefCell::new(VecDeque::new()));
        inner.inboxes.push((id, Rc::clone(&inbox)));
        Subscription {
            id,
            inbox,
            hub: Rc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, value: T) {
        let inner = self.inner.borrow();
        for (_, inbox) in &inner.inboxes {
            inbox.borrow_mut().push_back(value.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().inboxes.len()
    }
}

pub struct Subscription<T> {
    id: u64,
    inbox: Inbox<T>,
    hub: Weak<RefCell<HubInner<T>>>,
}

impl<T> Subscription<T> {
    pub fn drain(&self) -> Vec<T> {
        self.inbox.borrow_mut().drain(..).collect()
    }

}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.borrow_mut().inboxes.retain(|(id, _)| *id != self.id);
        }
    }
}

/// An observable value: every change is published to the store's hub.
pub struct Store<T> {
    value: T,
    hub: Hub<T>,
}

impl<T: Clone + PartialEq> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            hub: Hub::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn subscribe(&self) -> Subscription<T> {
        self.hub.subscribe()
    }

    /// Replaces the value and notifies subscribers if it changed.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.hub.publish(self.value.clone());
        true
    }

    pub fn update(&mut self, apply: impl FnOnce(&mut T)) -> bool {
        let mut next = self.value.clone();
        apply(&mut next);
        self.set(next)
    }
}
