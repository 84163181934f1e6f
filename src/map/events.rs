//! Listener registry with one-shot subscriptions.
//!
//! A once-listener is removed before its callback runs, so it can never fire
//! twice no matter how many matching events are emitted afterwards.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

enum Callback<Ev, Ctx> {
    Repeat(Box<dyn FnMut(&Ev, &mut Ctx)>),
    Once(Box<dyn FnOnce(&Ev, &mut Ctx)>),
}

struct Listener<Ev, Ctx> {
    id: SubscriptionId,
    matches: Box<dyn Fn(&Ev) -> bool>,
    callback: Callback<Ev, Ctx>,
}

/// Event listeners that receive the event plus a mutable context.
pub struct EventBus<Ev, Ctx> {
    listeners: Vec<Listener<Ev, Ctx>>,
    next_id: u64,
}

impl<Ev, Ctx> Default for EventBus<Ev, Ctx> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
        }
    }
}

impl<Ev, Ctx> EventBus<Ev, Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        matches: impl Fn(&Ev) -> bool + 'static,
        callback: impl FnMut(&Ev, &mut Ctx) + 'static,
    ) -> SubscriptionId {
        self.push(Box::new(matches), Callback::Repeat(Box::new(callback)))
    }

    /// Register a listener that unsubscribes itself on first delivery.
    pub fn subscribe_once(
        &mut self,
        matches: impl Fn(&Ev) -> bool + 'static,
        callback: impl FnOnce(&Ev, &mut Ctx) + 'static,
    ) -> SubscriptionId {
        self.push(Box::new(matches), Callback::Once(Box::new(callback)))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        self.listeners.len() != before
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.listeners.iter().any(|listener| listener.id == id)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Deliver `event` to every matching listener in subscription order.
    /// Returns the number of callbacks invoked.
    pub fn emit(&mut self, event: &Ev, ctx: &mut Ctx) -> usize {
        let mut delivered = 0usize;
        let listeners = std::mem::take(&mut self.listeners);
        let mut kept = Vec::with_capacity(listeners.len());
        for listener in listeners {
            if !(listener.matches)(event) {
                kept.push(listener);
                continue;
            }
            delivered += 1;
            match listener.callback {
                Callback::Once(callback) => callback(event, ctx),
                Callback::Repeat(mut callback) => {
                    callback(event, ctx);
                    kept.push(Listener {
                        id: listener.id,
                        matches: listener.matches,
                        callback: Callback::Repeat(callback),
                    });
                }
            }
        }
        self.listeners = kept;
        delivered
    }

    fn push(
        &mut self,
        matches: Box<dyn Fn(&Ev) -> bool>,
        callback: Callback<Ev, Ctx>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            matches,
            callback,
        });
        id
    }
}
