use crate::events::{Event, Topic};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// A subscriber. It receives the bus so it can publish follow-up events.
pub type Handler = Rc<dyn Fn(&EventBus, &Event)>;

/// Synchronous, in-process publish/subscribe dispatcher.
///
/// `publish` runs every handler of the event's topic in registration order,
/// on the caller's stack, before returning. Handlers may publish again; the
/// subscriber table is not borrowed while handlers run, so re-entrant
/// cascades are fine. There is no cycle detection: two handlers that keep
/// republishing into each other's topics will recurse until the stack runs out.
#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<HashMap<Topic, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: Topic, handler: F)
    where
        F: Fn(&EventBus, &Event) + 'static,
    {
        self.subscribers
            .borrow_mut()
            .entry(topic)
            .or_default()
            .push(Rc::new(handler));
    }

    pub fn publish(&self, event: Event) {
        let handlers: Vec<Handler> = self
            .subscribers
            .borrow()
            .get(&event.topic())
            .cloned()
            .unwrap_or_default();

        debug!("publish {} to {} handler(s)", event.topic(), handlers.len());
        for handler in handlers {
            handler(self, &event);
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers.borrow().get(&topic).map_or(0, Vec::len)
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let subscribers = self.subscribers.borrow();
        let mut counts: Vec<(Topic, usize)> =
            subscribers.iter().map(|(t, h)| (*t, h.len())).collect();
        counts.sort();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}
