/// Notifications produced by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The local tip moved (one import or one revert completed).
    NewHeight,
    /// The coin set of this address changed.
    TouchedAddress(String),
}

/// Receives events synchronously from the emitting task. Handlers must not
/// re-enter the synchronizer.
pub trait Subscriber: Send {
    fn notify(&self, event: &Event);
}

struct FnSubscriber<F>(F);

impl<F: Fn(&Event) + Send> Subscriber for FnSubscriber<F> {
    fn notify(&self, event: &Event) {
        (self.0)(event)
    }
}

/// In-order, synchronous event dispatch to registered subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn subscribe_fn<F>(&mut self, handler: F)
    where
        F: Fn(&Event) + Send + 'static,
    {
        self.subscribers.push(Box::new(FnSubscriber(handler)));
    }

    pub fn emit(&self, event: &Event) {
        for subscriber in &self.subscribers {
            subscriber.notify(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn delivers_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        for tag in ["first", "second"] {
            let seen = seen.clone();
            bus.subscribe_fn(move |event: &Event| {
                seen.lock().unwrap().push((tag, event.clone()));
            });
        }

        bus.emit(&Event::NewHeight);
        bus.emit(&Event::TouchedAddress("addr".into()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], ("first", Event::NewHeight));
        assert_eq!(seen[1], ("second", Event::NewHeight));
        assert_eq!(seen[2], ("first", Event::TouchedAddress("addr".into())));
    }
}
