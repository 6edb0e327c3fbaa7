//! Publish/subscribe plan-progress events (C8). Publishing is non-blocking
//! from the publisher's perspective; subscribers run synchronously, in
//! registration order, and a subscriber that panics never takes down the
//! publisher.

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

pub const TOPIC_PLAN_PROCESS: &str = "plan_process";

#[derive(Debug, Clone)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
}

pub type Subscriber = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: impl Into<String>, subscriber: Subscriber) {
        let mut subs = self.subscribers.lock().expect("event bus lock poisoned");
        subs.entry(topic.into()).or_default().push(subscriber);
    }

    /// Invokes every subscriber of `topic` in registration order. A
    /// subscriber panic is caught and logged, never propagated.
    pub fn publish(&self, topic: &str, payload: Value) {
        let event = Event {
            topic: topic.to_string(),
            payload,
        };
        let subs = {
            let guard = self.subscribers.lock().expect("event bus lock poisoned");
            guard.get(topic).cloned().unwrap_or_default()
        };
        for subscriber in subs {
            let result = catch_unwind(AssertUnwindSafe(|| subscriber(&event)));
            if result.is_err() {
                tracing::warn!(topic, "event subscriber panicked, continuing");
            }
        }
    }
}
