// File: crates/storm-hosts/src/messenger.rs
// Description: Topic-keyed publish/subscribe event bus
// Local instances namespace their topics by a unique id so two messengers
// on the same process-wide bus don't collide; `global` exposes a single
// shared instance for callers that want one without threading it through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Anything that can travel over the bus. `storm-hosts` events are the
/// closed [`crate::event::HostEvent`]/[`crate::event::AnimationEvent`]
/// sums; this trait just lets `Messenger` stay generic over them instead
/// of depending on the event module.
pub trait MessengerValue: Clone + 'static {}
impl<T: Clone + 'static> MessengerValue for T {}

type Listener<V> = Box<dyn FnMut(&V)>;

struct Subscription<V> {
    id: u64,
    callback: Listener<V>,
}

/// A single-threaded, synchronous publish/subscribe bus.
///
/// `emit` runs every matching listener synchronously, in registration
/// order, before returning - there is no queueing and no cross-thread
/// delivery, matching the rest of the core's single-threaded cooperative
/// scheduling.
pub struct Messenger<V> {
    id: u64,
    next_subscription_id: u64,
    topics: HashMap<String, Vec<Subscription<V>>>,
}

static NEXT_MESSENGER_ID: AtomicU64 = AtomicU64::new(1);

impl<V: MessengerValue> Default for Messenger<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: MessengerValue> Messenger<V> {
    pub fn new() -> Self {
        Self {
            id: NEXT_MESSENGER_ID.fetch_add(1, Ordering::Relaxed),
            next_subscription_id: 0,
            topics: HashMap::new(),
        }
    }

    /// The namespacing id mixed into `onAddLayerEvent`-style topic prefixes
    /// so two messengers sharing a process never collide.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subscribes `callback` to `topic`; returns a handle that can be
    /// passed to [`Messenger::stop_listening`].
    pub fn listen_to(&mut self, topic: impl Into<String>, callback: impl FnMut(&V) + 'static) -> ListenerHandle {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.topics
            .entry(topic.into())
            .or_default()
            .push(Subscription { id, callback: Box::new(callback) });
        ListenerHandle(id)
    }

    /// Removes a specific listener from `topic`, or every listener on
    /// `topic` if `handle` is `None`.
    pub fn stop_listening(&mut self, topic: &str, handle: Option<ListenerHandle>) {
        match handle {
            Some(h) => {
                if let Some(subs) = self.topics.get_mut(topic) {
                    subs.retain(|s| s.id != h.0);
                }
            }
            None => {
                self.topics.remove(topic);
            }
        }
    }

    /// Removes every listener on every topic whose name matches `pattern`
    /// (a simple substring match; topics here are flat strings, not
    /// regex-capable paths), optionally restricted to one handle.
    pub fn stop_listening_matching(&mut self, pattern: &str, handle: Option<ListenerHandle>) {
        let matching: Vec<String> = self
            .topics
            .keys()
            .filter(|topic| topic.contains(pattern))
            .cloned()
            .collect();
        for topic in matching {
            self.stop_listening(&topic, handle);
        }
    }

    pub fn stop_listening_to_all(&mut self) {
        self.topics.clear();
    }

    /// Runs every listener on `topic` synchronously, in registration
    /// order.
    pub fn emit(&mut self, topic: &str, value: &V) {
        if let Some(subs) = self.topics.get_mut(topic) {
            for sub in subs.iter_mut() {
                (sub.callback)(value);
            }
        }
    }

    pub fn has_listeners(&self, topic: &str) -> bool {
        self.topics.get(topic).map_or(false, |v| !v.is_empty())
    }
}

/// Opaque handle returned by [`Messenger::listen_to`], used to remove a
/// single listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// A process-wide messenger for a given event value type. Callers own the
/// instance (typically behind a `static` of their own) rather than reaching
/// for a module-level singleton, so it stays an explicit dependency like
/// any other `&Messenger` - just one built to be shared across a process
/// rather than owned by one feature.
pub struct GlobalMessenger<V>(Mutex<Messenger<V>>);

impl<V: MessengerValue> GlobalMessenger<V> {
    pub fn new() -> Self {
        GlobalMessenger(Mutex::new(Messenger::new()))
    }

    pub fn listen_to(&self, topic: impl Into<String>, callback: impl FnMut(&V) + 'static) -> ListenerHandle {
        self.0.lock().listen_to(topic, callback)
    }

    pub fn stop_listening(&self, topic: &str, handle: Option<ListenerHandle>) {
        self.0.lock().stop_listening(topic, handle);
    }

    pub fn stop_listening_to_all(&self) {
        self.0.lock().stop_listening_to_all();
    }

    pub fn emit(&self, topic: &str, value: &V) {
        self.0.lock().emit(topic, value);
    }
}
