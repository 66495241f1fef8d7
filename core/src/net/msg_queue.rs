//! Deferred event queue
//!
//! Network receipt happens while polling, but game and script callbacks may
//! only run during the simulation tick. Inbound chat, beacon and AI-message
//! events are parked here in receipt order and fired on the next tick.

use std::collections::VecDeque;

/// Capacity used when no configuration overrides it
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredKind {
    Beacon,
    AiMessage,
    VideoQuit,
}

/// A parked event, handed to the callback by value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEvent {
    pub kind: DeferredKind,
    pub from_slot: usize,
    pub to_slot: usize,
    pub text: String,
    pub x: i32,
    pub y: i32,
}

impl DeferredEvent {
    pub fn ai_message(from_slot: usize, to_slot: usize, text: impl Into<String>) -> Self {
        Self {
            kind: DeferredKind::AiMessage,
            from_slot,
            to_slot,
            text: text.into(),
            x: 0,
            y: 0,
        }
    }

    pub fn beacon(from_slot: usize, to_slot: usize, x: i32, y: i32, text: impl Into<String>) -> Self {
        Self {
            kind: DeferredKind::Beacon,
            from_slot,
            to_slot,
            text: text.into(),
            x,
            y,
        }
    }

    pub fn video_quit() -> Self {
        Self {
            kind: DeferredKind::VideoQuit,
            from_slot: 0,
            to_slot: 0,
            text: String::new(),
            x: 0,
            y: 0,
        }
    }
}

/// Game/script side of the queue
pub trait ScriptCallbacks {
    fn on_beacon(&mut self, event: DeferredEvent);
    fn on_ai_message(&mut self, event: DeferredEvent);
    fn on_video_quit(&mut self, event: DeferredEvent);
}

/// Collects fired events in order
impl ScriptCallbacks for Vec<DeferredEvent> {
    fn on_beacon(&mut self, event: DeferredEvent) {
        self.push(event);
    }

    fn on_ai_message(&mut self, event: DeferredEvent) {
        self.push(event);
    }

    fn on_video_quit(&mut self, event: DeferredEvent) {
        self.push(event);
    }
}

/// Push failed because the queue is at capacity. Carries the event back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("deferred event queue is full ({capacity} entries)")]
pub struct QueueFullError {
    pub capacity: usize,
    pub event: DeferredEvent,
}

/// Bounded FIFO of deferred events
#[derive(Debug, Clone)]
pub struct DeferredEventQueue {
    entries: VecDeque<DeferredEvent>,
    capacity: usize,
}

impl Default for DeferredEventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl DeferredEventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event; never blocks
    pub fn push(&mut self, event: DeferredEvent) -> Result<(), QueueFullError> {
        if self.entries.len() >= self.capacity {
            return Err(QueueFullError {
                capacity: self.capacity,
                event,
            });
        }
        self.entries.push_back(event);
        Ok(())
    }

    /// Remove the oldest event and fire its callback
    ///
    /// Returns false if the queue was empty.
    pub fn pop_and_fire<C: ScriptCallbacks + ?Sized>(&mut self, callbacks: &mut C) -> bool {
        let Some(event) = self.entries.pop_front() else {
            return false;
        };
        match event.kind {
            DeferredKind::Beacon => callbacks.on_beacon(event),
            DeferredKind::AiMessage => callbacks.on_ai_message(event),
            DeferredKind::VideoQuit => callbacks.on_video_quit(event),
        }
        true
    }

    /// Fire up to `max` events in order, returning how many fired
    pub fn fire_pending<C: ScriptCallbacks + ?Sized>(&mut self, callbacks: &mut C, max: usize) -> usize {
        let mut fired = 0;
        while fired < max && self.pop_and_fire(callbacks) {
            fired += 1;
        }
        fired
    }

    pub fn peek(&self) -> Option<&DeferredEvent> {
        self.entries.front()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop everything, as at game start
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = DeferredEventQueue::default();
        let e1 = DeferredEvent::ai_message(0, 3, "first");
        let e2 = DeferredEvent::beacon(1, 3, 10, 20, "second");
        let e3 = DeferredEvent::ai_message(2, 3, "third");

        queue.push(e1.clone()).unwrap();
        queue.push(e2.clone()).unwrap();
        queue.push(e3.clone()).unwrap();
        assert_eq!(queue.count(), 3);

        let mut fired = Vec::new();
        assert!(queue.pop_and_fire(&mut fired));
        assert!(queue.pop_and_fire(&mut fired));
        assert!(queue.pop_and_fire(&mut fired));
        assert!(!queue.pop_and_fire(&mut fired));

        assert_eq!(fired, vec![e1, e2, e3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_fails_when_full() {
        let mut queue = DeferredEventQueue::new(2);
        queue.push(DeferredEvent::video_quit()).unwrap();
        queue.push(DeferredEvent::video_quit()).unwrap();

        let rejected = DeferredEvent::ai_message(1, 2, "late");
        let err = queue.push(rejected.clone()).unwrap_err();
        assert_eq!(err.capacity, 2);
        assert_eq!(err.event, rejected);
        assert_eq!(queue.count(), 2);
    }

    #[test]
    fn test_space_frees_after_pop() {
        let mut queue = DeferredEventQueue::new(1);
        queue.push(DeferredEvent::video_quit()).unwrap();
        assert!(queue.push(DeferredEvent::video_quit()).is_err());
        queue.pop_and_fire(&mut Vec::new());
        assert!(queue.push(DeferredEvent::video_quit()).is_ok());
    }

    #[test]
    fn test_default_capacity() {
        let mut queue = DeferredEventQueue::default();
        for i in 0..DEFAULT_QUEUE_CAPACITY {
            queue.push(DeferredEvent::ai_message(0, 1, format!("{i}"))).unwrap();
        }
        assert!(queue.push(DeferredEvent::video_quit()).is_err());
    }

    #[test]
    fn test_fire_pending_respects_limit() {
        let mut queue = DeferredEventQueue::default();
        for i in 0..5 {
            queue.push(DeferredEvent::ai_message(0, 1, format!("{i}"))).unwrap();
        }
        let mut fired = Vec::new();
        assert_eq!(queue.fire_pending(&mut fired, 2), 2);
        assert_eq!(queue.count(), 3);
        assert_eq!(fired[0].text, "0");
        assert_eq!(fired[1].text, "1");
        assert_eq!(queue.peek().map(|e| e.text.as_str()), Some("2"));
    }

    #[derive(Default)]
    struct Counting {
        beacons: usize,
        ai: usize,
        quits: usize,
    }

    impl ScriptCallbacks for Counting {
        fn on_beacon(&mut self, _event: DeferredEvent) {
            self.beacons += 1;
        }
        fn on_ai_message(&mut self, _event: DeferredEvent) {
            self.ai += 1;
        }
        fn on_video_quit(&mut self, _event: DeferredEvent) {
            self.quits += 1;
        }
    }

    #[test]
    fn test_routes_by_kind() {
        let mut queue = DeferredEventQueue::default();
        queue.push(DeferredEvent::beacon(0, 1, 0, 0, "")).unwrap();
        queue.push(DeferredEvent::ai_message(0, 1, "")).unwrap();
        queue.push(DeferredEvent::video_quit()).unwrap();
        queue.push(DeferredEvent::beacon(0, 1, 0, 0, "")).unwrap();

        let mut counting = Counting::default();
        queue.fire_pending(&mut counting, usize::MAX);
        assert_eq!((counting.beacons, counting.ai, counting.quits), (2, 1, 1));
    }

    #[test]
    fn test_reset_clears() {
        let mut queue = DeferredEventQueue::default();
        queue.push(DeferredEvent::video_quit()).unwrap();
        queue.reset();
        assert!(queue.is_empty());
    }
}
