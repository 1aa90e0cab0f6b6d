use crate::animation::AnimationEvent;
use crate::camera::CameraMode;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Animation { actor: String, event: AnimationEvent },
    CameraModeChanged { mode: CameraMode },
    ExitRequested,
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::Animation { actor, event } => write!(f, "Animation actor={actor} {event}"),
            EngineEvent::CameraModeChanged { mode } => write!(f, "CameraModeChanged mode={}", mode.label()),
            EngineEvent::ExitRequested => write!(f, "ExitRequested"),
        }
    }
}

/// Events kept when nobody drains the bus; older ones are discarded first.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Bounded FIFO of engine events. Hosts drain it once per frame.
#[derive(Debug)]
pub struct EventBus {
    events: VecDeque<EngineEvent>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { events: VecDeque::with_capacity(capacity), capacity, dropped: 0 }
    }

    pub fn push(&mut self, event: EngineEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
            if self.dropped == 1 {
                log::warn!("event bus full ({} events); dropping the oldest until drained", self.capacity);
            }
        }
        self.events.push_back(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = EngineEvent>) {
        for event in events {
            self.push(event);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events discarded because the bus was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.dropped = 0;
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_bus_discards_oldest_events() {
        let mut bus = EventBus::with_capacity(2);
        bus.push(EngineEvent::CameraModeChanged { mode: CameraMode::FirstPerson });
        bus.push(EngineEvent::CameraModeChanged { mode: CameraMode::ThirdPerson });
        bus.push(EngineEvent::ExitRequested);
        assert_eq!(bus.len(), 2);
        assert_eq!(bus.dropped(), 1);
        assert_eq!(
            bus.drain(),
            vec![EngineEvent::CameraModeChanged { mode: CameraMode::ThirdPerson }, EngineEvent::ExitRequested]
        );
        assert!(bus.is_empty());
        assert_eq!(bus.dropped(), 0);
    }
}
