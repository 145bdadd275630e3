// Player events and the observer registry they are fanned out through

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Player event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A source started loading
    AudioLoading,

    /// The source has buffered to the given percent
    BufferingUpdate { percent: u8 },

    /// The source can be played; followed by either `PlayerPlaying` or
    /// `PlayerPaused`
    AudioReady { duration_ms: u64 },

    /// Playback started, from paused or right after readiness
    PlayerPlaying,

    /// Periodic playhead update while playing
    PlaybackUpdate { position_ms: u64, duration_ms: u64 },

    PlayerPaused,

    /// Playback ceased; a new load is needed to play again
    PlayerStopped,

    /// Playback reached the end of the source
    PlayerCompleted,

    SeekStarted,

    SeekCompleted { position_ms: u64 },
}

/// Player observer trait
/// Implementations should be lightweight; they may call back into the
/// controller from inside `on_event`
pub trait PlayerListener: Send + Sync {
    fn on_event(&self, event: PlayerEvent);
}

/// Weakly held set of observers with snapshot fan-out
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Weak<dyn PlayerListener>>>,
    closed: AtomicBool,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Register an observer. Registering the same observer twice is a no-op.
    pub fn add<L: PlayerListener + 'static>(&self, listener: &Arc<L>) {
        if self.closed.load(Ordering::Acquire) {
            log::debug!("Ignoring listener registration on a released player");
            return;
        }
        let weak: Weak<dyn PlayerListener> = Arc::<L>::downgrade(listener);
        let mut listeners = self.listeners.lock();
        listeners.retain(|existing| existing.strong_count() > 0);
        if !listeners.iter().any(|existing| existing.ptr_eq(&weak)) {
            listeners.push(weak);
        }
    }

    pub fn remove<L: PlayerListener + 'static>(&self, listener: &Arc<L>) {
        let weak: Weak<dyn PlayerListener> = Arc::<L>::downgrade(listener);
        self.listeners
            .lock()
            .retain(|existing| existing.strong_count() > 0 && !existing.ptr_eq(&weak));
    }

    /// Number of live observers
    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|existing| existing.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every observer and refuse new ones. Fan-outs already in flight
    /// stop before their next observer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.listeners.lock().clear();
    }

    pub fn dispatch(&self, event: &PlayerEvent) {
        // Copy the set so observers can mutate the registry from the callback
        let snapshot: Vec<Weak<dyn PlayerListener>> = self.listeners.lock().clone();
        for weak in snapshot {
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            if let Some(listener) = weak.upgrade() {
                listener.on_event(event.clone());
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener that records every event, for tests
#[cfg(test)]
pub struct RecordingListener {
    events: Mutex<Vec<PlayerEvent>>,
}

#[cfg(test)]
impl RecordingListener {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn count(&self, predicate: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

#[cfg(test)]
impl PlayerListener for RecordingListener {
    fn on_event(&self, event: PlayerEvent) {
        self.events.lock().push(event);
    }
}
