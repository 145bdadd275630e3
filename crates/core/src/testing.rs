// Scripted engine double for controller tests

use crate::engine::{EngineEvent, EngineEvents, PlaybackEngine};
use crate::error::EngineError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Engine command as observed by the scripted engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Load(String),
    Start,
    Pause,
    Stop,
    SeekTo(u64),
    Release,
}

#[derive(Default)]
struct Script {
    calls: Vec<EngineCall>,
    events: Option<EngineEvents>,
    prepared: bool,
    started_unprepared: bool,
    position_ms: u64,
    duration_ms: u64,
    fail_next_start: Option<EngineError>,
    fail_next_pause: Option<EngineError>,
    ready_on_load: bool,
    seek_completes_inline: bool,
}

/// Engine whose callbacks are fired by the test through an `EngineHandle`
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

/// Test-side view of a `ScriptedEngine`
#[derive(Clone)]
pub struct EngineHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            script: self.script.clone(),
        }
    }
}

impl PlaybackEngine for ScriptedEngine {
    fn load(&mut self, source_uri: &str, events: EngineEvents) {
        let ready_now = {
            let mut script = self.script.lock();
            script.calls.push(EngineCall::Load(source_uri.to_string()));
            script.events = Some(events.clone());
            script.prepared = script.ready_on_load;
            script.ready_on_load
        };
        if ready_now {
            events.ready();
        }
    }

    fn start(&mut self) -> Result<(), EngineError> {
        let mut script = self.script.lock();
        script.calls.push(EngineCall::Start);
        if !script.prepared {
            script.started_unprepared = true;
            return Err(EngineError::InvalidState {
                operation: "start",
                status: "preparing".into(),
            });
        }
        match script.fail_next_start.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        let mut script = self.script.lock();
        script.calls.push(EngineCall::Pause);
        match script.fail_next_pause.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.script.lock().calls.push(EngineCall::Stop);
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError> {
        let inline = {
            let mut script = self.script.lock();
            script.calls.push(EngineCall::SeekTo(position_ms));
            script.position_ms = position_ms;
            if script.seek_completes_inline {
                script.events.clone()
            } else {
                None
            }
        };
        if let Some(events) = inline {
            events.seek_completed();
        }
        Ok(())
    }

    fn current_position_ms(&self) -> u64 {
        self.script.lock().position_ms
    }

    fn duration_ms(&self) -> u64 {
        self.script.lock().duration_ms
    }

    fn release(&mut self) {
        let mut script = self.script.lock();
        script.calls.push(EngineCall::Release);
        script.events = None;
    }
}

impl EngineHandle {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.script.lock().calls.clone()
    }

    pub fn started_unprepared(&self) -> bool {
        self.script.lock().started_unprepared
    }

    pub fn set_position(&self, position_ms: u64, duration_ms: u64) {
        let mut script = self.script.lock();
        script.position_ms = position_ms;
        script.duration_ms = duration_ms;
    }

    pub fn fail_next_start(&self, error: EngineError) {
        self.script.lock().fail_next_start = Some(error);
    }

    pub fn fail_next_pause(&self, error: EngineError) {
        self.script.lock().fail_next_pause = Some(error);
    }

    pub fn ready_on_load(&self, enabled: bool) {
        self.script.lock().ready_on_load = enabled;
    }

    pub fn seek_completes_inline(&self, enabled: bool) {
        self.script.lock().seek_completes_inline = enabled;
    }

    /// Sink handed over by the most recent `load`
    pub fn events(&self) -> Option<EngineEvents> {
        self.script.lock().events.clone()
    }

    /// Fire a callback through the sink of the most recent `load`
    pub fn fire(&self, event: EngineEvent) {
        let events = {
            let mut script = self.script.lock();
            if event == EngineEvent::Ready {
                script.prepared = true;
            }
            script.events.clone()
        };
        if let Some(events) = events {
            events.emit(event);
        }
    }

    pub fn ready(&self) {
        self.fire(EngineEvent::Ready);
    }

    pub fn complete(&self) {
        self.fire(EngineEvent::PlaybackCompleted);
    }
}
