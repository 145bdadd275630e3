// Playback controller: state machine, deferred play intent, event fan-out
// and the playhead polling loop.
//
// Every command, engine callback and poll tick is an `Input` applied on one
// serialization point: a re-entrant serial lock plus a FIFO mailbox. The
// thread holding the serial lock drains the mailbox, applying each input to
// `Core` and delivering the resulting events after `Core` is unlocked.

use crate::config::ControllerConfig;
use crate::engine::{EngineAdapter, EngineEvent, EngineEvents, PlaybackEngine};
use crate::error::{EngineError, PlaybackError, Result};
use crate::listener::{ListenerRegistry, PlayerEvent, PlayerListener};
use crate::poller::PollingLoop;
use crate::session::SessionHandle;
use crate::state::{Command, PlaybackState};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

#[derive(Debug)]
enum Input {
    Load(String),
    Play,
    Pause,
    Stop,
    Seek(u64),
    /// Engine half of a seek, applied once `SeekStarted` has been delivered
    IssueSeek(u64),
    Release,
    Engine { generation: u64, event: EngineEvent },
    Tick(u64),
}

struct Core {
    state: PlaybackState,
    playback_desired: bool,
    released: bool,
    /// Bumped on every load so callbacks from superseded loads are dropped
    generation: u64,
    engine: EngineAdapter,
    /// Armed polling loop; `Some` iff `state == Playing`
    poll: Option<PollingLoop>,
    next_poll_id: u64,
    last_error: Option<PlaybackError>,
}

#[derive(Default)]
struct Transition {
    events: Vec<PlayerEvent>,
    follow_up: Option<Input>,
}

struct Shared {
    /// The flag is set while a transition runs on the owning thread
    serial: ReentrantMutex<Cell<bool>>,
    mailbox: Mutex<VecDeque<Input>>,
    core: Mutex<Core>,
    listeners: ListenerRegistry,
    config: ControllerConfig,
    session: SessionHandle,
    this: Weak<Shared>,
}

impl Shared {
    /// Enqueue and apply before returning
    fn submit(&self, input: Input) {
        self.mailbox.lock().push_back(input);
        {
            let serial = self.serial.lock();
            if serial.get() {
                return;
            }
            self.drain(&serial);
        }
        self.pump();
    }

    /// Enqueue without blocking; the input is applied here if the serial
    /// lock is free, otherwise by whoever holds it
    fn offer(&self, input: Input) {
        self.mailbox.lock().push_back(input);
        self.pump();
    }

    fn pump(&self) {
        loop {
            {
                let Some(serial) = self.serial.try_lock() else {
                    return;
                };
                if serial.get() {
                    return;
                }
                self.drain(&serial);
            }
            // An input may have arrived between the last pop and the unlock
            if self.mailbox.lock().is_empty() {
                return;
            }
        }
    }

    fn drain(&self, busy: &Cell<bool>) {
        loop {
            let Some(input) = self.mailbox.lock().pop_front() else {
                return;
            };

            busy.set(true);
            let transition = {
                let mut core = self.core.lock();
                self.apply(&mut core, input)
            };
            busy.set(false);

            for event in &transition.events {
                self.listeners.dispatch(event);
            }
            if let Some(next) = transition.follow_up {
                self.mailbox.lock().push_front(next);
            }
        }
    }

    fn apply(&self, core: &mut Core, input: Input) -> Transition {
        let mut t = Transition::default();

        if core.released {
            match input {
                Input::Tick(_) | Input::Engine { .. } | Input::Release => {}
                other => log::warn!("Ignoring {:?}: {}", other, PlaybackError::Released),
            }
            return t;
        }

        let result = match input {
            Input::Load(url) => {
                self.load(core, &url, &mut t);
                Ok(())
            }
            Input::Play => {
                core.playback_desired = true;
                self.play(core, &mut t)
            }
            Input::Pause => self.pause(core, &mut t),
            Input::Stop => self.stop(core, &mut t),
            Input::Seek(position_ms) => self.seek(core, position_ms, &mut t),
            Input::IssueSeek(position_ms) => self.issue_seek(core, position_ms),
            Input::Release => {
                self.release(core);
                Ok(())
            }
            Input::Engine { generation, event } => {
                self.on_engine_event(core, generation, event, &mut t)
            }
            Input::Tick(id) => {
                self.tick(core, id, &mut t);
                Ok(())
            }
        };

        match result {
            Err(err @ PlaybackError::EngineState { .. }) => log::warn!("{}", err),
            Err(err) => log::error!("{}", err),
            Ok(()) => {}
        }
        t
    }

    fn guard(core: &Core, command: Command) -> Result<()> {
        if core.state.accepts(command) {
            Ok(())
        } else {
            Err(PlaybackError::EngineState {
                command,
                state: core.state,
            })
        }
    }

    /// The single place `state` changes. Leaving `Playing` disarms polling.
    fn enter(&self, core: &mut Core, state: PlaybackState) {
        if core.state != state {
            log::debug!("[{}] {} -> {}", self.session, core.state, state);
        }
        core.state = state;
        if state != PlaybackState::Playing && core.poll.take().is_some() {
            log::debug!("[{}] polling stopped", self.session);
        }
    }

    fn fail(&self, core: &mut Core, error: EngineError) -> PlaybackError {
        let error = PlaybackError::from(error);
        core.last_error = Some(error.clone());
        core.engine.mark_unprepared();
        self.enter(core, PlaybackState::Error);
        error
    }

    fn load(&self, core: &mut Core, url: &str, t: &mut Transition) {
        log::info!("[{}] load({})", self.session, url);
        core.generation += 1;
        core.last_error = None;
        self.enter(core, PlaybackState::Loading);
        let events = self.engine_events(core.generation);
        core.engine.load(url, events);
        t.events.push(PlayerEvent::AudioLoading);
    }

    fn play(&self, core: &mut Core, t: &mut Transition) -> Result<()> {
        log::debug!("[{}] play()", self.session);
        Self::guard(core, Command::Play)?;
        core.engine.start().map_err(|e| self.fail(core, e))?;
        self.enter(core, PlaybackState::Playing);
        t.events.push(PlayerEvent::PlayerPlaying);
        self.start_polling(core);
        Ok(())
    }

    /// Pause and stop can race the engine reaching the end of the stream on
    /// its own. A refused precondition keeps the current state and leaves it
    /// to the engine's queued event; returns whether the engine complied.
    fn engine_complied(
        &self,
        core: &mut Core,
        result: std::result::Result<(), EngineError>,
    ) -> Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(err @ EngineError::InvalidState { .. }) => {
                log::warn!("[{}] engine refused: {}", self.session, err);
                Ok(false)
            }
            Err(err) => Err(self.fail(core, err)),
        }
    }

    fn pause(&self, core: &mut Core, t: &mut Transition) -> Result<()> {
        log::debug!("[{}] pause()", self.session);
        core.playback_desired = false;
        Self::guard(core, Command::Pause)?;
        let result = core.engine.pause();
        if !self.engine_complied(core, result)? {
            return Ok(());
        }
        self.enter(core, PlaybackState::Paused);
        t.events.push(PlayerEvent::PlayerPaused);
        Ok(())
    }

    fn stop(&self, core: &mut Core, t: &mut Transition) -> Result<()> {
        log::debug!("[{}] stop()", self.session);
        core.playback_desired = false;
        Self::guard(core, Command::Stop)?;
        let result = core.engine.stop();
        if !self.engine_complied(core, result)? {
            return Ok(());
        }
        self.enter(core, PlaybackState::Stopped);
        t.events.push(PlayerEvent::PlayerStopped);
        Ok(())
    }

    fn seek(&self, core: &mut Core, position_ms: u64, t: &mut Transition) -> Result<()> {
        log::debug!(
            "[{}] seek() - playhead: {}ms, seek position: {}ms",
            self.session,
            core.engine.current_position_ms(),
            position_ms
        );
        Self::guard(core, Command::Seek)?;
        // Seeking has no state of its own, so observers hear about it before
        // the engine does; they can never see completion first
        t.events.push(PlayerEvent::SeekStarted);
        t.follow_up = Some(Input::IssueSeek(position_ms));
        Ok(())
    }

    fn issue_seek(&self, core: &mut Core, position_ms: u64) -> Result<()> {
        Self::guard(core, Command::Seek)?;
        core.engine
            .seek_to(position_ms)
            .map_err(|e| self.fail(core, e))
    }

    fn release(&self, core: &mut Core) {
        log::info!("[{}] release()", self.session);
        core.released = true;
        core.playback_desired = false;
        core.generation += 1;
        self.listeners.close();
        self.enter(core, PlaybackState::Idle);
        core.engine.release();
    }

    fn on_engine_event(
        &self,
        core: &mut Core,
        generation: u64,
        event: EngineEvent,
        t: &mut Transition,
    ) -> Result<()> {
        if generation != core.generation {
            log::debug!("[{}] dropping stale engine event {:?}", self.session, event);
            return Ok(());
        }

        match event {
            EngineEvent::Ready => {
                if core.state != PlaybackState::Loading {
                    log::warn!("[{}] engine ready while {}", self.session, core.state);
                    return Ok(());
                }
                core.engine.mark_prepared();
                t.events.push(PlayerEvent::AudioReady {
                    duration_ms: core.engine.duration_ms(),
                });
                self.enter(core, PlaybackState::Paused);
                if core.playback_desired {
                    // Same transition as a client play(), run in place
                    self.play(core, t)?;
                } else {
                    t.events.push(PlayerEvent::PlayerPaused);
                }
            }
            EngineEvent::BufferingProgress(percent) => {
                log::debug!("[{}] buffering {}%", self.session, percent);
                t.events.push(PlayerEvent::BufferingUpdate { percent });
            }
            EngineEvent::SeekCompleted => {
                let position_ms = core.engine.current_position_ms();
                log::debug!("[{}] seek completed at {}ms", self.session, position_ms);
                t.events.push(PlayerEvent::SeekCompleted { position_ms });
            }
            EngineEvent::PlaybackCompleted => {
                if core.state != PlaybackState::Playing {
                    log::debug!("[{}] completion ignored while {}", self.session, core.state);
                    return Ok(());
                }
                self.enter(core, PlaybackState::Completed);
                t.events.push(PlayerEvent::PlayerCompleted);
            }
            EngineEvent::Error(error) => {
                return Err(self.fail(core, error));
            }
        }
        Ok(())
    }

    fn tick(&self, core: &mut Core, id: u64, t: &mut Transition) {
        let armed = core.poll.as_ref().map(PollingLoop::id) == Some(id);
        if armed && core.state == PlaybackState::Playing {
            t.events.push(PlayerEvent::PlaybackUpdate {
                position_ms: core.engine.current_position_ms(),
                duration_ms: core.engine.duration_ms(),
            });
        }
    }

    fn start_polling(&self, core: &mut Core) {
        if core.poll.is_some() {
            return;
        }
        core.next_poll_id += 1;
        let id = core.next_poll_id;
        let shared = self.this.clone();
        let spawned = PollingLoop::spawn(id, self.config.poll_interval, move || {
            match shared.upgrade() {
                Some(shared) => shared.poll_tick(id),
                None => false,
            }
        });
        match spawned {
            Ok(poll) => {
                log::debug!("[{}] polling started", self.session);
                core.poll = Some(poll);
            }
            Err(err) => log::error!("[{}] failed to spawn polling thread: {}", self.session, err),
        }
    }

    /// Returns whether loop `id` is still armed
    fn poll_tick(&self, id: u64) -> bool {
        self.submit(Input::Tick(id));
        self.core.lock().poll.as_ref().map(PollingLoop::id) == Some(id)
    }

    fn engine_events(&self, generation: u64) -> EngineEvents {
        let shared = self.this.clone();
        EngineEvents::new(move |event| {
            if let Some(shared) = shared.upgrade() {
                shared.offer(Input::Engine { generation, event });
            }
        })
    }
}

/// Client-facing playback controller.
///
/// Commands never fail from the caller's point of view: a command that is
/// invalid for the current state is logged and ignored, because UIs
/// routinely race their own state against asynchronous readiness.
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new<E: PlaybackEngine + 'static>(engine: E) -> Self {
        Self::with_config(engine, ControllerConfig::default())
    }

    pub fn with_config<E: PlaybackEngine + 'static>(engine: E, config: ControllerConfig) -> Self {
        let session = SessionHandle::allocate();
        log::info!("Creating playback controller {}", session);

        let shared = Arc::new_cyclic(|this| Shared {
            serial: ReentrantMutex::new(Cell::new(false)),
            mailbox: Mutex::new(VecDeque::new()),
            core: Mutex::new(Core {
                state: PlaybackState::Idle,
                playback_desired: false,
                released: false,
                generation: 0,
                engine: EngineAdapter::new(Box::new(engine)),
                poll: None,
                next_poll_id: 0,
                last_error: None,
            }),
            listeners: ListenerRegistry::new(),
            config,
            session,
            this: this.clone(),
        });

        Self { shared }
    }

    pub fn session(&self) -> SessionHandle {
        self.shared.session
    }

    /// Start loading `url`. Playback does not start unless `play` was (or
    /// will be) requested.
    pub fn load(&self, url: &str) {
        self.shared.submit(Input::Load(url.to_string()));
    }

    /// Request playback. If the source is still loading the request is
    /// remembered and honoured once the engine is ready.
    pub fn play(&self) {
        self.shared.submit(Input::Play);
    }

    pub fn pause(&self) {
        self.shared.submit(Input::Pause);
    }

    pub fn stop(&self) {
        self.shared.submit(Input::Stop);
    }

    pub fn seek(&self, position_ms: u64) {
        self.shared.submit(Input::Seek(position_ms));
    }

    /// Terminal. Safe from any state, any thread and any callback; once it
    /// returns no further event reaches any listener. Does not wait for the
    /// engine to wind down. Afterwards `state()` reads `Idle` and
    /// `is_released()` is true.
    pub fn release(&self) {
        self.shared.submit(Input::Release);
    }

    /// Current state. A released controller reports `Idle`; use
    /// `is_released` to tell it apart from one that never loaded.
    pub fn state(&self) -> PlaybackState {
        self.shared.core.lock().state
    }

    pub fn is_audio_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PlaybackState::Stopped
    }

    pub fn is_completed(&self) -> bool {
        self.state() == PlaybackState::Completed
    }

    pub fn is_released(&self) -> bool {
        self.shared.core.lock().released
    }

    pub fn audio_length_ms(&self) -> u64 {
        self.shared.core.lock().engine.duration_ms()
    }

    pub fn playback_position_ms(&self) -> u64 {
        self.shared.core.lock().engine.current_position_ms()
    }

    /// Why the controller entered `Error`, cleared by the next load
    pub fn last_error(&self) -> Option<PlaybackError> {
        self.shared.core.lock().last_error.clone()
    }

    /// Register an observer. The controller only holds it weakly.
    pub fn add_listener<L: PlayerListener + 'static>(&self, listener: &Arc<L>) {
        self.shared.listeners.add(listener);
    }

    pub fn remove_listener<L: PlayerListener + 'static>(&self, listener: &Arc<L>) {
        self.shared.listeners.remove(listener);
    }

    #[cfg(test)]
    fn is_polling(&self) -> bool {
        self.shared.core.lock().poll.is_some()
    }

    #[cfg(test)]
    fn armed_poll_id(&self) -> Option<u64> {
        self.shared.core.lock().poll.as_ref().map(PollingLoop::id)
    }

    #[cfg(test)]
    fn inject_tick(&self, id: u64) {
        self.shared.submit(Input::Tick(id));
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.release();
    }
}
