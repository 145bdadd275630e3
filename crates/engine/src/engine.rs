// Symphonia-backed playback engine
// One worker thread per load decodes the source and renders it to an output

use crate::decoder::AudioDecoder;
use crate::output::{AudioOutput, ClockOutput, OutputFactory};
use crate::source::{open_source, SourceLocation};
use parking_lot::{Condvar, Mutex};
use playhead_core::{EngineError, EngineEvents, PlaybackEngine};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Engine-side lifecycle, distinct from the controller's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Preparing,
    Prepared,
    Started,
    Paused,
    Stopped,
    Completed,
    Error,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStatus::Idle => "idle",
            EngineStatus::Preparing => "preparing",
            EngineStatus::Prepared => "prepared",
            EngineStatus::Started => "started",
            EngineStatus::Paused => "paused",
            EngineStatus::Stopped => "stopped",
            EngineStatus::Completed => "completed",
            EngineStatus::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    position_ms: u64,
    /// Whether the controller asked for it and expects `seek_completed`
    notify: bool,
}

struct Control {
    status: EngineStatus,
    pending_seek: Option<PendingSeek>,
}

/// State shared between the engine handle and the worker of one load
struct Session {
    control: Mutex<Control>,
    wake: Condvar,
    cancelled: AtomicBool,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
}

impl Session {
    fn new() -> Self {
        Self {
            control: Mutex::new(Control {
                status: EngineStatus::Preparing,
                pending_seek: None,
            }),
            wake: Condvar::new(),
            cancelled: AtomicBool::new(false),
            position_ms: AtomicU64::new(0),
            duration_ms: AtomicU64::new(0),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        // Take the lock so a worker between its check and its wait sees it
        let _control = self.control.lock();
        self.wake.notify_all();
    }

    /// Move to `status` unless the load was cancelled; returns whether it did
    fn settle(&self, status: EngineStatus) -> bool {
        let mut control = self.control.lock();
        if self.is_cancelled() {
            return false;
        }
        control.status = status;
        true
    }
}

/// Playback engine decoding with Symphonia.
///
/// Every `load` starts a fresh worker; commands only update shared state
/// and wake it, so they never block on decoding or I/O. Superseded workers
/// are cancelled and left to exit on their own.
pub struct SymphoniaEngine {
    output: OutputFactory,
    session: Option<Arc<Session>>,
    released: bool,
}

impl SymphoniaEngine {
    /// Engine rendering to a real-time paced clock
    pub fn new() -> Self {
        Self::with_output(|| Box::new(ClockOutput::new()))
    }

    /// Engine rendering through outputs created by `factory` on the worker
    pub fn with_output<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn AudioOutput> + Send + Sync + 'static,
    {
        Self {
            output: Arc::new(factory),
            session: None,
            released: false,
        }
    }

    /// Engine playing through the default device
    #[cfg(feature = "cpal")]
    pub fn with_default_device() -> Self {
        Self::with_output(|| Box::new(crate::output::CpalOutput::new()))
    }

    pub fn status(&self) -> EngineStatus {
        match &self.session {
            Some(session) => session.control.lock().status,
            None => EngineStatus::Idle,
        }
    }

    /// Cancel the current load without waiting for its worker. A worker
    /// blocked in network I/O notices at its next cancellation check, and
    /// nothing it reports after this point is delivered.
    fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
    }

    fn check_released(&self) -> Result<(), EngineError> {
        if self.released {
            Err(EngineError::Released)
        } else {
            Ok(())
        }
    }

    /// Apply `update` to the control block if the status is one of `allowed`
    fn command<F>(
        &self,
        operation: &'static str,
        allowed: &[EngineStatus],
        update: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&mut Control),
    {
        self.check_released()?;
        let Some(session) = &self.session else {
            return Err(EngineError::InvalidState {
                operation,
                status: EngineStatus::Idle.to_string(),
            });
        };

        let mut control = session.control.lock();
        if !allowed.contains(&control.status) {
            return Err(EngineError::InvalidState {
                operation,
                status: control.status.to_string(),
            });
        }
        update(&mut control);
        session.wake.notify_all();
        Ok(())
    }
}

impl Default for SymphoniaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for SymphoniaEngine {
    fn load(&mut self, source_uri: &str, events: EngineEvents) {
        if self.released {
            events.error(EngineError::Released);
            return;
        }
        self.shutdown();

        let session = Arc::new(Session::new());
        let worker_session = session.clone();
        let factory = self.output.clone();
        let uri = source_uri.to_string();
        let spawn_failed = events.clone();

        let spawned = thread::Builder::new()
            .name("playhead-engine".to_string())
            .spawn(move || run_worker(worker_session, &uri, events, factory));

        match spawned {
            Ok(_detached) => {
                self.session = Some(session);
            }
            Err(e) => {
                log::error!("Failed to spawn engine worker: {}", e);
                spawn_failed.error(EngineError::Failure(format!("Failed to spawn worker: {}", e)));
            }
        }
    }

    fn start(&mut self) -> Result<(), EngineError> {
        use EngineStatus::*;
        self.command("start", &[Prepared, Started, Paused, Completed], |control| {
            if control.status == Completed {
                control.pending_seek = Some(PendingSeek {
                    position_ms: 0,
                    notify: false,
                });
            }
            control.status = Started;
        })
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        use EngineStatus::*;
        // Completed is accepted: the worker may reach the end of the stream
        // just before a pause the controller already decided on
        self.command("pause", &[Started, Paused, Completed], |control| {
            control.status = Paused;
        })
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        use EngineStatus::*;
        self.command(
            "stop",
            &[Prepared, Started, Paused, Completed, Stopped],
            |control| {
                control.status = Stopped;
                control.pending_seek = None;
            },
        )
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError> {
        use EngineStatus::*;
        self.command(
            "seek",
            &[Prepared, Started, Paused, Completed],
            |control| {
                // A seek leaves the end of the stream, so playback can resume
                if control.status == Completed {
                    control.status = Paused;
                }
                control.pending_seek = Some(PendingSeek {
                    position_ms,
                    notify: true,
                });
            },
        )
    }

    fn current_position_ms(&self) -> u64 {
        self.session
            .as_ref()
            .map(|session| session.position_ms.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    fn duration_ms(&self) -> u64 {
        self.session
            .as_ref()
            .map(|session| session.duration_ms.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        log::info!("Releasing engine");
        self.released = true;
        self.shutdown();
    }
}

impl Drop for SymphoniaEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// What the worker does next, decided under the control lock
enum Step {
    Exit,
    Seek(PendingSeek),
    Render,
    Idle(EngineStatus),
}

fn run_worker(session: Arc<Session>, uri: &str, events: EngineEvents, factory: OutputFactory) {
    log::debug!("Engine worker started for {}", uri);

    let prepared = prepare(&session, uri, &events, &factory);
    let (decoder, output) = match prepared {
        Ok(Some(prepared)) => prepared,
        Ok(None) => {
            log::debug!("Load of {} cancelled", uri);
            return;
        }
        Err(e) => {
            log::error!("Failed to prepare {}: {}", uri, e);
            if session.settle(EngineStatus::Error) {
                events.error(e);
            }
            return;
        }
    };

    if !session.settle(EngineStatus::Prepared) {
        return;
    }
    events.ready();

    if let Err(e) = play_loop(&session, decoder, output, &events) {
        log::error!("Playback of {} failed: {}", uri, e);
        if session.settle(EngineStatus::Error) {
            events.error(e);
        }
    }

    log::debug!("Engine worker for {} exited", uri);
}

type PreparedSource = (AudioDecoder, Box<dyn AudioOutput>);

fn prepare(
    session: &Session,
    uri: &str,
    events: &EngineEvents,
    factory: &OutputFactory,
) -> Result<Option<PreparedSource>, EngineError> {
    let location = SourceLocation::parse(uri)?;
    let source = open_source(&location, &session.cancelled, &mut |percent| {
        events.buffering_progress(percent)
    })?;
    let Some(source) = source else {
        return Ok(None);
    };
    if session.is_cancelled() {
        return Ok(None);
    }

    let decoder = AudioDecoder::open(source, location.hint())?;
    session
        .duration_ms
        .store(decoder.format.duration_ms, Ordering::Release);

    let mut output = factory();
    output.configure(decoder.format.sample_rate, decoder.format.channels)?;
    Ok(Some((decoder, output)))
}

fn play_loop(
    session: &Session,
    mut decoder: AudioDecoder,
    mut output: Box<dyn AudioOutput>,
    events: &EngineEvents,
) -> Result<(), EngineError> {
    let mut rendering = false;

    loop {
        let step = {
            let mut control = session.control.lock();
            loop {
                if session.is_cancelled() {
                    break Step::Exit;
                }
                if let Some(seek) = control.pending_seek.take() {
                    break Step::Seek(seek);
                }
                if control.status == EngineStatus::Started {
                    break Step::Render;
                }
                if rendering {
                    break Step::Idle(control.status);
                }
                session.wake.wait(&mut control);
            }
        };

        match step {
            Step::Exit => return Ok(()),
            Step::Seek(seek) => {
                let landed = decoder.seek(seek.position_ms)?;
                output.flush();
                session.position_ms.store(landed, Ordering::Release);
                log::debug!("Seeked to {}ms (requested {}ms)", landed, seek.position_ms);
                if seek.notify {
                    events.seek_completed();
                }
            }
            Step::Idle(status) => {
                output.pause();
                if status == EngineStatus::Stopped {
                    output.flush();
                }
                rendering = false;
            }
            Step::Render => {
                if !rendering {
                    output.resume();
                    rendering = true;
                }
                match decoder.decode_next()? {
                    Some(samples) => {
                        output.write(&samples)?;
                        session
                            .position_ms
                            .store(decoder.position_ms(), Ordering::Release);
                    }
                    None => {
                        let completed = {
                            let mut control = session.control.lock();
                            let finished = control.status == EngineStatus::Started
                                && control.pending_seek.is_none()
                                && !session.is_cancelled();
                            if finished {
                                control.status = EngineStatus::Completed;
                            }
                            finished
                        };
                        if completed {
                            let duration = session.duration_ms.load(Ordering::Acquire);
                            if duration > 0 {
                                session.position_ms.store(duration, Ordering::Release);
                            }
                            log::info!("Playback completed");
                            events.playback_completed();
                        }
                    }
                }
            }
        }
    }
}
