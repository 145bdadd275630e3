// End-to-end playback through the controller and the Symphonia engine

use parking_lot::Mutex;
use playhead_core::{
    ControllerConfig, EngineEvent, EngineEvents, PlaybackController, PlaybackEngine,
    PlaybackError, PlaybackState, PlayerEvent, PlayerListener,
};
use playhead_engine::{ClockOutput, EngineStatus, SymphoniaEngine};
use std::io::Write;
use std::net::TcpListener;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const SAMPLE_RATE: u32 = 8_000;

struct Recorder {
    events: Mutex<Vec<PlayerEvent>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    fn position(&self, predicate: impl Fn(&PlayerEvent) -> bool) -> Option<usize> {
        self.events.lock().iter().position(predicate)
    }
}

impl PlayerListener for Recorder {
    fn on_event(&self, event: PlayerEvent) {
        self.events.lock().push(event);
    }
}

/// One second of a 440 Hz tone as 16-bit mono PCM
fn tone_wav() -> NamedTempFile {
    let frames = SAMPLE_RATE as usize;
    let data_len = (frames * 2) as u32;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for n in 0..frames {
        let t = n as f32 / SAMPLE_RATE as f32;
        let sample = ((t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16;
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
    file.write_all(&wav).unwrap();
    file.flush().unwrap();
    file
}

fn controller(paced: bool) -> (PlaybackController, Arc<Recorder>) {
    let engine = SymphoniaEngine::with_output(move || {
        if paced {
            Box::new(ClockOutput::new())
        } else {
            Box::new(ClockOutput::unpaced())
        }
    });
    let config = ControllerConfig::default().with_poll_interval(Duration::from_millis(20));
    let controller = PlaybackController::with_config(engine, config);
    let recorder = Recorder::new();
    controller.add_listener(&recorder);
    (controller, recorder)
}

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_load_reports_ready_and_length() {
    let wav = tone_wav();
    let (controller, recorder) = controller(false);

    controller.load(wav.path().to_str().unwrap());
    assert!(wait_for(|| controller.is_audio_ready()));

    assert_eq!(controller.state(), PlaybackState::Paused);
    assert_eq!(controller.audio_length_ms(), 1_000);
    assert_eq!(
        recorder.events(),
        vec![
            PlayerEvent::AudioLoading,
            PlayerEvent::BufferingUpdate { percent: 100 },
            PlayerEvent::AudioReady { duration_ms: 1_000 },
            PlayerEvent::PlayerPaused,
        ]
    );
}

#[test]
fn test_play_before_ready_runs_to_completion() {
    let wav = tone_wav();
    let (controller, recorder) = controller(false);

    controller.load(&format!("file://{}", wav.path().display()));
    controller.play();
    assert!(wait_for(|| controller.is_completed()));

    let ready = recorder
        .position(|e| matches!(e, PlayerEvent::AudioReady { .. }))
        .unwrap();
    let playing = recorder.position(|e| *e == PlayerEvent::PlayerPlaying).unwrap();
    let completed = recorder.position(|e| *e == PlayerEvent::PlayerCompleted).unwrap();
    assert!(ready < playing && playing < completed);
    assert_eq!(recorder.position(|e| *e == PlayerEvent::PlayerPaused), None);
    assert_eq!(controller.playback_position_ms(), 1_000);
}

#[test]
fn test_play_again_after_completion() {
    let wav = tone_wav();
    let (controller, recorder) = controller(false);
    controller.load(wav.path().to_str().unwrap());
    controller.play();
    assert!(wait_for(|| controller.is_completed()));

    controller.play();
    assert!(wait_for(|| {
        let events = recorder.events();
        events.iter().filter(|e| **e == PlayerEvent::PlayerCompleted).count() == 2
    }));
    assert!(recorder
        .events()
        .iter()
        .all(|e| !matches!(e, PlayerEvent::SeekCompleted { .. })));
}

#[test]
fn test_seek_while_paused() {
    let wav = tone_wav();
    let (controller, recorder) = controller(false);
    controller.load(wav.path().to_str().unwrap());
    assert!(wait_for(|| controller.is_paused()));

    controller.seek(500);
    assert!(wait_for(|| recorder
        .position(|e| matches!(e, PlayerEvent::SeekCompleted { .. }))
        .is_some()));

    let started = recorder.position(|e| *e == PlayerEvent::SeekStarted).unwrap();
    let completed = recorder
        .position(|e| matches!(e, PlayerEvent::SeekCompleted { .. }))
        .unwrap();
    assert!(started < completed);
    match &recorder.events()[completed] {
        PlayerEvent::SeekCompleted { position_ms } => {
            assert!((400..=600).contains(position_ms), "landed at {}", position_ms)
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(controller.is_paused());
}

#[test]
fn test_pause_freezes_the_playhead() {
    let wav = tone_wav();
    let (controller, recorder) = controller(true);
    controller.load(wav.path().to_str().unwrap());
    controller.play();
    assert!(wait_for(|| controller.playback_position_ms() >= 100));
    assert!(wait_for(|| recorder
        .position(|e| matches!(e, PlayerEvent::PlaybackUpdate { .. }))
        .is_some()));

    controller.pause();
    let updates = recorder.events().len();
    // The worker may finish the packet it was writing
    thread::sleep(Duration::from_millis(250));
    let frozen = controller.playback_position_ms();
    thread::sleep(Duration::from_millis(100));

    assert_eq!(controller.playback_position_ms(), frozen);
    assert!(frozen < 1_000);
    assert_eq!(recorder.events().len(), updates);
}

#[test]
fn test_missing_file_enters_error() {
    let (controller, recorder) = controller(false);
    controller.load("/definitely/not/here.wav");
    assert!(wait_for(|| controller.state() == PlaybackState::Error));

    assert!(matches!(controller.last_error(), Some(PlaybackError::Source(_))));
    assert_eq!(recorder.events(), vec![PlayerEvent::AudioLoading]);
}

#[test]
fn test_unsupported_scheme_enters_error() {
    let (controller, _recorder) = controller(false);
    controller.load("rtsp://example.com/stream");
    assert!(wait_for(|| controller.state() == PlaybackState::Error));
}

#[test]
fn test_release_while_playing() {
    let wav = tone_wav();
    let (controller, recorder) = controller(true);
    controller.load(wav.path().to_str().unwrap());
    controller.play();
    assert!(wait_for(|| controller.is_playing()));

    controller.release();
    let delivered = recorder.events().len();
    thread::sleep(Duration::from_millis(100));

    assert!(controller.is_released());
    assert!(!controller.is_playing());
    assert_eq!(recorder.events().len(), delivered);
}

#[test]
fn test_engine_pause_after_end_of_stream() {
    let wav = tone_wav();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let mut engine = SymphoniaEngine::with_output(|| Box::new(ClockOutput::unpaced()));
    engine.load(
        wav.path().to_str().unwrap(),
        EngineEvents::new(move |event| {
            let _ = tx.lock().send(event);
        }),
    );

    let timeout = Duration::from_secs(5);
    assert_eq!(rx.recv_timeout(timeout).unwrap(), EngineEvent::BufferingProgress(100));
    assert_eq!(rx.recv_timeout(timeout).unwrap(), EngineEvent::Ready);
    engine.start().unwrap();
    assert_eq!(rx.recv_timeout(timeout).unwrap(), EngineEvent::PlaybackCompleted);
    assert_eq!(engine.status(), EngineStatus::Completed);

    assert_eq!(engine.pause(), Ok(()));
    assert_eq!(engine.status(), EngineStatus::Paused);
}

/// Pauses from another thread as soon as playback starts
struct PauseOnPlaying {
    controller: Arc<PlaybackController>,
    pauser: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerListener for PauseOnPlaying {
    fn on_event(&self, event: PlayerEvent) {
        if event == PlayerEvent::PlayerPlaying {
            let controller = self.controller.clone();
            *self.pauser.lock() = Some(thread::spawn(move || controller.pause()));
        }
    }
}

#[test]
fn test_pause_racing_end_of_stream_stays_consistent() {
    let wav = tone_wav();
    for _ in 0..10 {
        let engine = SymphoniaEngine::with_output(|| Box::new(ClockOutput::unpaced()));
        let controller = Arc::new(PlaybackController::new(engine));
        let pauser = Arc::new(PauseOnPlaying {
            controller: controller.clone(),
            pauser: Mutex::new(None),
        });
        controller.add_listener(&pauser);

        controller.load(wav.path().to_str().unwrap());
        controller.play();
        assert!(wait_for(|| pauser.pauser.lock().is_some()));
        if let Some(handle) = pauser.pauser.lock().take() {
            handle.join().unwrap();
        }
        thread::sleep(Duration::from_millis(50));

        let state = controller.state();
        assert!(
            matches!(state, PlaybackState::Paused | PlaybackState::Completed),
            "settled in {}",
            state
        );
        assert_eq!(controller.last_error(), None);
        controller.release();
    }
}

/// Address of a server that accepts connections and never answers
fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    format!("http://{}/a.wav", address)
}

#[test]
fn test_stalled_download_does_not_block_commands() {
    let wav = tone_wav();
    let (controller, _recorder) = controller(false);

    controller.load(&silent_server());
    thread::sleep(Duration::from_millis(200));
    assert_eq!(controller.state(), PlaybackState::Loading);

    let started = Instant::now();
    controller.load(wav.path().to_str().unwrap());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(wait_for(|| controller.is_audio_ready()));

    controller.load(&silent_server());
    thread::sleep(Duration::from_millis(200));
    let started = Instant::now();
    controller.release();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(controller.is_released());
}
