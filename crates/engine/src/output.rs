// Audio sinks the engine worker renders decoded samples into

use playhead_core::EngineError;
use std::thread;
use std::time::{Duration, Instant};

/// Destination for interleaved `f32` samples.
///
/// Created and driven on the engine worker thread only, so implementations
/// need not be `Send` (cpal streams are not on every platform).
pub trait AudioOutput {
    /// Prepare for the source's format. Called once before any write.
    fn configure(&mut self, sample_rate: u32, channels: u16) -> Result<(), EngineError>;

    /// Queue samples for playback, blocking while the sink is full
    fn write(&mut self, samples: &[f32]) -> Result<(), EngineError>;

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    /// Drop queued samples, e.g. after a seek
    fn flush(&mut self) {}
}

/// Factory invoked on the worker thread for every load
pub type OutputFactory = std::sync::Arc<dyn Fn() -> Box<dyn AudioOutput> + Send + Sync>;

/// Output without a device: consumes samples at the rate they would be
/// played, or as fast as they arrive when unpaced
pub struct ClockOutput {
    paced: bool,
    sample_rate: u32,
    channels: u16,
    anchor: Option<Instant>,
    frames_since_anchor: u64,
}

impl ClockOutput {
    pub fn new() -> Self {
        Self {
            paced: true,
            sample_rate: 0,
            channels: 0,
            anchor: None,
            frames_since_anchor: 0,
        }
    }

    pub fn unpaced() -> Self {
        Self {
            paced: false,
            ..Self::new()
        }
    }

    fn reset_clock(&mut self) {
        self.anchor = None;
        self.frames_since_anchor = 0;
    }
}

impl Default for ClockOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for ClockOutput {
    fn configure(&mut self, sample_rate: u32, channels: u16) -> Result<(), EngineError> {
        if sample_rate == 0 || channels == 0 {
            return Err(EngineError::Failure(format!(
                "Invalid output format: {}Hz, {} channels",
                sample_rate, channels
            )));
        }
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.reset_clock();
        Ok(())
    }

    fn write(&mut self, samples: &[f32]) -> Result<(), EngineError> {
        if !self.paced || self.sample_rate == 0 {
            return Ok(());
        }

        let anchor = *self.anchor.get_or_insert_with(Instant::now);
        self.frames_since_anchor += (samples.len() / self.channels as usize) as u64;
        let due = anchor
            + Duration::from_micros(self.frames_since_anchor * 1_000_000 / self.sample_rate as u64);

        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.reset_clock();
    }

    fn flush(&mut self) {
        self.reset_clock();
    }
}

#[cfg(feature = "cpal")]
pub use self::device::CpalOutput;

#[cfg(feature = "cpal")]
mod device {
    use super::AudioOutput;
    use crate::ring::AudioRingBuffer;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Stream, StreamConfig};
    use parking_lot::Mutex;
    use playhead_core::EngineError;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Seconds of audio the ring buffer holds
    const BUFFER_SECONDS: usize = 2;

    /// Default output device through cpal
    pub struct CpalOutput {
        stream: Option<Stream>,
        ring_buffer: Arc<Mutex<AudioRingBuffer>>,
    }

    impl CpalOutput {
        pub fn new() -> Self {
            Self {
                stream: None,
                ring_buffer: Arc::new(Mutex::new(AudioRingBuffer::new(1))),
            }
        }
    }

    impl Default for CpalOutput {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioOutput for CpalOutput {
        fn configure(&mut self, sample_rate: u32, channels: u16) -> Result<(), EngineError> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| EngineError::Failure("No output device available".to_string()))?;

            let config = StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            self.ring_buffer = Arc::new(Mutex::new(AudioRingBuffer::new(
                sample_rate as usize * channels as usize * BUFFER_SECONDS,
            )));
            let ring_buffer = self.ring_buffer.clone();

            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let read = ring_buffer.lock().read(data);
                        // Zero-fill any unwritten samples to prevent playing stale data
                        if read < data.len() {
                            data[read..].fill(0.0);
                        }
                    },
                    |err| {
                        log::error!("Audio stream error: {}", err);
                    },
                    None,
                )
                .map_err(|e| EngineError::Failure(format!("Failed to build output stream: {}", e)))?;

            self.stream = Some(stream);
            Ok(())
        }

        fn write(&mut self, samples: &[f32]) -> Result<(), EngineError> {
            let mut written = 0;
            while written < samples.len() {
                let w = self.ring_buffer.lock().write(&samples[written..]);
                if w == 0 {
                    thread::sleep(Duration::from_millis(5));
                } else {
                    written += w;
                }
            }
            Ok(())
        }

        fn pause(&mut self) {
            if let Some(stream) = &self.stream {
                if let Err(e) = stream.pause() {
                    log::warn!("Failed to pause stream: {}", e);
                }
            }
        }

        fn resume(&mut self) {
            if let Some(stream) = &self.stream {
                if let Err(e) = stream.play() {
                    log::warn!("Failed to start stream: {}", e);
                }
            }
        }

        fn flush(&mut self) {
            self.ring_buffer.lock().clear();
        }
    }
}
