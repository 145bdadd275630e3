// Audio decoding using Symphonia
// Handles various audio formats (MP3, AAC, FLAC, WAV, etc.)

use playhead_core::EngineError;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

/// Audio format information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Zero when the container does not declare a frame count
    pub duration_ms: u64,
}

/// Symphonia reader and decoder for the default track of one source
pub struct AudioDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_buf: Option<SampleBuffer<f32>>,
    sample_buf_frames: usize,
    position_ms: u64,
    pub format: AudioFormat,
}

impl AudioDecoder {
    /// Probe `media_source` and open a decoder for its default track
    pub fn open(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self, EngineError> {
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| EngineError::Source(format!("Failed to probe media: {}", e)))?;

        let format_reader = probe_result.format;

        let track = format_reader
            .default_track()
            .ok_or_else(|| EngineError::Source("No default track found".to_string()))?;
        let track_id = track.id;
        let codec_params = &track.codec_params;

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| EngineError::Source(format!("Failed to create decoder: {}", e)))?;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| EngineError::Source("Sample rate not specified".to_string()))?;
        let channels = codec_params
            .channels
            .ok_or_else(|| EngineError::Source("Channels not specified".to_string()))?
            .count() as u16;
        let time_base = codec_params.time_base;

        let duration_ms = codec_params
            .n_frames
            .map(|n_frames| ts_to_ms(time_base, sample_rate, n_frames))
            .unwrap_or(0);

        let format = AudioFormat {
            sample_rate,
            channels,
            duration_ms,
        };

        log::info!(
            "Loaded audio: {}Hz, {} channels, {} ms",
            format.sample_rate,
            format.channels,
            format.duration_ms
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            time_base,
            sample_buf: None,
            sample_buf_frames: 0,
            position_ms: 0,
            format,
        })
    }

    /// Decode the next packet into interleaved `f32` samples.
    /// `Ok(None)` marks the end of the stream.
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, EngineError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(EngineError::Failure(format!("Failed to read packet: {}", e)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::warn!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => {
                    return Err(EngineError::Failure(format!("Failed to decode packet: {}", e)));
                }
            };

            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            if self.sample_buf.is_none() || decoded.capacity() > self.sample_buf_frames {
                self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, *decoded.spec()));
                self.sample_buf_frames = decoded.capacity();
            }

            let Some(sample_buf) = self.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref(decoded);

            self.position_ms = ts_to_ms(
                self.time_base,
                self.format.sample_rate,
                packet.ts() + frames as u64,
            );
            return Ok(Some(sample_buf.samples().to_vec()));
        }
    }

    /// Seek to a time position, returning where the reader actually landed
    pub fn seek(&mut self, position_ms: u64) -> Result<u64, EngineError> {
        let target_ms = if self.format.duration_ms > 0 {
            position_ms.min(self.format.duration_ms)
        } else {
            position_ms
        };
        // Seek by time; the reader converts to the track's own time base
        let time = Time::new(target_ms / 1000, (target_ms % 1000) as f64 / 1000.0);

        let seeked = self
            .format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| EngineError::Failure(format!("Seek failed: {}", e)))?;

        // Reset decoder after seek
        self.decoder.reset();

        self.position_ms = ts_to_ms(self.time_base, self.format.sample_rate, seeked.actual_ts);
        Ok(self.position_ms)
    }

    /// End of the last decoded packet
    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }
}

fn ts_to_ms(time_base: Option<TimeBase>, sample_rate: u32, ts: u64) -> u64 {
    match time_base {
        Some(time_base) => {
            let time = time_base.calc_time(ts);
            time.seconds * 1000 + (time.frac * 1000.0) as u64
        }
        None => (ts * 1000) / sample_rate.max(1) as u64,
    }
}
