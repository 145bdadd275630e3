// Audio player plugin: dispatches channel calls to one playback controller

use crate::error::{BridgeError, Result};
use crate::method::{MethodCall, PlayerMethod};
use crate::relay::{ChannelRelay, MethodChannel};
use playhead_core::{PlaybackController, SessionHandle};
use serde_json::Value;
use std::sync::Arc;

/// Channel-facing wrapper around a `PlaybackController`.
///
/// Owns the relay that forwards player events to the channel; the
/// controller itself only holds it weakly.
pub struct AudioPlugin {
    controller: PlaybackController,
    relay: Arc<ChannelRelay>,
}

impl AudioPlugin {
    pub fn new(controller: PlaybackController, channel: Arc<dyn MethodChannel>) -> Self {
        crate::init_logging();
        let relay = Arc::new(ChannelRelay::new(channel));
        controller.add_listener(&relay);
        log::info!("Audio plugin serving player session {}", controller.session());
        Self { controller, relay }
    }

    pub fn session(&self) -> SessionHandle {
        self.controller.session()
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Handle one inbound call. Commands answer `None`, queries answer
    /// their value.
    pub fn handle(&self, call: &MethodCall) -> Result<Option<Value>> {
        log::debug!("onMethodCall(): {}", call.method);
        let route = call.route()?;

        let served = self.session().id();
        if route.session != served.to_string() {
            return Err(BridgeError::UnknownSession {
                requested: route.session.to_string(),
                served,
            });
        }

        let controller = &self.controller;
        let reply = match PlayerMethod::decode(route.command, call)? {
            PlayerMethod::Load { audio_url } => {
                controller.load(&audio_url);
                None
            }
            PlayerMethod::Play => {
                controller.play();
                None
            }
            PlayerMethod::Pause => {
                controller.pause();
                None
            }
            PlayerMethod::Stop => {
                controller.stop();
                None
            }
            PlayerMethod::Seek { position_ms } => {
                controller.seek(position_ms);
                None
            }
            PlayerMethod::Release => {
                controller.release();
                None
            }
            PlayerMethod::IsAudioReady => Some(Value::from(controller.is_audio_ready())),
            PlayerMethod::IsPlaying => Some(Value::from(controller.is_playing())),
            PlayerMethod::IsPaused => Some(Value::from(controller.is_paused())),
            PlayerMethod::IsStopped => Some(Value::from(controller.is_stopped())),
            PlayerMethod::IsCompleted => Some(Value::from(controller.is_completed())),
            PlayerMethod::AudioLength => Some(Value::from(controller.audio_length_ms())),
            PlayerMethod::PlaybackPosition => {
                Some(Value::from(controller.playback_position_ms()))
            }
        };
        Ok(reply)
    }
}

impl Drop for AudioPlugin {
    fn drop(&mut self) {
        self.controller.remove_listener(&self.relay);
    }
}
