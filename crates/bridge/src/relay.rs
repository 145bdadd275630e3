// Outbound event relay: player events become method calls on the channel

use playhead_core::{PlayerEvent, PlayerListener};
use serde_json::{json, Value};
use std::sync::Arc;

/// Host side of the method channel
pub trait MethodChannel: Send + Sync {
    fn invoke_method(&self, method: &str, arguments: Option<Value>);
}

/// Method name and arguments an event is relayed as
pub fn outbound(event: &PlayerEvent) -> (&'static str, Option<Value>) {
    match event {
        PlayerEvent::AudioLoading => ("onAudioLoading", None),
        PlayerEvent::BufferingUpdate { percent } => {
            ("onBufferingUpdate", Some(json!({ "percent": percent })))
        }
        PlayerEvent::AudioReady { duration_ms } => {
            ("onAudioReady", Some(json!({ "audioLength": duration_ms })))
        }
        PlayerEvent::PlayerPlaying => ("onPlayerPlaying", None),
        PlayerEvent::PlaybackUpdate {
            position_ms,
            duration_ms,
        } => (
            "onPlayerPlaybackUpdate",
            Some(json!({ "position": position_ms, "audioLength": duration_ms })),
        ),
        PlayerEvent::PlayerPaused => ("onPlayerPaused", None),
        PlayerEvent::PlayerStopped => ("onPlayerStopped", None),
        PlayerEvent::PlayerCompleted => ("onPlayerCompleted", None),
        PlayerEvent::SeekStarted => ("onSeekStarted", None),
        PlayerEvent::SeekCompleted { position_ms } => {
            ("onSeekCompleted", Some(json!({ "position": position_ms })))
        }
    }
}

/// Listener forwarding every player event to a method channel
pub struct ChannelRelay {
    channel: Arc<dyn MethodChannel>,
}

impl ChannelRelay {
    pub fn new(channel: Arc<dyn MethodChannel>) -> Self {
        Self { channel }
    }
}

impl PlayerListener for ChannelRelay {
    fn on_event(&self, event: PlayerEvent) {
        let (method, arguments) = outbound(&event);
        log::debug!("Relaying {}", method);
        self.channel.invoke_method(method, arguments);
    }
}

/// Channel that records invocations, for tests
#[cfg(test)]
pub(crate) struct RecordingChannel {
    calls: parking_lot::Mutex<Vec<(String, Option<Value>)>>,
}

#[cfg(test)]
impl RecordingChannel {
    pub(crate) fn new() -> Self {
        Self {
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.lock().clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
impl MethodChannel for RecordingChannel {
    fn invoke_method(&self, method: &str, arguments: Option<Value>) {
        self.calls.lock().push((method.to_string(), arguments));
    }
}
