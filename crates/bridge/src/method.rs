// Inbound method calls: name routing and argument decoding

use crate::error::{BridgeError, Result};
use serde_json::Value;

/// Namespace every player method name starts with
pub const METHOD_NAMESPACE: &str = "audioplayer";

/// A call received from the host side of the channel
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Split `audioplayer/<session>/<command>` into its parts
    pub fn route(&self) -> Result<Route<'_>> {
        let mut parts = self.method.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(METHOD_NAMESPACE), Some(session), Some(command), None)
                if !session.is_empty() && !command.is_empty() =>
            {
                Ok(Route { session, command })
            }
            _ => Err(BridgeError::InvalidMethod(self.method.clone())),
        }
    }

    fn string_argument(&self, name: &'static str) -> Result<String> {
        self.arguments
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(BridgeError::MissingArgument(name))
    }

    fn millis_argument(&self, name: &'static str) -> Result<u64> {
        let value = self
            .arguments
            .get(name)
            .ok_or(BridgeError::MissingArgument(name))?;
        // Hosts send integers, but some encode them as doubles
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|ms| *ms >= 0.0).map(|ms| ms as u64))
            .ok_or(BridgeError::MissingArgument(name))
    }
}

/// Routing part of a method name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route<'a> {
    pub session: &'a str,
    pub command: &'a str,
}

/// Decoded player command or query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerMethod {
    Load { audio_url: String },
    Play,
    Pause,
    Stop,
    Seek { position_ms: u64 },
    Release,
    IsAudioReady,
    IsPlaying,
    IsPaused,
    IsStopped,
    IsCompleted,
    AudioLength,
    PlaybackPosition,
}

impl PlayerMethod {
    pub fn decode(command: &str, call: &MethodCall) -> Result<Self> {
        let method = match command {
            "load" => PlayerMethod::Load {
                audio_url: call.string_argument("audioUrl")?,
            },
            "play" => PlayerMethod::Play,
            "pause" => PlayerMethod::Pause,
            "stop" => PlayerMethod::Stop,
            "seek" => PlayerMethod::Seek {
                position_ms: call.millis_argument("seekPosition")?,
            },
            "release" => PlayerMethod::Release,
            "isAudioReady" => PlayerMethod::IsAudioReady,
            "isPlaying" => PlayerMethod::IsPlaying,
            "isPaused" => PlayerMethod::IsPaused,
            "isStopped" => PlayerMethod::IsStopped,
            "isCompleted" => PlayerMethod::IsCompleted,
            "audioLength" => PlayerMethod::AudioLength,
            "playbackPosition" => PlayerMethod::PlaybackPosition,
            other => return Err(BridgeError::NotImplemented(other.to_string())),
        };
        Ok(method)
    }
}
