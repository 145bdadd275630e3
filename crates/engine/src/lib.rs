// Symphonia playback engine for the playhead controller
// Decodes local files and HTTP sources and renders them to an audio output

pub mod decoder;
pub mod engine;
pub mod output;
pub mod source;

#[cfg(feature = "cpal")]
mod ring;

// Re-exports
pub use decoder::{AudioDecoder, AudioFormat};
pub use engine::{EngineStatus, SymphoniaEngine};
pub use output::{AudioOutput, ClockOutput, OutputFactory};
pub use source::SourceLocation;

#[cfg(feature = "cpal")]
pub use output::CpalOutput;
