// Method-channel bridge for the playhead controller
// Routes `audioplayer/<session>/<command>` calls in and relays player events out

pub mod error;
pub mod logging;
pub mod method;
pub mod plugin;
pub mod relay;

// Re-exports
pub use error::{BridgeError, Result};
pub use logging::init_logging;
pub use method::{MethodCall, PlayerMethod, Route, METHOD_NAMESPACE};
pub use plugin::AudioPlugin;
pub use relay::{outbound, ChannelRelay, MethodChannel};
