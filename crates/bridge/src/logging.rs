// Logger installation for hosts embedding the bridge

use std::sync::Once;

/// Environment variable holding the `env_logger` filter
pub const LOG_ENV: &str = "PLAYHEAD_LOG";

/// Filter used when `PLAYHEAD_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

static INIT_LOGGER: Once = Once::new();

/// Install the platform logger. Safe to call repeatedly; only the first call
/// has an effect, and a logger installed by the host is left in place.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("Playhead"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            let env = env_logger::Env::new().filter_or(LOG_ENV, DEFAULT_LOG_FILTER);
            let _ = env_logger::Builder::from_env(env).try_init();
        }
    });
}
