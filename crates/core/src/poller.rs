// Background playhead polling loop

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

/// Handle to one polling loop. Dropping the handle cancels the loop and
/// wakes its thread so it exits without waiting for the next tick.
pub(crate) struct PollingLoop {
    id: u64,
    _cancel: Sender<()>,
}

impl PollingLoop {
    /// Run `tick` every `interval` on a dedicated thread until `tick`
    /// returns false or the handle is dropped
    pub(crate) fn spawn<F>(id: u64, interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (cancel, cancelled) = mpsc::channel::<()>();

        thread::Builder::new()
            .name(format!("playhead-poll-{}", id))
            .spawn(move || {
                log::debug!("Polling loop {} started", id);
                loop {
                    match cancelled.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if !tick() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("Polling loop {} exited", id);
            })?;

        Ok(Self {
            id,
            _cancel: cancel,
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}
