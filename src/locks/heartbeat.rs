//! Heartbeat that keeps a held claim fresh.

use crate::fs::touch_sync;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Touches a claim directory every `tick` until dropped.
///
/// The touches run on their own thread, so a holder busy with blocking work
/// still looks alive. Dropping disconnects the channel, which wakes the thread
/// immediately, and then joins it.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub(crate) fn start(path: PathBuf, tick: Duration) -> Self {
        let (stop, stopped) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("rwlockfile-heartbeat".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => return,
                    }
                    if let Err(e) = touch_sync(&path, SystemTime::now()) {
                        if e.kind() == io::ErrorKind::NotFound {
                            debug!(path = %path.display(), "claim gone, heartbeat stopped");
                        } else {
                            warn!(path = %path.display(), error = %e, "heartbeat failed, claim may go stale");
                        }
                        return;
                    }
                }
            });

        match spawned {
            Ok(handle) => Self {
                stop: Some(stop),
                handle: Some(handle),
            },
            Err(e) => {
                warn!(error = %e, "failed to start heartbeat thread");
                Self {
                    stop: None,
                    handle: None,
                }
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
