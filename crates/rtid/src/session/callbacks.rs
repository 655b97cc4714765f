use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, select};
use tracing::{debug, warn};

use super::SESSION_TARGET;
use crate::error::RtiError;
use crate::messaging::Notice;

/// Receives notices while immediate callback delivery is enabled.
///
/// Called on the session's dispatcher thread, one notice at a time.
pub trait CallbackListener: Send + Sync {
    fn on_notice(&self, notice: Notice);
}

struct Dispatcher {
    stop: Sender<()>,
    worker: JoinHandle<()>,
}

/// Pull-based notice queue with an optional push mode.
///
/// While a dispatcher runs it owns delivery: polling returns nothing.
pub(crate) struct CallbackQueue {
    notices: Receiver<Notice>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

impl CallbackQueue {
    pub(crate) fn new(notices: Receiver<Notice>) -> Self {
        Self {
            notices,
            dispatcher: Mutex::new(None),
        }
    }

    fn dispatcher(&self) -> Result<MutexGuard<'_, Option<Dispatcher>>, RtiError> {
        self.dispatcher
            .lock()
            .map_err(|_| RtiError::poisoned("callback dispatcher"))
    }

    pub(crate) fn is_immediate(&self) -> Result<bool, RtiError> {
        Ok(self.dispatcher()?.is_some())
    }

    pub(crate) fn poll(&self, timeout: Duration) -> Result<Option<Notice>, RtiError> {
        if self.is_immediate()? {
            return Ok(None);
        }
        match self.notices.recv_timeout(timeout) {
            Ok(notice) => Ok(Some(notice)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    pub(crate) fn try_next(&self) -> Result<Option<Notice>, RtiError> {
        if self.is_immediate()? {
            return Ok(None);
        }
        match self.notices.try_recv() {
            Ok(notice) => Ok(Some(notice)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(None),
        }
    }

    /// Starts pushing notices to `listener`, replacing any running dispatcher.
    pub(crate) fn enable(&self, listener: Arc<dyn CallbackListener>) -> Result<(), RtiError> {
        self.disable()?;
        let mut dispatcher = self.dispatcher()?;
        let (stop, stopped) = bounded::<()>(0);
        let notices = self.notices.clone();
        let worker = thread::Builder::new()
            .name("rti-callbacks".into())
            .spawn(move || dispatch(&notices, &stopped, listener.as_ref()))
            .map_err(|source| {
                RtiError::internal(format!("failed to spawn callback dispatcher: {source}"))
            })?;
        *dispatcher = Some(Dispatcher { stop, worker });
        debug!(target: SESSION_TARGET, "immediate callbacks enabled");
        Ok(())
    }

    /// Stops the dispatcher if one is running. Notices that arrive afterwards
    /// stay queued for polling.
    pub(crate) fn disable(&self) -> Result<(), RtiError> {
        let Some(Dispatcher { stop, worker }) = self.dispatcher()?.take() else {
            return Ok(());
        };
        drop(stop);
        // A listener may disable delivery from inside its own callback.
        if worker.thread().id() != thread::current().id() && worker.join().is_err() {
            warn!(target: SESSION_TARGET, "callback listener panicked");
        }
        debug!(target: SESSION_TARGET, "immediate callbacks disabled");
        Ok(())
    }
}

impl Drop for CallbackQueue {
    fn drop(&mut self) {
        if let Err(error) = self.disable() {
            warn!(target: SESSION_TARGET, error = %error, "callback dispatcher not stopped");
        }
    }
}

fn dispatch(notices: &Receiver<Notice>, stopped: &Receiver<()>, listener: &dyn CallbackListener) {
    loop {
        select! {
            recv(notices) -> notice => match notice {
                Ok(notice) => listener.on_notice(notice),
                Err(_) => break,
            },
            recv(stopped) -> _ => break,
        }
    }
}
