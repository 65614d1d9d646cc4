use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::debug;

use super::collector::Collect;
use super::error::{fatal, GcError};
use super::sync::spawn_background;

enum Signal {
    // the sender, if any, is told when marking is done
    Collect(Option<Sender<()>>),
    Stop,
}

// The monitor is responsible for running collections off the mutator's
// thread. It wakes either when a collection is requested or when its period
// elapses, whichever comes first.
pub struct Monitor<T: Collect> {
    collector: Arc<T>,
    period: Duration,
    flag: AtomicBool,
    sender: Mutex<Option<Sender<Signal>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Collect> Monitor<T> {
    pub fn new(collector: Arc<T>, period: Duration) -> Self {
        Self {
            collector,
            period,
            flag: AtomicBool::new(false),
            sender: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Starting a monitor that is already running does nothing.
    pub fn start(&self) -> Result<(), GcError> {
        if self
            .flag
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return Ok(());
        }

        let (sender, receiver) = crossbeam_channel::unbounded();
        let collector = self.collector.clone();
        let period = self.period;

        let handle = match spawn_background("sweepit-monitor", move || {
            loop {
                let result = match receiver.recv_timeout(period) {
                    Ok(Signal::Collect(ack)) => collector
                        .collect_cycle(|| {
                            if let Some(ack) = ack {
                                // the requester may have given up waiting
                                let _ = ack.send(());
                            }
                        })
                        .map(|_| ()),
                    Err(RecvTimeoutError::Timeout) => collector.collect_periodic(),
                    Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                };

                if let Err(err) = result {
                    fatal(&err);
                }
            }

            debug!("collector monitor stopped");
        }) {
            Ok(handle) => handle,
            Err(err) => {
                self.flag.store(false, Ordering::Relaxed);
                return Err(err);
            }
        };

        *self.lock_sender()? = Some(sender);
        *self.lock_handle()? = Some(handle);

        debug!("collector monitor started, period {:?}", self.period);

        Ok(())
    }

    /// Asks the running task for a cycle. The returned receiver gets a
    /// message once the cycle is done with its roots, and disconnects if the
    /// task stops first. Returns `None` if there is no task to ask.
    pub fn request(&self) -> Result<Option<Receiver<()>>, GcError> {
        let (ack, marked) = crossbeam_channel::bounded(1);

        match self.lock_sender()?.as_ref() {
            Some(sender) if sender.send(Signal::Collect(Some(ack))).is_ok() => Ok(Some(marked)),
            _ => Ok(None),
        }
    }

    /// Stops the task and waits for it to exit. A cycle already in progress
    /// finishes first.
    pub fn stop(&self) -> Result<(), GcError> {
        if !self.flag.swap(false, Ordering::Relaxed) {
            return Ok(());
        }

        if let Some(sender) = self.lock_sender()?.take() {
            // the task may already be gone, in which case there is nothing to stop
            let _ = sender.send(Signal::Stop);
        }

        if let Some(handle) = self.lock_handle()?.take() {
            handle
                .join()
                .map_err(|_| GcError::Concurrency("collector monitor panicked"))?;
        }

        Ok(())
    }

    fn lock_sender(&self) -> Result<std::sync::MutexGuard<'_, Option<Sender<Signal>>>, GcError> {
        self.sender
            .lock()
            .map_err(|_| GcError::Concurrency("monitor channel lock poisoned"))
    }

    fn lock_handle(&self) -> Result<std::sync::MutexGuard<'_, Option<JoinHandle<()>>>, GcError> {
        self.handle
            .lock()
            .map_err(|_| GcError::Concurrency("monitor handle lock poisoned"))
    }
}

impl<T: Collect> Drop for Monitor<T> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
