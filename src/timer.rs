use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pair of stop flag and wake signal shared with the timer thread.
type StopSignal = Arc<(Mutex<bool>, Condvar)>;

/// Runs a callback on a background thread, either repeatedly on an
/// interval or once after a delay.
///
/// `stop` wakes the thread and joins it before returning, so once it
/// completes the callback can no longer touch any captured state.
/// Dropping the timer stops it the same way.
pub struct CallbackTimer {
    signal: Option<StopSignal>,
    fired: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackTimer {
    pub fn new() -> Self {
        Self {
            signal: None,
            fired: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Invoke `func` every `interval` until stopped, starting immediately.
    /// Starting while already running stops the previous run first.
    pub fn start_interval<F>(&mut self, interval: Duration, func: F)
    where
        F: Fn() + Send + 'static,
    {
        self.stop();
        self.fired.store(false, Ordering::Release);
        let signal: StopSignal = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_signal = signal.clone();
        self.signal = Some(signal);
        self.handle = Some(
            thread::Builder::new()
                .name("simdeck-timer".into())
                .spawn(move || loop {
                    func();
                    if wait_for_stop(&thread_signal, interval) {
                        break;
                    }
                })
                .expect("failed to spawn timer thread"),
        );
    }

    /// Invoke `func` once after `delay` unless stopped first.
    pub fn start_once<F>(&mut self, delay: Duration, func: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop();
        self.fired.store(false, Ordering::Release);
        let signal: StopSignal = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_signal = signal.clone();
        let fired = self.fired.clone();
        self.signal = Some(signal);
        self.handle = Some(
            thread::Builder::new()
                .name("simdeck-timer".into())
                .spawn(move || {
                    if !wait_for_stop(&thread_signal, delay) {
                        func();
                        fired.store(true, Ordering::Release);
                    }
                })
                .expect("failed to spawn timer thread"),
        );
    }

    /// Stop the timer and join its thread. Idempotent; after it returns
    /// no further callback invocation can occur.
    pub fn stop(&mut self) {
        if let Some(signal) = self.signal.take() {
            let (stop, wake) = &*signal;
            if let Ok(mut stopped) = stop.lock() {
                *stopped = true;
            }
            wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// True once a one-shot run reached its callback before being stopped.
    pub fn timed_out(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Block until either `timeout` elapses or a stop is requested. Returns
/// true when stopping.
fn wait_for_stop(signal: &StopSignal, timeout: Duration) -> bool {
    let (stop, wake) = &**signal;
    let Ok(guard) = stop.lock() else { return true };
    match wake.wait_timeout_while(guard, timeout, |stopped| !*stopped) {
        Ok((stopped, _)) => *stopped,
        Err(_) => true,
    }
}

impl Default for CallbackTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CallbackTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
