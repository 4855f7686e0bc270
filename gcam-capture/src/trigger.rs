use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// A single-use capture trigger shared between the orchestrating caller and
/// any number of capture threads.
///
/// The flag transitions false→true exactly once; [TriggerFlag::fire] is
/// idempotent and there is no way to re-arm. Waiters suspend on a condition
/// variable keyed to the transition, so no capture thread runs before the
/// signal. Capturing again requires a fresh flag.
#[derive(Clone)]
pub struct TriggerFlag {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl TriggerFlag {
    pub fn new() -> TriggerFlag {
        TriggerFlag {
            inner: Arc::new(Inner::default()),
        }
    }

    /// Signal the trigger. Further calls are no-ops.
    pub fn fire(&self) {
        let mut fired = self.inner.fired.lock();
        if !*fired {
            *fired = true;
            self.inner.cond.notify_all();
        }
    }

    pub fn is_fired(&self) -> bool {
        *self.inner.fired.lock()
    }

    /// Block until the trigger fires. Returns immediately if it already has.
    ///
    /// There is no timeout: the caller must guarantee the flag is eventually
    /// fired.
    pub fn wait(&self) {
        let mut fired = self.inner.fired.lock();
        while !*fired {
            self.inner.cond.wait(&mut fired);
        }
    }
}

impl Default for TriggerFlag {
    fn default() -> Self {
        TriggerFlag::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_once_fired() {
        let flag = TriggerFlag::new();
        assert!(!flag.is_fired());

        let waiter = {
            let flag = flag.clone();
            std::thread::spawn(move || flag.wait())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        flag.fire();
        waiter.join().unwrap();
        assert!(flag.is_fired());

        // already fired: returns immediately, firing again is a no-op
        flag.fire();
        flag.wait();
    }
}
