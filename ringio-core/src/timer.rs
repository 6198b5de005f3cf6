use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

struct TimerEntry {
    handle: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl TimerEntry {
    fn pending(&self) -> bool {
        !self.fired.load(Ordering::SeqCst) && !self.handle.is_finished()
    }
}

/// Named, cancelable, re-armable deferred actions. The registry exclusively
/// owns every scheduled task; callers only ever refer to timers by name.
///
/// Cancel only prevents a future fire. A callback that has already started
/// keeps running to completion.
pub struct TimerRegistry {
    entries: Mutex<HashMap<String, TimerEntry>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `action` to run once after `delay`. A still-pending timer
    /// under the same name is left alone unless `overwrite` is set, so
    /// retry loops cannot compound.
    pub fn arm<F>(&self, name: &str, delay: Duration, action: F, overwrite: bool)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut entries = self
            .entries
            .lock()
            .expect("timer registry mutex poisoned");
        if let Some(existing) = entries.get(name) {
            if existing.pending() {
                if !overwrite {
                    return;
                }
                existing.handle.abort();
            }
        }
        entries.insert(name.to_string(), spawn_entry(delay, action));
    }

    /// Arm only if no pending timer exists under `name`. Returns whether
    /// one already existed, making "start this loop" decisions idempotent
    /// across racing code paths.
    pub fn arm_if_absent<F>(&self, name: &str, delay: Duration, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut entries = self
            .entries
            .lock()
            .expect("timer registry mutex poisoned");
        if let Some(existing) = entries.get(name) {
            if existing.pending() {
                return true;
            }
        }
        entries.insert(name.to_string(), spawn_entry(delay, action));
        false
    }

    /// Remove the entry under `name`, aborting it if it has not fired yet.
    /// Returns whether an entry existed.
    pub fn cancel(&self, name: &str) -> bool {
        let mut entries = self
            .entries
            .lock()
            .expect("timer registry mutex poisoned");
        match entries.remove(name) {
            Some(entry) => {
                if entry.pending() {
                    entry.handle.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Whether a timer under `name` is still waiting to fire.
    pub fn exists(&self, name: &str) -> bool {
        let entries = self
            .entries
            .lock()
            .expect("timer registry mutex poisoned");
        entries.get(name).map(TimerEntry::pending).unwrap_or(false)
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_entry<F>(delay: Duration, action: F) -> TimerEntry
where
    F: Future<Output = ()> + Send + 'static,
{
    let fired = Arc::new(AtomicBool::new(false));
    let fired_in_task = fired.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        fired_in_task.store(true, Ordering::SeqCst);
        action.await;
    });
    TimerEntry { handle, fired }
}
