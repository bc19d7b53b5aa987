//! Change feed of removals.
//!
//! Every natural expiry and every explicit delete appends one record here,
//! keyed by the original full key. A periodic callback drains the buffer:
//! the whole map is handed over and replaced atomically, so the consumer
//! sees each removal exactly once. The drain runs on a single thread and
//! invokes the callback synchronously, so ticks never overlap; a slow
//! callback just coalesces removals into the next tick's batch.

use crate::value::ValueId;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One removal record: the payload that was removed and its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal<V> {
    /// The removed payload.
    pub value: V,
    /// The id it was stored under.
    pub id: ValueId,
}

/// A drained batch: full key to the removals under it, in removal order.
pub type Removals<V> = HashMap<String, Vec<Removal<V>>>;

/// Buffer of removals since the last drain.
pub(crate) struct ChangeFeed<V> {
    buffer: Mutex<Removals<V>>,
    stopped: Mutex<bool>,
    tick: Condvar,
}

impl<V> ChangeFeed<V> {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Mutex::new(HashMap::new()),
            stopped: Mutex::new(false),
            tick: Condvar::new(),
        }
    }

    /// Appends one removal record under `key`.
    pub(crate) fn record(&self, key: &str, removal: Removal<V>) {
        self.buffer
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(removal);
    }

    /// Hands over the buffered removals, resetting the buffer.
    ///
    /// An empty buffer is handed over as-is without a reset, matching the
    /// contract that a tick with nothing to report still runs the callback.
    pub(crate) fn take_if_any(&self) -> Removals<V> {
        let mut buffer = self.buffer.lock();
        if buffer.is_empty() {
            HashMap::new()
        } else {
            std::mem::take(&mut *buffer)
        }
    }

    /// Total buffered removal records (across all keys).
    pub(crate) fn backlog(&self) -> usize {
        self.buffer.lock().values().map(Vec::len).sum()
    }

    /// Sleeps one drain interval. Returns `true` if the feed was shut down
    /// while waiting.
    pub(crate) fn wait_tick(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.tick.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    /// Stops the drain thread after its current tick.
    pub(crate) fn shutdown(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.tick.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn removal(value: &str, id: &str) -> Removal<String> {
        Removal {
            value: value.to_string(),
            id: ValueId::from(id),
        }
    }

    #[test]
    fn records_accumulate_per_key_in_order() {
        let feed: ChangeFeed<String> = ChangeFeed::new();
        feed.record("a b", removal("1", "id1"));
        feed.record("a b", removal("2", "id2"));
        feed.record("a c", removal("3", "id3"));
        assert_eq!(feed.backlog(), 3);

        let batch = feed.take_if_any();
        assert_eq!(batch.len(), 2);
        let ab = &batch["a b"];
        assert_eq!(ab[0].value, "1");
        assert_eq!(ab[1].value, "2");
        assert_eq!(batch["a c"][0].id, ValueId::from("id3"));
    }

    #[test]
    fn take_resets_buffer() {
        let feed: ChangeFeed<String> = ChangeFeed::new();
        feed.record("k", removal("v", "id"));
        assert_eq!(feed.take_if_any().len(), 1);
        assert_eq!(feed.backlog(), 0);
        assert!(feed.take_if_any().is_empty());
    }

    #[test]
    fn tick_times_out_without_shutdown() {
        let feed: ChangeFeed<String> = ChangeFeed::new();
        assert!(!feed.wait_tick(Duration::from_millis(10)));
    }

    #[test]
    fn shutdown_cuts_tick_short() {
        let feed: Arc<ChangeFeed<String>> = Arc::new(ChangeFeed::new());
        let waiter = {
            let feed = Arc::clone(&feed);
            thread::spawn(move || feed.wait_tick(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        feed.shutdown();
        assert!(waiter.join().unwrap());
    }
}
