use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Per-key mutual exclusion for read-modify-write cycles on a single document.
///
/// When disabled, `with_keys` runs the closure directly and callers race
/// exactly as they would against the bare store.
pub struct KeyedLocks {
    enabled: bool,
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            table: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `f` while holding the lock of every key in `keys`.
    ///
    /// Keys are locked in sorted order, so callers with overlapping key sets
    /// cannot deadlock. A key's entry is dropped from the table once no
    /// caller holds or waits on it.
    pub fn with_keys<R>(&self, keys: &[&str], f: impl FnOnce() -> R) -> R {
        if !self.enabled {
            return f();
        }

        let ordered: BTreeSet<&str> = keys.iter().copied().collect();
        let held: Vec<Arc<Mutex<()>>> = {
            let mut table = self.table();
            ordered
                .iter()
                .map(|key| Arc::clone(table.entry((*key).to_string()).or_default()))
                .collect()
        };

        let result = {
            let _guards: Vec<MutexGuard<'_, ()>> = held
                .iter()
                .map(|mutex| mutex.lock().unwrap_or_else(|e| e.into_inner()))
                .collect();
            f()
        };

        drop(held);
        let mut table = self.table();
        for key in ordered {
            // Every clone is taken under the table lock, so a count of one is the table's own
            let idle = table.get(key).is_some_and(|entry| Arc::strong_count(entry) == 1);
            if idle {
                table.remove(key);
            }
        }

        result
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn max_concurrency(enabled: bool) -> usize {
        let locks = Arc::new(KeyedLocks::new(enabled));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    locks.with_keys(&["post:1"], || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(2));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        max_seen.load(Ordering::SeqCst)
    }

    #[test]
    fn serializes_critical_sections_on_same_key() {
        assert_eq!(max_concurrency(true), 1);
    }

    #[test]
    fn released_keys_leave_no_entries_behind() {
        let locks = KeyedLocks::new(true);
        for i in 0..10_000 {
            let key = format!("post:{}", i);
            locks.with_keys(&[key.as_str(), "feed"], || ());
        }
        assert!(locks.table().is_empty());
    }

    #[test]
    fn entries_are_dropped_after_contended_use() {
        let locks = Arc::new(KeyedLocks::new(true));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = Arc::clone(&locks);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let own = format!("user:{}", i);
                        locks.with_keys(&[own.as_str(), "users_list"], || {
                            thread::sleep(Duration::from_micros(10));
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(locks.table().is_empty());
    }

    #[test]
    fn duplicate_keys_do_not_self_deadlock() {
        let locks = KeyedLocks::new(true);
        let value = locks.with_keys(&["user:a", "user:a"], || 7);
        assert_eq!(value, 7);
    }

    #[test]
    fn disabled_locks_run_closure_directly() {
        let locks = KeyedLocks::new(false);
        assert!(!locks.is_enabled());
        let nested = locks.with_keys(&["post:1"], || locks.with_keys(&["post:1"], || "ok"));
        assert_eq!(nested, "ok");
    }
}
