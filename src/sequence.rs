//! The shared, ordered sequence of text values the race demo mutates.
//!
//! `SharedSequence` is an explicitly owned `Arc<Mutex<Vec<String>>>`; cloning
//! it hands another task a reference to the same vector.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Appends `value` to `sequence` exactly `count` times.
///
/// Taking `&mut Vec<String>` means a caller sharing the vector must already
/// hold the guard: a `MutexGuard` derefs to exactly this.
pub fn append_batch(sequence: &mut Vec<String>, value: &str, count: usize) {
    sequence.extend(std::iter::repeat(value).take(count).map(str::to_owned));
}

#[derive(Clone, Debug, Default)]
pub struct SharedSequence {
    inner: Arc<Mutex<Vec<String>>>,
}

impl SharedSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sequence pre-seeded with `len` copies of `value`.
    pub fn seeded(value: &str, len: usize) -> Self {
        let mut items = Vec::with_capacity(len);
        append_batch(&mut items, value, len);
        Self::from(items)
    }

    /// Acquires the guard. A poisoned lock is recovered: appends never leave
    /// the vector half-written, so the data is still usable.
    pub fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("shared sequence mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One append done as a non-atomic read-modify-write.
    ///
    /// The guard is released between the read and the write back, so a
    /// concurrent writer's appends made inside that window are overwritten.
    /// `window` bounds a random pause inside the gap; zero just yields.
    pub fn racy_append(&self, value: &str, window: Duration) {
        let mut local = self.snapshot();

        if window.is_zero() {
            thread::yield_now();
        } else {
            let micros = rand::thread_rng().gen_range(0..=window.as_micros() as u64);
            thread::sleep(Duration::from_micros(micros));
        }

        local.push(value.to_owned());
        *self.lock() = local;
    }
}

impl From<Vec<String>> for SharedSequence {
    fn from(items: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(items)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seeded_sequence() {
        let seq = SharedSequence::seeded("xxx", 2);
        assert_eq!(seq.snapshot(), vec!["xxx", "xxx"]);
        assert!(!seq.is_empty());
    }

    #[test]
    fn test_append_batch_zero_count() {
        let mut items = vec!["a".to_string()];
        append_batch(&mut items, "b", 0);
        assert_eq!(items, vec!["a"]);
    }

    #[test]
    fn test_clones_share_storage() {
        let seq = SharedSequence::new();
        let other = seq.clone();
        append_batch(&mut other.lock(), "zzz", 3);
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn test_racy_append_single_writer_loses_nothing() {
        let seq = SharedSequence::seeded("xxx", 1);
        for _ in 0..5 {
            seq.racy_append("vvv", Duration::ZERO);
        }
        assert_eq!(seq.len(), 6);
        assert_eq!(seq.snapshot().last().map(String::as_str), Some("vvv"));
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let seq = SharedSequence::seeded("xxx", 2);
        let clone = seq.clone();
        let _ = thread::spawn(move || {
            let _guard = clone.lock();
            panic!("panic while holding the guard");
        })
        .join();

        append_batch(&mut seq.lock(), "zzz", 1);
        assert_eq!(seq.len(), 3);
    }

    proptest! {
        #[test]
        fn test_append_batch_adds_count_in_order(
            seed in 0usize..32,
            count in 0usize..64,
            value in "[a-z]{1,4}",
        ) {
            let mut items = vec!["seed".to_string(); seed];
            append_batch(&mut items, &value, count);

            prop_assert_eq!(items.len(), seed + count);
            prop_assert!(items[seed..].iter().all(|v| v == &value));
        }

        #[test]
        fn test_append_batch_is_repeatable(count in 0usize..64) {
            let mut first = Vec::new();
            let mut second = Vec::new();
            append_batch(&mut first, "zzz", count);
            append_batch(&mut second, "zzz", count);
            prop_assert_eq!(first, second);
        }
    }
}
