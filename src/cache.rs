//! Shared NFP cache.
//!
//! Maps a canonical NFP query key to its computed outcome. The contract for
//! concurrent workers:
//!
//! - at most one computation runs per key; a second caller requesting a key
//!   that is being computed blocks until the first result is published,
//! - published values are immutable and handed out as `Arc` clones,
//! - failures are cached too (`NoFit` / `Degenerate`), so a bad pair is never
//!   retried.
//!
//! The map mutex only guards slot lookup/insertion; the per-key `OnceLock`
//! provides the compute-once-and-wait semantics, so reads after publication
//! do not contend on the map for long.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::nfp::NfpOutcome;

/// Canonical identity of an NFP query.
///
/// Rotations are quantised to millidegrees so floating-point angles hash and
/// compare deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NfpKey {
    pub a_id: i64,
    pub b_id: i64,
    pub a_rot_mdeg: i32,
    pub b_rot_mdeg: i32,
    pub inside: bool,
}

impl NfpKey {
    pub fn new(a_id: i64, b_id: i64, a_rot_deg: f64, b_rot_deg: f64, inside: bool) -> Self {
        Self {
            a_id,
            b_id,
            a_rot_mdeg: quantise(a_rot_deg),
            b_rot_mdeg: quantise(b_rot_deg),
            inside,
        }
    }
}

fn quantise(degrees: f64) -> i32 {
    (degrees.rem_euclid(360.0) * 1000.0).round() as i32 % 360_000
}

type Slot = Arc<OnceLock<Arc<NfpOutcome>>>;

/// In-memory NFP cache, alive for one nesting job.
#[derive(Debug, Default)]
pub struct NfpCache {
    slots: Mutex<HashMap<NfpKey, Slot>>,
}

impl NfpCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached outcome for `key`, computing it with `compute` if
    /// absent. Concurrent callers for the same key run `compute` once; the
    /// rest wait for the published value.
    pub fn get_or_compute<F>(&self, key: NfpKey, compute: F) -> Arc<NfpOutcome>
    where
        F: FnOnce() -> NfpOutcome,
    {
        let slot: Slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(key).or_default().clone()
        };
        slot.get_or_init(|| Arc::new(compute())).clone()
    }

    /// Cached outcome for `key`, if any has been published.
    pub fn get(&self, key: &NfpKey) -> Option<Arc<NfpOutcome>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::nfp::{Nfp, Region};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dummy_outcome() -> NfpOutcome {
        NfpOutcome::Fit(Nfp {
            regions: vec![Region {
                outer: vec![
                    Point::new(0.0, 0.0),
                    Point::new(1.0, 0.0),
                    Point::new(1.0, 1.0),
                ],
                holes: Vec::new(),
            }],
        })
    }

    #[test]
    fn test_compute_once() {
        let cache = NfpCache::new();
        let key = NfpKey::new(-1, 0, 0.0, 90.0, true);
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_compute(key, || {
            calls.fetch_add(1, Ordering::SeqCst);
            dummy_outcome()
        });
        let second = cache.get_or_compute(key, || {
            calls.fetch_add(1, Ordering::SeqCst);
            dummy_outcome()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_cached() {
        let cache = NfpCache::new();
        let key = NfpKey::new(0, 1, 0.0, 0.0, false);
        let calls = AtomicUsize::new(0);

        cache.get_or_compute(key, || {
            calls.fetch_add(1, Ordering::SeqCst);
            NfpOutcome::NoFit
        });
        let again = cache.get_or_compute(key, || {
            calls.fetch_add(1, Ordering::SeqCst);
            dummy_outcome()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(*again, NfpOutcome::NoFit));
    }

    #[test]
    fn test_rotations_key_separately() {
        let cache = NfpCache::new();
        cache.get_or_compute(NfpKey::new(0, 1, 0.0, 0.0, false), dummy_outcome);
        cache.get_or_compute(NfpKey::new(0, 1, 0.0, 90.0, false), dummy_outcome);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_key_quantisation_wraps() {
        assert_eq!(
            NfpKey::new(0, 1, 360.0, 0.0, false),
            NfpKey::new(0, 1, 0.0, 0.0, false)
        );
        assert_eq!(
            NfpKey::new(0, 1, -90.0, 0.0, false),
            NfpKey::new(0, 1, 270.0, 0.0, false)
        );
    }

    #[test]
    fn test_concurrent_single_compute() {
        use std::sync::Barrier;

        let cache = Arc::new(NfpCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let key = NfpKey::new(-1, 3, 0.0, 180.0, true);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_compute(key, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Give the other threads a chance to pile up on the slot.
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        dummy_outcome()
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for pair in results.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }
}
