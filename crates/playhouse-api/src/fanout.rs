// Partial-failure fan-out
//
// Every multi-device operation runs its calls concurrently and wants all of
// the outcomes, not just the first error. `settle` drives the whole batch
// inside the calling task and splits the outcomes by key.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use futures_util::future::join_all;

/// Outcome of a settled batch: every key lands in exactly one map.
#[derive(Debug)]
pub struct Settled<K, T, E> {
    pub results: HashMap<K, T>,
    pub errors: HashMap<K, E>,
}

impl<K, T, E> Default for Settled<K, T, E> {
    fn default() -> Self {
        Self {
            results: HashMap::new(),
            errors: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, T, E> Settled<K, T, E> {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of operations that were settled.
    pub fn len(&self) -> usize {
        self.results.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run every operation to completion and collect results and errors by key.
///
/// A failing operation never cancels its siblings. If a key appears twice
/// the later outcome replaces the earlier one.
pub async fn settle<K, F, T, E>(ops: impl IntoIterator<Item = (K, F)>) -> Settled<K, T, E>
where
    K: Eq + Hash,
    F: Future<Output = Result<T, E>>,
{
    let (keys, futures): (Vec<K>, Vec<F>) = ops.into_iter().unzip();
    let outcomes = join_all(futures).await;

    let mut settled = Settled::default();
    for (key, outcome) in keys.into_iter().zip(outcomes) {
        match outcome {
            Ok(value) => {
                settled.errors.remove(&key);
                settled.results.insert(key, value);
            }
            Err(err) => {
                settled.results.remove(&key);
                settled.errors.insert(key, err);
            }
        }
    }
    settled
}
