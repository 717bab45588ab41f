use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::store::{LockStore, StoreError};

/// Run `op` against every replica concurrently and count the successes.
///
/// One scoped thread is spawned per replica and every thread is joined
/// before returning, so a slow replica holds up the whole call. Errors and
/// panics count as failures for that replica; they are never surfaced.
pub(crate) fn act_on_stores<F>(stores: &[Arc<dyn LockStore>], op: F) -> usize
where
    F: Fn(&dyn LockStore) -> Result<bool, StoreError> + Sync,
{
    let op = &op;
    thread::scope(|scope| {
        let handles: Vec<_> = stores
            .iter()
            .enumerate()
            .map(|(replica, store)| {
                scope.spawn(move || match op(store.as_ref()) {
                    Ok(done) => done,
                    Err(err) => {
                        debug!(replica, error = %err, "replica operation failed");
                        false
                    }
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join())
            .filter(|joined| matches!(joined, Ok(true)))
            .count()
    })
}
