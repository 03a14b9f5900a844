// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Shared synchronization primitives for the router's concurrent state tables.
//!
//! The ARP cache and the NAT engine each guard their state behind a single mutex that
//! must be re-entrant: a sweeper thread holding the lock may call back into the very
//! table operations that also acquire it (see the ARP sweeper's unreachable path).
//! [`ReentrantMutex`] is the primitive both tables are built on.

#![deny(unsafe_code, missing_docs, clippy::all, clippy::pedantic)]

pub use std::sync;
pub use std::thread;

use parking_lot::RawThreadId;

/// A mutex that may be re-acquired by the thread that already holds it.
///
/// Re-entrant acquisition is needed because a sweeper may, while holding the lock,
/// invoke an operation (e.g. enqueuing a packet against a fresh pending request) that
/// itself locks the same table.
pub type ReentrantMutex<T> = parking_lot::ReentrantMutex<T>;

/// Re-exports the thread-id strategy used by [`ReentrantMutex`], for crates that need
/// to name the type explicitly.
pub type ThreadIdStrategy = RawThreadId;

#[cfg(test)]
mod tests {
    use super::ReentrantMutex;
    use std::cell::Cell;

    #[test]
    fn reentrant_mutex_allows_nested_lock_same_thread() {
        let m = ReentrantMutex::new(Cell::new(0));
        let outer = m.lock();
        outer.set(1);
        {
            let inner = m.lock();
            inner.set(2);
        }
        assert_eq!(outer.get(), 2);
    }
}
