//! Per-order write serialization.
//!
//! Every mutation of an order runs under that order's async lock; there is
//! no global cross-order lock. Lock entries are small and live for the
//! process lifetime, which keeps a lock identity stable for an order id.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Registry of per-order async locks.
pub(crate) struct OrderLocks {
	locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OrderLocks {
	pub(crate) fn new() -> Self {
		Self {
			locks: DashMap::new(),
		}
	}

	/// Returns the lock for an order, creating it on first use.
	///
	/// Callers clone the `Arc` out so the registry shard is not held while
	/// the lock is awaited.
	pub(crate) fn lock_for(&self, order_id: &str) -> Arc<Mutex<()>> {
		self.locks
			.entry(order_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}
}
