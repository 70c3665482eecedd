//! Per-reference mutual exclusion.
//!
//! Callers for the same key queue on one async mutex; different keys never
//! contend. Lock entries are dropped from the map once nobody holds or waits
//! on them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = Arc<DashMap<String, Arc<Mutex<()>>>>;

#[derive(Default, Clone)]
pub struct KeyedGuard {
	locks: LockMap,
}

impl KeyedGuard {
	pub fn new() -> Self {
		Self::default()
	}

	/// Waits until no one else holds `key`, then holds it until the returned guard drops.
	pub async fn acquire(&self, key: &str) -> ResolutionGuard {
		let lock = self
			.locks
			.entry(key.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();
		let held = lock.lock_owned().await;
		ResolutionGuard {
			key: key.to_string(),
			locks: Arc::clone(&self.locks),
			held: Some(held),
		}
	}

	/// Number of keys currently held or awaited.
	pub fn active_keys(&self) -> usize {
		self.locks.len()
	}
}

/// Exclusive claim on one reference.
pub struct ResolutionGuard {
	key: String,
	locks: LockMap,
	held: Option<OwnedMutexGuard<()>>,
}

impl ResolutionGuard {
	pub fn key(&self) -> &str {
		&self.key
	}
}

impl Drop for ResolutionGuard {
	fn drop(&mut self) {
		drop(self.held.take());
		self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use super::*;

	#[tokio::test]
	async fn same_key_serializes() {
		let guard = KeyedGuard::new();
		let inside = Arc::new(AtomicUsize::new(0));
		let max_inside = Arc::new(AtomicUsize::new(0));

		let mut tasks = Vec::new();
		for _ in 0..8 {
			let guard = guard.clone();
			let inside = Arc::clone(&inside);
			let max_inside = Arc::clone(&max_inside);
			tasks.push(tokio::spawn(async move {
				let _held = guard.acquire("app.zip").await;
				let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
				max_inside.fetch_max(now, Ordering::SeqCst);
				tokio::time::sleep(Duration::from_millis(5)).await;
				inside.fetch_sub(1, Ordering::SeqCst);
			}));
		}
		for task in tasks {
			task.await.unwrap();
		}

		assert_eq!(max_inside.load(Ordering::SeqCst), 1);
		assert_eq!(guard.active_keys(), 0);
	}

	#[tokio::test]
	async fn different_keys_do_not_block() {
		let guard = KeyedGuard::new();
		let a = guard.acquire("a").await;
		let b = tokio::time::timeout(Duration::from_millis(100), guard.acquire("b")).await;
		assert!(b.is_ok());
		assert_eq!(a.key(), "a");
		assert_eq!(guard.active_keys(), 2);
	}
}
