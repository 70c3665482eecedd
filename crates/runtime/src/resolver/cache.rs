//! Bounded LRU record of previously resolved applications.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Default number of references remembered.
pub const DEFAULT_CAPACITY: usize = 100;

/// What is known about a previously resolved reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
	/// Hash of the archive the bundle was extracted from.
	pub hash: Option<String>,
	/// `Last-Modified` of the remote resource when it was downloaded.
	pub last_modified: Option<DateTime<Utc>>,
	/// Local path the reference resolved to.
	pub full_path: PathBuf,
}

struct Inner {
	entries: HashMap<String, CacheEntry>,
	/// Front is least recently used.
	order: VecDeque<String>,
}

impl Inner {
	fn touch(&mut self, key: &str) {
		if let Some(pos) = self.order.iter().position(|k| k == key) {
			if let Some(k) = self.order.remove(pos) {
				self.order.push_back(k);
			}
		}
	}
}

/// Application cache keyed by the original reference.
///
/// Entries only point at files; callers check that the path still exists and
/// [`AppCache::remove`] stale entries.
pub struct AppCache {
	capacity: usize,
	inner: Mutex<Inner>,
}

impl Default for AppCache {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

impl AppCache {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity: capacity.max(1),
			inner: Mutex::new(Inner {
				entries: HashMap::new(),
				order: VecDeque::new(),
			}),
		}
	}

	/// Looks up `key`, marking it most recently used.
	pub fn get(&self, key: &str) -> Option<CacheEntry> {
		let mut inner = self.inner.lock();
		let entry = inner.entries.get(key).cloned()?;
		inner.touch(key);
		Some(entry)
	}

	/// Inserts or replaces `key`, evicting the least recently used entry when full.
	pub fn insert(&self, key: impl Into<String>, entry: CacheEntry) {
		let key = key.into();
		let mut inner = self.inner.lock();
		if inner.entries.insert(key.clone(), entry).is_some() {
			inner.touch(&key);
			return;
		}
		inner.order.push_back(key);
		while inner.order.len() > self.capacity {
			if let Some(oldest) = inner.order.pop_front() {
				inner.entries.remove(&oldest);
			}
		}
	}

	pub fn remove(&self, key: &str) -> Option<CacheEntry> {
		let mut inner = self.inner.lock();
		let removed = inner.entries.remove(key)?;
		inner.order.retain(|k| k != key);
		Some(removed)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.inner.lock().entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.inner.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}
