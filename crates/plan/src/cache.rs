// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	collections::BTreeSet,
	sync::{
		Arc, Mutex, PoisonError,
		atomic::{AtomicU64, Ordering},
	},
};

use dashmap::DashMap;
use fedra_core::ProcessorPlan;
use tracing::debug;

use crate::{context::Determinism, error::Result};

/// Cache key of a reusable virtual-procedure plan, derived from the durable
/// (non-temporary) identity of the resolving view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
	pub fn procedure(view: impl Into<String>) -> Self {
		CacheKey(view.into())
	}
}

/// A cached compile result: the plan, the determinism classification under
/// which it was planned, and every metadata object touched while planning.
/// The touched-set drives external invalidation and is propagated into the
/// caller's context even on a hit.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPlan {
	pub plan: ProcessorPlan,
	pub determinism: Determinism,
	pub accessed: BTreeSet<String>,
}

/// Keyed store of prepared plans.
///
/// Retrieval hands out shared entries; callers `clone()` the contained plan
/// before execution so invocations never alias execution state.
pub trait PlanCache: Send + Sync {
	fn get(&self, key: &CacheKey) -> Option<Arc<PreparedPlan>>;

	fn put(&self, key: CacheKey, entry: Arc<PreparedPlan>);

	/// Return the cached entry or compile-and-store. Implementations must
	/// serialize concurrent compiles of the same key without locking the
	/// whole store: `compile` can recurse into the cache for nested
	/// procedures under other keys. The default is best-effort get/put.
	fn get_or_plan(
		&self,
		key: CacheKey,
		compile: &mut dyn FnMut() -> Result<Arc<PreparedPlan>>,
	) -> Result<Arc<PreparedPlan>> {
		if let Some(entry) = self.get(&key) {
			return Ok(entry);
		}
		let entry = compile()?;
		self.put(key, Arc::clone(&entry));
		Ok(entry)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
	pub hits: u64,
	pub misses: u64,
	pub entries: usize,
}

/// In-memory prepared-plan cache.
///
/// Misses of one key are serialized through a per-key guard so concurrent
/// first-invocations pay the compile cost once; the guard is held without
/// any map shard lock, so a compile can recurse into the cache for nested
/// procedures under other keys.
#[derive(Default)]
pub struct MemoryPlanCache {
	entries: DashMap<CacheKey, Arc<PreparedPlan>>,
	pending: DashMap<CacheKey, Arc<Mutex<()>>>,
	hits: AtomicU64,
	misses: AtomicU64,
}

impl MemoryPlanCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stats(&self) -> CacheStats {
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			entries: self.entries.len(),
		}
	}

	/// Drop every entry whose planning touched the given metadata object.
	pub fn invalidate(&self, object: &str) {
		self.entries.retain(|_, entry| !entry.accessed.contains(object));
	}

	pub fn clear(&self) {
		self.entries.clear();
		self.pending.clear();
	}
}

impl PlanCache for MemoryPlanCache {
	fn get(&self, key: &CacheKey) -> Option<Arc<PreparedPlan>> {
		match self.entries.get(key) {
			Some(entry) => {
				self.hits.fetch_add(1, Ordering::Relaxed);
				Some(Arc::clone(entry.value()))
			}
			None => {
				self.misses.fetch_add(1, Ordering::Relaxed);
				None
			}
		}
	}

	fn put(&self, key: CacheKey, entry: Arc<PreparedPlan>) {
		self.entries.insert(key, entry);
	}

	fn get_or_plan(
		&self,
		key: CacheKey,
		compile: &mut dyn FnMut() -> Result<Arc<PreparedPlan>>,
	) -> Result<Arc<PreparedPlan>> {
		if let Some(entry) = self.entries.get(&key) {
			self.hits.fetch_add(1, Ordering::Relaxed);
			return Ok(Arc::clone(entry.value()));
		}

		// Per-key guard cloned out of the map so the shard lock is
		// released before anything blocks or compiles.
		let guard = {
			let slot = self.pending.entry(key.clone()).or_default();
			Arc::clone(slot.value())
		};
		let _serialized = guard.lock().unwrap_or_else(PoisonError::into_inner);

		// Whoever held the guard first may have populated the entry
		// while this thread waited.
		if let Some(entry) = self.entries.get(&key) {
			self.hits.fetch_add(1, Ordering::Relaxed);
			return Ok(Arc::clone(entry.value()));
		}
		self.misses.fetch_add(1, Ordering::Relaxed);

		let entry = compile()?;
		debug!(key = ?key, "prepared plan cached");
		self.entries.insert(key.clone(), Arc::clone(&entry));
		drop(_serialized);
		self.pending.remove(&key);
		Ok(entry)
	}
}
