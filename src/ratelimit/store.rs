// self
use crate::{
	_prelude::*,
	ratelimit::RateLimitKey,
	store::{StoreError, StoreFuture},
};

/// Counter for one key inside the current fixed window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
	/// Requests counted in this window, the current one included.
	pub count: u32,
	/// Instant the window opened.
	pub window_start: OffsetDateTime,
}
impl WindowEntry {
	/// Instant the window closes.
	pub fn reset_at(&self, window: Duration) -> OffsetDateTime {
		self.window_start + window
	}

	/// Returns `true` once the window has closed at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime, window: Duration) -> bool {
		now >= self.reset_at(window)
	}
}

/// Window counter storage; the seam for a store shared across instances.
pub trait RateLimitStore
where
	Self: Send + Sync,
{
	/// Counts one request for `key`, opening a fresh window when none is live, and returns the
	/// updated entry.
	fn hit<'a>(
		&'a self,
		key: &'a RateLimitKey,
		now: OffsetDateTime,
		window: Duration,
	) -> StoreFuture<'a, WindowEntry>;

	/// Evicts entries whose window closed at or before `now`, returning the eviction count.
	fn sweep(&self, now: OffsetDateTime, window: Duration) -> StoreFuture<'_, usize>;
}

/// Single-process window store.
#[derive(Clone, Debug, Default)]
pub struct MemoryRateLimitStore(Arc<Mutex<HashMap<RateLimitKey, WindowEntry>>>);
impl MemoryRateLimitStore {
	/// Number of tracked keys.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when no keys are tracked.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}

	fn hit_now(&self, key: &RateLimitKey, now: OffsetDateTime, window: Duration) -> WindowEntry {
		let mut entries = self.0.lock();
		let entry = entries
			.entry(key.clone())
			.and_modify(|entry| {
				if entry.is_expired_at(now, window) {
					*entry = WindowEntry { count: 1, window_start: now };
				} else {
					entry.count = entry.count.saturating_add(1);
				}
			})
			.or_insert(WindowEntry { count: 1, window_start: now });

		*entry
	}
}
impl RateLimitStore for MemoryRateLimitStore {
	fn hit<'a>(
		&'a self,
		key: &'a RateLimitKey,
		now: OffsetDateTime,
		window: Duration,
	) -> StoreFuture<'a, WindowEntry> {
		Box::pin(async move { Ok::<_, StoreError>(self.hit_now(key, now, window)) })
	}

	fn sweep(&self, now: OffsetDateTime, window: Duration) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			let mut entries = self.0.lock();
			let before = entries.len();

			entries.retain(|_, entry| !entry.is_expired_at(now, window));

			Ok(before - entries.len())
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const NOW: OffsetDateTime = macros::datetime!(2024-01-01 00:00 UTC);
	const WINDOW: Duration = Duration::seconds(60);

	#[tokio::test]
	async fn first_hit_after_expiry_resets_the_window() {
		let store = MemoryRateLimitStore::default();
		let key = RateLimitKey::User("user-window".into());

		store.hit(&key, NOW, WINDOW).await.expect("Hit should succeed.");

		let second = store
			.hit(&key, NOW + Duration::seconds(59), WINDOW)
			.await
			.expect("Hit should succeed.");

		assert_eq!(second, WindowEntry { count: 2, window_start: NOW });

		let reset = store.hit(&key, NOW + WINDOW, WINDOW).await.expect("Hit should succeed.");

		assert_eq!(reset, WindowEntry { count: 1, window_start: NOW + WINDOW });
	}

	#[tokio::test]
	async fn sweep_evicts_closed_windows_only() {
		let store = MemoryRateLimitStore::default();

		store
			.hit(&RateLimitKey::Ip("203.0.113.1".into()), NOW, WINDOW)
			.await
			.expect("Hit should succeed.");
		store
			.hit(&RateLimitKey::Ip("203.0.113.2".into()), NOW + Duration::seconds(30), WINDOW)
			.await
			.expect("Hit should succeed.");

		let evicted =
			store.sweep(NOW + Duration::seconds(61), WINDOW).await.expect("Sweep should succeed.");

		assert_eq!(evicted, 1);
		assert_eq!(store.len(), 1);
	}
}
