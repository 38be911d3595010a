//! In-memory [`StateStore`] keyed by the authorization `state` value.

// self
use crate::{
	_prelude::*,
	store::{PendingAuthorization, StateStore, StoreFuture},
};

type StateMap = Arc<Mutex<HashMap<String, PendingAuthorization>>>;

/// Pending authorization map with TTL-based eviction.
#[derive(Clone, Debug, Default)]
pub struct MemoryStateStore(StateMap);
impl MemoryStateStore {
	/// Number of pending entries, expired ones included until the next sweep.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when nothing is pending.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}
}
impl StateStore for MemoryStateStore {
	fn insert(&self, pending: PendingAuthorization) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.lock().insert(pending.state.clone(), pending);

			Ok(())
		})
	}

	fn take<'a>(
		&'a self,
		state: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<PendingAuthorization>> {
		let map = self.0.clone();

		Box::pin(async move {
			let pending = map.lock().remove(state);

			Ok(pending.filter(|entry| !entry.is_expired_at(now)))
		})
	}

	fn sweep(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.lock();
			let before = guard.len();

			guard.retain(|_, entry| !entry.is_expired_at(now));

			Ok(before - guard.len())
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

	fn pending(state: &str, ttl: Duration) -> PendingAuthorization {
		PendingAuthorization {
			state: state.into(),
			redirect_uri: Url::parse("https://groove.example/callback")
				.expect("Redirect fixture should parse."),
			pkce_verifier: format!("verifier-{state}"),
			expires_at: NOW + ttl,
		}
	}

	#[tokio::test]
	async fn take_is_single_use() {
		let store = MemoryStateStore::default();

		store.insert(pending("s1", Duration::minutes(10))).await.expect("Insert should succeed.");

		let first = store.take("s1", NOW).await.expect("Take should succeed.");
		let second = store.take("s1", NOW).await.expect("Take should succeed.");

		assert_eq!(first.map(|entry| entry.pkce_verifier), Some("verifier-s1".into()));
		assert!(second.is_none());
	}

	#[tokio::test]
	async fn expired_entries_are_rejected_and_swept() {
		let store = MemoryStateStore::default();

		store.insert(pending("old", Duration::minutes(1))).await.expect("Insert should succeed.");
		store.insert(pending("stale", Duration::minutes(2))).await.expect("Insert should succeed.");
		store.insert(pending("fresh", Duration::minutes(10))).await.expect("Insert should succeed.");

		let later = NOW + Duration::minutes(5);

		assert!(store.take("old", later).await.expect("Take should succeed.").is_none());
		assert_eq!(store.sweep(later).await.expect("Sweep should succeed."), 1);
		assert_eq!(store.len(), 1);
	}
}
