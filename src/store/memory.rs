//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	store::{StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<UserId, TokenRecord>>>;

/// Token store that keeps one record per user in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no records are stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn upsert_now(map: StoreMap, record: TokenRecord) -> Result<(), StoreError> {
		map.write().insert(record.user_id.clone(), record);

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn upsert(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::upsert_now(map, record) })
	}

	fn fetch<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(user).cloned()) })
	}

	fn delete<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(user).is_some()) })
	}
}
