//! Storage contracts and in-memory implementations for token records and pending authorizations.

pub mod memory;
pub mod pending;

pub use memory::MemoryStore;
pub use pending::MemoryStateStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
};

/// Boxed future returned by every store contract.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the single token record each user owns.
///
/// Writes are last-write-wins upserts keyed by user id.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Inserts or replaces the record for `record.user_id`.
	fn upsert(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record owned by `user`, if present.
	fn fetch<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Deletes the record owned by `user`, returning whether one existed.
	fn delete<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, bool>;
}

/// Keyed storage for in-progress authorization-code handshakes.
pub trait StateStore
where
	Self: Send + Sync,
{
	/// Records a pending authorization under its `state` value.
	fn insert(&self, pending: PendingAuthorization) -> StoreFuture<'_, ()>;

	/// Removes and returns the pending authorization for `state` if it has not expired at `now`.
	///
	/// Expired entries are removed as well but reported as absent.
	fn take<'a>(
		&'a self,
		state: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<PendingAuthorization>>;

	/// Evicts every entry that expired at or before `now`, returning the eviction count.
	fn sweep(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Authorization handshake awaiting its callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
	/// Opaque `state` value echoed by the provider.
	pub state: String,
	/// Redirect URI sent with the authorize request; the code exchange must repeat it.
	pub redirect_uri: Url,
	/// PKCE verifier matching the challenge in the authorize URL.
	pub pkce_verifier: String,
	/// Instant after which the callback is rejected.
	pub expires_at: OffsetDateTime,
}
impl PendingAuthorization {
	/// Returns `true` once `now` reached the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}
}
impl Debug for PendingAuthorization {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingAuthorization")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("pkce_verifier", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Error type produced by store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Stored data could not be decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as _;
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("database unreachable"));

		let source = broker_error
			.source()
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn pending_debug_hides_verifier() {
		let pending = PendingAuthorization {
			state: "abc".into(),
			redirect_uri: Url::parse("https://groove.example/callback")
				.expect("Redirect fixture should parse."),
			pkce_verifier: "verifier-secret".into(),
			expires_at: macros::datetime!(2024-01-01 00:10 UTC),
		};

		assert!(!format!("{pending:?}").contains("verifier-secret"));
		assert!(pending.is_expired_at(macros::datetime!(2024-01-01 00:10 UTC)));
		assert!(!pending.is_expired_at(macros::datetime!(2024-01-01 00:09 UTC)));
	}
}
