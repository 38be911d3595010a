//! Shared helpers for flow implementations (guards, random tokens, record building).

// crates.io
use async_lock::MutexGuardArc;
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{TokenRecordBuilderError, UserId},
	error::ConfigError,
	flows::Broker,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

pub(crate) type GuardMap = Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>;

/// Held singleflight slot for one user.
///
/// Dropping it releases the slot and forgets the user once nobody else is waiting on it.
pub(crate) struct FlowGuard {
	guards: GuardMap,
	user: UserId,
	lock: Option<MutexGuardArc<()>>,
}
impl Drop for FlowGuard {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		self.lock.take();

		if guards.get(&self.user).is_some_and(|slot| Arc::strong_count(slot) == 1) {
			guards.remove(&self.user);
		}
	}
}

/// Waits for the singleflight slot of `user`, creating it on demand.
pub(crate) async fn lock_flow<C, M>(broker: &Broker<C, M>, user: &UserId) -> FlowGuard
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	// Clones are only taken under the map lock, so the count checked on drop is exact.
	let slot = broker.flow_guards.lock().entry(user.clone()).or_default().clone();
	let lock = slot.lock_arc().await;

	FlowGuard { guards: broker.flow_guards.clone(), user: user.clone(), lock: Some(lock) }
}

/// Alphanumeric string drawn from the thread-local CSPRNG.
pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

/// Normalizes token builder errors into broker errors.
pub(crate) fn map_token_builder_error(err: TokenRecordBuilderError) -> Error {
	ConfigError::from(err).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	#[cfg(feature = "reqwest")]
	use crate::{
		flows::ReqwestBroker,
		provider::ProviderDescriptor,
		store::{MemoryStore, TokenStore},
	};

	#[cfg(feature = "reqwest")]
	fn broker() -> ReqwestBroker {
		let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::default());
		let descriptor = ProviderDescriptor::spotify().expect("Spotify descriptor should build.");

		ReqwestBroker::new(store, descriptor, "client-groove").expect("Broker should build.")
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn guards_are_forgotten_once_released() {
		let broker = broker();

		for idx in 0..64 {
			let user = UserId::new(format!("user-{idx}")).expect("User fixture should be valid.");
			let err = broker
				.ensure_fresh_token(&user)
				.await
				.expect_err("Unknown users should not have a token.");

			assert!(matches!(err, Error::TokenNotFound { .. }));
		}

		let user = UserId::new("user-logout").expect("User fixture should be valid.");

		assert!(!broker.logout(&user).await.expect("Logout should succeed."));
		assert!(broker.flow_guards.lock().is_empty());
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn guards_survive_while_another_caller_waits() {
		let broker = Arc::new(broker());
		let user = UserId::new("user-busy").expect("User fixture should be valid.");
		let first = lock_flow(broker.as_ref(), &user).await;
		let waiter = tokio::spawn({
			let broker = broker.clone();
			let user = user.clone();

			async move {
				let _second = lock_flow(broker.as_ref(), &user).await;
			}
		});

		tokio::task::yield_now().await;
		drop(first);

		assert_eq!(broker.flow_guards.lock().len(), 1);

		waiter.await.expect("Waiter should not panic.");

		assert!(broker.flow_guards.lock().is_empty());
	}

	#[test]
	fn random_strings_are_alphanumeric() {
		let value = random_string(32);

		assert_eq!(value.len(), 32);
		assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(value, random_string(32));
	}
}
