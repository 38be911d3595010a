//! Broker facade that ties the token store, the provider descriptor, and the token endpoint
//! client together.

pub mod authorize;
pub mod common;
pub mod refresh;

pub use authorize::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::UserId,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderDescriptor,
	refresh::{DEFAULT_REFRESH_BUFFER, RefreshMetrics},
	store::{MemoryStateStore, StateStore, TokenStore},
};
#[cfg(feature = "reqwest")]
use crate::{config::BrokerConfig, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates token lifecycle operations against a single provider.
///
/// The broker owns the HTTP client, the token and state stores, and the provider descriptor so
/// individual flows only deal with grant-specific logic. Client credentials live next to the
/// descriptor so the preferred client authentication method is applied to every token call.
#[derive(Clone)]
pub struct Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Token store holding one record per user.
	pub store: Arc<dyn TokenStore>,
	/// Pending authorization handshakes keyed by `state`.
	pub states: Arc<dyn StateStore>,
	/// Provider descriptor that defines OAuth endpoints and scopes.
	pub descriptor: ProviderDescriptor,
	/// OAuth 2.0 client identifier used in every grant.
	pub client_id: String,
	/// Optional client secret for confidential authentication methods.
	pub client_secret: Option<String>,
	/// Redirect URI used by [`Broker::start_configured_authorization`].
	pub redirect_uri: Option<Url>,
	/// Lead time before expiry at which a token is refreshed.
	pub refresh_buffer: Duration,
	/// Lifetime of a pending authorization.
	pub state_ttl: Duration,
	/// Shared metrics recorder for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	flow_guards: common::GuardMap,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Default lifetime of a pending authorization.
	pub const DEFAULT_STATE_TTL: Duration = Duration::minutes(10);

	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn TokenStore>,
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			states: Arc::new(MemoryStateStore::default()),
			descriptor,
			client_id: client_id.into(),
			client_secret: None,
			redirect_uri: None,
			refresh_buffer: DEFAULT_REFRESH_BUFFER,
			state_ttl: Self::DEFAULT_STATE_TTL,
			refresh_metrics: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Sets or replaces the client secret used for confidential client auth modes.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the redirect URI registered with the provider.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	/// Overrides the refresh buffer; negative values are treated as zero.
	pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = buffer.max(Duration::ZERO);

		self
	}

	/// Replaces the pending authorization store.
	pub fn with_state_store(mut self, states: Arc<dyn StateStore>) -> Self {
		self.states = states;

		self
	}

	/// Overrides the pending authorization lifetime.
	pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
		self.state_ttl = ttl;

		self
	}

	/// Removes the token record owned by `user`, returning whether one existed.
	pub async fn logout(&self, user: &UserId) -> Result<bool> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = common::lock_flow(self, user).await;

				<dyn TokenStore>::delete(self.store.as_ref(), user).await.map_err(Error::from)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport (default timeout, no redirects).
	///
	/// Use [`Broker::with_client_secret`] to attach the client secret the descriptor's
	/// client authentication method needs.
	pub fn new(
		store: Arc<dyn TokenStore>,
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
	) -> Result<Self> {
		Ok(Self::with_http_client(
			store,
			descriptor,
			client_id,
			ReqwestHttpClient::new()?,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}

	/// Creates a Spotify broker from environment-derived settings.
	pub fn from_config(config: &BrokerConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
		let descriptor = ProviderDescriptor::spotify().map_err(crate::error::ConfigError::from)?;
		let http_client = ReqwestHttpClient::with_timeout(config.http_timeout)?;
		let mut broker = Self::with_http_client(
			store,
			descriptor,
			config.client_id.clone(),
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_refresh_buffer(config.refresh_buffer)
		.with_state_ttl(config.state_ttl);

		if let Some(secret) = &config.client_secret {
			broker = broker.with_client_secret(secret.clone());
		}
		if let Some(redirect_uri) = &config.redirect_uri {
			broker = broker.with_redirect_uri(redirect_uri.clone());
		}

		Ok(broker)
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri)
			.field("refresh_buffer", &self.refresh_buffer)
			.field("state_ttl", &self.state_ttl)
			.finish()
	}
}
