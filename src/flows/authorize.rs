//! Authorization Code + PKCE login: authorize URL, callback exchange, and first save.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret, UserId},
	error::ConfigError,
	flows::{Broker, common},
	http::TokenHttpClient,
	oauth::{TokenClient, TokenEndpointResponse, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderDescriptor,
	refresh::calculate_new_expiration,
	store::{PendingAuthorization, StateStore, TokenStore},
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Handshake returned by [`Broker::start_authorization`].
///
/// The PKCE verifier stays in the state store; only the challenge leaves the broker.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Redirect URI supplied when constructing the authorize URL.
	pub redirect_uri: Url,
	/// Authorize URL the end user should be sent to.
	pub authorize_url: Url,
	/// Instant after which the callback is rejected.
	pub expires_at: OffsetDateTime,
	pkce: PkcePair,
}
impl AuthorizationSession {
	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("expires_at", &self.expires_at)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

/// Tokens issued by the authorization code exchange, not yet bound to a user.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedTokens {
	/// Access token.
	pub access_token: TokenSecret,
	/// Refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry of `access_token`.
	pub expires_at: OffsetDateTime,
	/// Granted scopes as echoed by the provider.
	pub scope: Option<String>,
}
impl IssuedTokens {
	fn from_response(response: TokenEndpointResponse, now: OffsetDateTime) -> Self {
		Self {
			access_token: response.access_token,
			refresh_token: response.refresh_token,
			expires_at: calculate_new_expiration(response.expires_in, now),
			scope: response.scope,
		}
	}
}
impl Debug for IssuedTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedTokens")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.finish()
	}
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts an Authorization Code + PKCE handshake and records it as pending.
	///
	/// Expired handshakes are swept on the way in.
	pub async fn start_authorization(&self, redirect_uri: Url) -> Result<AuthorizationSession> {
		const KIND: FlowKind = FlowKind::Authorization;

		let span = FlowSpan::new(KIND, "start_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let now = OffsetDateTime::now_utc();

				if let Err(e) = <dyn StateStore>::sweep(self.states.as_ref(), now).await {
					obs::warn_swallowed("pending authorization sweep", &e);
				}

				let expires_at = now + self.state_ttl;
				let session =
					build_session(&self.descriptor, &self.client_id, redirect_uri, expires_at);
				let pending = PendingAuthorization {
					state: session.state.clone(),
					redirect_uri: session.redirect_uri.clone(),
					pkce_verifier: session.pkce.verifier.clone(),
					expires_at: session.expires_at,
				};

				<dyn StateStore>::insert(self.states.as_ref(), pending).await?;

				Ok(session)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Starts a handshake against the redirect URI configured on the broker.
	pub async fn start_configured_authorization(&self) -> Result<AuthorizationSession> {
		let redirect_uri = self.redirect_uri.clone().ok_or(ConfigError::InvalidSetting {
			name: "redirect_uri",
			reason: "no redirect URI is configured".into(),
		})?;

		self.start_authorization(redirect_uri).await
	}

	/// Consumes the pending handshake for `state` and exchanges `code` for tokens.
	///
	/// Unknown, reused, and expired states fail with [`Error::InvalidState`] before the provider
	/// is contacted.
	pub async fn complete_authorization(&self, state: &str, code: &str) -> Result<IssuedTokens> {
		const KIND: FlowKind = FlowKind::Authorization;

		let span = FlowSpan::new(KIND, "complete_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let pending =
					<dyn StateStore>::take(self.states.as_ref(), state, OffsetDateTime::now_utc())
						.await?
						.ok_or_else(|| Error::InvalidState {
							reason: "state is unknown or has expired".into(),
						})?;
				let client = <TokenClient<C, M>>::from_descriptor(
					&self.descriptor,
					&self.client_id,
					self.client_secret.as_deref(),
					self.http_client.clone(),
					self.transport_mapper.clone(),
				);
				let response = client
					.exchange_authorization_code(code, &pending.pkce_verifier, &pending.redirect_uri)
					.await?;

				Ok(IssuedTokens::from_response(response, OffsetDateTime::now_utc()))
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Binds issued tokens to `user`, replacing any record the user already had.
	pub async fn save_issued_tokens(
		&self,
		user: UserId,
		issued: IssuedTokens,
	) -> Result<TokenRecord> {
		let _singleflight = common::lock_flow(self, &user).await;
		let record = TokenRecord::builder(user, self.descriptor.kind.clone())
			.access_token(issued.access_token.expose())
			.maybe_refresh_token(issued.refresh_token)
			.expires_at(issued.expires_at)
			.build()
			.map_err(common::map_token_builder_error)?;

		<dyn TokenStore>::upsert(self.store.as_ref(), record.clone()).await?;

		Ok(record)
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = common::random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

fn build_session(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: Url,
	expires_at: OffsetDateTime,
) -> AuthorizationSession {
	let state = common::random_string(STATE_LEN);
	let pkce = PkcePair::generate();
	let authorize_url = build_authorize_url(descriptor, client_id, &redirect_uri, &state, &pkce);

	AuthorizationSession { state, redirect_uri, authorize_url, expires_at, pkce }
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: &Url,
	state: &str,
	pkce: &PkcePair,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if let Some(scope) = descriptor.scope_param() {
		pairs.append_pair("scope", &scope);
	}

	pairs.append_pair("state", state);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", pkce.method.as_str());

	drop(pairs);

	url
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}
