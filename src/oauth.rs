//! Token endpoint client built on the `oauth2` crate.
//!
//! [`TokenClient`] issues the two grants the broker needs (`refresh_token` and
//! `authorization_code`) and maps every failure into the broker [`Error`] taxonomy.

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{ClientAuthMethod, GrantType, ProviderDescriptor},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenEndpointResponse>> + 'a + Send>>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() => ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransientError::TokenEndpoint {
				message: format!("HTTP client failed during the {grant} grant: {message}"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			_ => TransientError::TokenEndpoint {
				message: format!("HTTP client failed during the {grant} grant"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}
}

/// Successful token endpoint payload, reduced to what the broker persists.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenEndpointResponse {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token; `None` when the provider kept the old one.
	pub refresh_token: Option<TokenSecret>,
	/// Access token lifetime in seconds (always positive).
	pub expires_in: u64,
	/// Space-delimited scopes granted, when echoed back.
	pub scope: Option<String>,
}
impl Debug for TokenEndpointResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpointResponse")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Token endpoint client bound to one descriptor and one set of client credentials.
pub(crate) struct TokenClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> TokenClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: Option<&str>,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Self {
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_auth_uri(AuthUrl::from_url(descriptor.endpoints.authorization.clone()))
			.set_token_uri(TokenUrl::from_url(descriptor.endpoints.token.clone()));

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}
		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Self { oauth_client, http_client, error_mapper }
	}

	/// `grant_type=refresh_token`; never retried.
	pub(crate) fn refresh_token<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.with_metadata(meta.clone());
			let secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&secret)
				.request_async(&handle)
				.await
				.map_err(|e| {
					map_request_error(GrantType::RefreshToken, meta.take(), e, self.error_mapper.as_ref())
				})?;

			TokenEndpointResponse::try_from(response)
		})
	}

	/// `grant_type=authorization_code` with the PKCE verifier and the original redirect URI.
	pub(crate) fn exchange_authorization_code<'a>(
		&'a self,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
	) -> TokenFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.with_metadata(meta.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(RedirectUrl::from_url(redirect_uri.clone())))
				.request_async(&handle)
				.await
				.map_err(|e| {
					map_request_error(
						GrantType::AuthorizationCode,
						meta.take(),
						e,
						self.error_mapper.as_ref(),
					)
				})?;

			TokenEndpointResponse::try_from(response)
		})
	}
}
impl TryFrom<oauth2::basic::BasicTokenResponse> for TokenEndpointResponse {
	type Error = Error;

	fn try_from(response: oauth2::basic::BasicTokenResponse) -> Result<Self> {
		let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();

		if expires_in == 0 {
			return Err(ConfigError::NonPositiveExpiresIn.into());
		}
		if i64::try_from(expires_in).is_err() {
			return Err(ConfigError::ExpiresInOutOfRange.into());
		}

		let refresh_token = response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned()))
			.filter(|secret| !secret.is_blank());
		let scope = response.scopes().map(|scopes| {
			scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ")
		});

		Ok(Self {
			access_token: TokenSecret::new(response.access_token().secret().to_owned()),
			refresh_token,
			expires_in,
			scope,
		})
	}
}

fn map_request_error<E, M>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta),
		RequestTokenError::Request(error) => mapper.map_transport_error(grant, meta, error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::TokenResponseParse { source: error, status: meta_status(meta) }.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response_error(response: BasicErrorResponse, meta: Option<&ResponseMetadata>) -> Error {
	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidGrant => Error::InvalidGrant { reason: message },
		BasicErrorResponseType::InvalidClient | BasicErrorResponseType::UnauthorizedClient =>
			Error::InvalidClient { reason: message },
		_ => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
