//! Broker-level error types, wire error codes, and the API error envelope.

// self
use crate::{_prelude::*, refresh::ReauthReason};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Request did not carry a user identifier.
	#[error("A user id is required.")]
	MissingUserId,
	/// Request payload could not be read.
	#[error("Request is malformed: {reason}.")]
	InvalidRequest {
		/// Human-readable description of the problem.
		reason: String,
	},
	/// No token record is stored for the user.
	#[error("No token record is stored for user `{user}`.")]
	TokenNotFound {
		/// User identifier that was looked up.
		user: String,
	},
	/// The stored token cannot be refreshed; a fresh OAuth interaction is required.
	#[error("Re-authentication is required: {reason}.")]
	ReauthRequired {
		/// Decision reason that forced re-authentication.
		reason: ReauthReason,
	},
	/// The provider refresh call failed; the stored record was left untouched.
	#[error("Token refresh failed: {reason}.")]
	RefreshFailed {
		/// Underlying failure summary.
		reason: String,
	},
	/// Authorization callback carried an unknown or expired state.
	#[error("Authorization state is invalid: {reason}.")]
	InvalidState {
		/// Human-readable description of the mismatch.
		reason: String,
	},
	/// Provider rejected the grant (e.g., bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Caller exceeded its request budget.
	#[error("Too many requests, retry after {} seconds.", .retry_after.whole_seconds())]
	RateLimited {
		/// Time until the budget resets.
		retry_after: Duration,
	},
}
impl Error {
	/// Stable wire code for this error.
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::Storage(_) => ErrorCode::StorageError,
			Self::Config(_) => ErrorCode::ConfigError,
			Self::Transient(_) | Self::Transport(_) => ErrorCode::UpstreamError,
			Self::MissingUserId => ErrorCode::MissingUserId,
			Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
			Self::TokenNotFound { .. } => ErrorCode::TokenNotFound,
			Self::ReauthRequired { reason } => reason.error_code(),
			Self::RefreshFailed { .. } => ErrorCode::RefreshFailed,
			Self::InvalidState { .. } => ErrorCode::InvalidState,
			Self::InvalidGrant { .. } => ErrorCode::InvalidGrant,
			Self::InvalidClient { .. } => ErrorCode::InvalidClient,
			Self::RateLimited { .. } => ErrorCode::RateLimited,
		}
	}

	/// Returns `true` when repeating the same call later may succeed.
	pub fn retryable(&self) -> bool {
		matches!(
			self,
			Self::Storage(_) | Self::Transient(_) | Self::Transport(_) | Self::RateLimited { .. }
		)
	}

	/// HTTP status the API surface answers with for this error.
	pub fn http_status(&self) -> u16 {
		match self {
			Self::MissingUserId | Self::InvalidRequest { .. } | Self::InvalidState { .. } => 400,
			Self::ReauthRequired { .. }
			| Self::RefreshFailed { .. }
			| Self::InvalidGrant { .. }
			| Self::InvalidClient { .. } => 401,
			Self::TokenNotFound { .. } => 404,
			Self::RateLimited { .. } => 429,
			Self::Transient(_) | Self::Transport(_) => 502,
			Self::Storage(_) | Self::Config(_) => 500,
		}
	}

	/// Retry hint in whole seconds, when the error carries one.
	pub fn retry_after_secs(&self) -> Option<u64> {
		match self {
			Self::RateLimited { retry_after } => Some(retry_after.whole_seconds().max(1) as u64),
			Self::Transient(TransientError::TokenEndpoint { retry_after: Some(delay), .. }) =>
				Some(delay.whole_seconds().max(0) as u64),
			_ => None,
		}
	}
}

/// Wire error codes shared by the API surface and clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// No user id in the request.
	MissingUserId,
	/// Request body or query could not be read.
	InvalidRequest,
	/// Stored record has no refresh token.
	MissingRefreshToken,
	/// Stored refresh token is not a string.
	InvalidRefreshTokenType,
	/// Stored refresh token is blank.
	EmptyRefreshToken,
	/// Provider has no refresh semantics.
	UnknownProvider,
	/// Provider refresh call failed.
	RefreshFailed,
	/// No token record for the user.
	TokenNotFound,
	/// OAuth callback state is unknown or expired.
	InvalidState,
	/// Provider rejected the grant.
	InvalidGrant,
	/// Provider rejected the client credentials.
	InvalidClient,
	/// Request budget exhausted.
	RateLimited,
	/// Storage backend failure.
	StorageError,
	/// Local configuration failure.
	ConfigError,
	/// Provider or network failure outside of the refresh path.
	UpstreamError,
}
impl ErrorCode {
	/// Returns the wire identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::MissingUserId => "MISSING_USER_ID",
			Self::InvalidRequest => "INVALID_REQUEST",
			Self::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
			Self::InvalidRefreshTokenType => "INVALID_REFRESH_TOKEN_TYPE",
			Self::EmptyRefreshToken => "EMPTY_REFRESH_TOKEN",
			Self::UnknownProvider => "UNKNOWN_PROVIDER",
			Self::RefreshFailed => "REFRESH_FAILED",
			Self::TokenNotFound => "TOKEN_NOT_FOUND",
			Self::InvalidState => "INVALID_STATE",
			Self::InvalidGrant => "INVALID_GRANT",
			Self::InvalidClient => "INVALID_CLIENT",
			Self::RateLimited => "RATE_LIMITED",
			Self::StorageError => "STORAGE_ERROR",
			Self::ConfigError => "CONFIG_ERROR",
			Self::UpstreamError => "UPSTREAM_ERROR",
		}
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// JSON error envelope: `{"error":{"message","code","retryable","retryAfter"?}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
	/// Error payload.
	pub error: ErrorBody,
}
impl From<&Error> for ErrorEnvelope {
	fn from(err: &Error) -> Self {
		Self {
			error: ErrorBody {
				message: err.to_string(),
				code: err.code(),
				retryable: err.retryable(),
				retry_after: err.retry_after_secs(),
			},
		}
	}
}

/// Inner payload of [`ErrorEnvelope`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Human-readable message.
	pub message: String,
	/// Stable wire code.
	pub code: ErrorCode,
	/// Whether the caller may retry.
	pub retryable: bool,
	/// Retry hint in seconds.
	#[serde(rename = "retryAfter", default, skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Required environment variable is not set.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// Environment variable holds a value that cannot be parsed.
	#[error("Environment variable `{name}` holds an invalid value: {value}.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Offending value.
		value: String,
	},
	/// A limiter or queue setting is out of range.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidSetting {
		/// Setting name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// HTTP timeout cannot be represented as a non-negative duration.
	#[error("HTTP timeout must be non-negative, got {value}.")]
	InvalidTimeout {
		/// Offending duration.
		value: String,
	},
	/// Provider descriptor is invalid.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
	/// Token endpoint omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying HTTP client gave up waiting for the token endpoint.
	#[error("Timed out while calling the token endpoint.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}
