//! Environment-derived broker settings.
//!
//! | Variable | Default |
//! | --- | --- |
//! | `SPOTIFY_CLIENT_ID` | required |
//! | `SPOTIFY_CLIENT_SECRET` | unset (public client) |
//! | `SPOTIFY_REDIRECT_URI` | unset |
//! | `GROOVE_REFRESH_BUFFER_SECS` | `300` |
//! | `GROOVE_HTTP_TIMEOUT_SECS` | `10` |
//! | `GROOVE_STATE_TTL_SECS` | `600` |
//! | `GROOVE_RATE_LIMIT_MAX` | `100` |
//! | `GROOVE_RATE_LIMIT_WINDOW_SECS` | `60` |

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::DEFAULT_HTTP_TIMEOUT,
	ratelimit::RateLimitConfig,
	refresh::DEFAULT_REFRESH_BUFFER,
};

const CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
const CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
const REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
const REFRESH_BUFFER_SECS: &str = "GROOVE_REFRESH_BUFFER_SECS";
const HTTP_TIMEOUT_SECS: &str = "GROOVE_HTTP_TIMEOUT_SECS";
const STATE_TTL_SECS: &str = "GROOVE_STATE_TTL_SECS";
const RATE_LIMIT_MAX: &str = "GROOVE_RATE_LIMIT_MAX";
const RATE_LIMIT_WINDOW_SECS: &str = "GROOVE_RATE_LIMIT_WINDOW_SECS";

/// Settings needed to stand up a Spotify broker and its rate limiter.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, when the app is a confidential client.
	pub client_secret: Option<String>,
	/// Redirect URI registered with Spotify.
	pub redirect_uri: Option<Url>,
	/// Lead time before expiry at which tokens are refreshed.
	pub refresh_buffer: Duration,
	/// Hard timeout for token endpoint calls.
	pub http_timeout: Duration,
	/// Lifetime of a pending authorization.
	pub state_ttl: Duration,
	/// Server-side limiter settings.
	pub rate_limit: RateLimitConfig,
}
impl BrokerConfig {
	/// Reads the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads settings through `lookup`; blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&'static str) -> Option<String>,
	{
		let read = |name: &'static str| {
			lookup(name).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
		};
		let client_id = read(CLIENT_ID).ok_or(ConfigError::MissingEnv { name: CLIENT_ID })?;
		let redirect_uri = read(REDIRECT_URI)
			.map(|value| {
				Url::parse(&value).map_err(|_| ConfigError::InvalidEnv { name: REDIRECT_URI, value })
			})
			.transpose()?;
		let seconds = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
			match read(name) {
				None => Ok(default),
				Some(value) => value
					.parse::<u32>()
					.map(|secs| Duration::seconds(secs.into()))
					.map_err(|_| ConfigError::InvalidEnv { name, value }),
			}
		};
		let http_timeout = seconds(HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT)?;

		if !http_timeout.is_positive() {
			return Err(ConfigError::InvalidSetting {
				name: "http_timeout",
				reason: format!("must be positive, got {http_timeout}"),
			});
		}

		let max_requests = match read(RATE_LIMIT_MAX) {
			None => RateLimitConfig::DEFAULT_MAX_REQUESTS,
			Some(value) =>
				value.parse().map_err(|_| ConfigError::InvalidEnv { name: RATE_LIMIT_MAX, value })?,
		};

		Ok(Self {
			client_id,
			client_secret: read(CLIENT_SECRET),
			redirect_uri,
			refresh_buffer: seconds(REFRESH_BUFFER_SECS, DEFAULT_REFRESH_BUFFER)?,
			http_timeout,
			state_ttl: seconds(STATE_TTL_SECS, Duration::minutes(10))?,
			rate_limit: RateLimitConfig::new(
				max_requests,
				seconds(RATE_LIMIT_WINDOW_SECS, RateLimitConfig::DEFAULT_WINDOW)?,
			)?,
		})
	}
}
impl Debug for BrokerConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerConfig")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri)
			.field("refresh_buffer", &self.refresh_buffer)
			.field("http_timeout", &self.http_timeout)
			.field("state_ttl", &self.state_ttl)
			.field("rate_limit", &self.rate_limit)
			.finish()
	}
}
