// crates.io
use oauth2::{HttpResponse, http::StatusCode};
// self
use crate::{_prelude::*, http::parse_retry_after};

/// Responses the retry queue can inspect for throttling.
pub trait RateLimitSignal {
	/// Returns `true` for HTTP 429.
	fn is_rate_limited(&self) -> bool;

	/// `Retry-After` hint relative to `now`, when present and parseable.
	fn retry_after(&self, now: OffsetDateTime) -> Option<Duration>;
}
impl RateLimitSignal for HttpResponse {
	fn is_rate_limited(&self) -> bool {
		self.status() == StatusCode::TOO_MANY_REQUESTS
	}

	fn retry_after(&self, now: OffsetDateTime) -> Option<Duration> {
		parse_retry_after(self.headers(), now)
	}
}
#[cfg(feature = "reqwest")]
impl RateLimitSignal for reqwest::Response {
	fn is_rate_limited(&self) -> bool {
		self.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
	}

	fn retry_after(&self, now: OffsetDateTime) -> Option<Duration> {
		parse_retry_after(self.headers(), now)
	}
}
