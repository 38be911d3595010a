// self
use crate::{_prelude::*, auth::TokenSecret, oauth::TokenEndpointResponse};

/// Tokens granted by a successful refresh call.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshGrant {
	/// New access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, absent when the provider did not rotate it.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the new access token in seconds.
	pub expires_in: u64,
}
impl Debug for RefreshGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshGrant")
			.field("access_token", &"<redacted>")
			.field("rotated", &self.refresh_token.is_some())
			.field("expires_in", &self.expires_in)
			.finish()
	}
}
impl From<TokenEndpointResponse> for RefreshGrant {
	fn from(response: TokenEndpointResponse) -> Self {
		Self {
			access_token: response.access_token,
			refresh_token: response.refresh_token,
			expires_in: response.expires_in,
		}
	}
}

/// Outcome of a single provider refresh call.
///
/// Failures are carried as values; the executor never retries.
#[derive(Debug)]
pub enum RefreshResult {
	/// Provider issued new tokens.
	Refreshed(RefreshGrant),
	/// Provider call failed (non-2xx, transport error, timeout, or malformed body).
	Failed(Error),
}
impl RefreshResult {
	/// Returns `true` for [`RefreshResult::Refreshed`].
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Refreshed(_))
	}
}
impl From<Result<TokenEndpointResponse>> for RefreshResult {
	fn from(result: Result<TokenEndpointResponse>) -> Self {
		match result {
			Ok(response) => Self::Refreshed(response.into()),
			Err(e) => Self::Failed(e),
		}
	}
}
