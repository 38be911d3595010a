//! Token record structs, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{Provider, UserId, token::secret::TokenSecret},
};

/// Current lifecycle status for a token record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is valid beyond the refresh buffer.
	Active,
	/// Token is still valid but inside the refresh buffer.
	Expiring,
	/// Token reached its expiry instant.
	Expired,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// The single live token record owned by a user.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenRecord {
	/// Owner of the record; at most one record exists per user.
	pub user_id: UserId,
	/// Provider that issued the tokens.
	pub provider: Provider,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry instant of the access token.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Returns a builder for constructing records.
	pub fn builder(user_id: UserId, provider: Provider) -> TokenRecordBuilder {
		TokenRecordBuilder::new(user_id, provider)
	}

	/// Computes the lifecycle status at a given instant for the provided refresh buffer.
	pub fn status_at(&self, instant: OffsetDateTime, buffer: Duration) -> TokenStatus {
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}
		if crate::refresh::needs_refresh(self.expires_at, instant, buffer) {
			return TokenStatus::Expiring;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Time left before the access token expires (negative once expired).
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("user_id", &self.user_id)
			.field("provider", &self.provider)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	user_id: UserId,
	provider: Provider,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(user_id: UserId, provider: Provider) -> Self {
		Self {
			user_id,
			provider,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the instant `expires_in` is measured from (defaults to the current clock).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides an optional refresh token secret.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => self.issued_at.unwrap_or_else(OffsetDateTime::now_utc) + delta,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			user_id: self.user_id,
			provider: self.provider,
			access_token,
			refresh_token: self.refresh_token,
			expires_at,
		})
	}
}
