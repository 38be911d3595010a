// self
use crate::{
	_prelude::*,
	auth::{Provider, TokenRecord, TokenSecret},
	error::ErrorCode,
	refresh::{RefreshResult, calculate_new_expiration},
};

/// Values to merge into the stored record after a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessedRefresh {
	/// New access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, or the previously stored one.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry of the new access token.
	pub expires_at: OffsetDateTime,
}
impl ProcessedRefresh {
	/// Returns `record` with the refreshed values applied.
	pub fn apply_to(self, record: TokenRecord) -> TokenRecord {
		TokenRecord {
			access_token: self.access_token,
			refresh_token: self.refresh_token,
			expires_at: self.expires_at,
			..record
		}
	}
}
impl Debug for ProcessedRefresh {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProcessedRefresh")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Reasons a refresh result cannot be merged.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ProcessError {
	/// Provider has no refresh semantics.
	#[error("Provider `{provider}` does not support token refresh.")]
	UnknownProvider {
		/// Offending provider label.
		provider: String,
	},
	/// The provider call failed.
	#[error("Token refresh failed: {reason}.")]
	RefreshFailed {
		/// Failure summary.
		reason: String,
	},
}
impl ProcessError {
	/// Stable wire code.
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::UnknownProvider { .. } => ErrorCode::UnknownProvider,
			Self::RefreshFailed { .. } => ErrorCode::RefreshFailed,
		}
	}

	/// Processing errors are never retryable.
	pub fn retryable(&self) -> bool {
		false
	}
}
impl From<ProcessError> for Error {
	fn from(e: ProcessError) -> Self {
		match e {
			ProcessError::UnknownProvider { .. } =>
				Error::ReauthRequired { reason: crate::refresh::ReauthReason::UnknownProvider },
			ProcessError::RefreshFailed { reason } => Error::RefreshFailed { reason },
		}
	}
}

/// Merges an executor result into the stored record's values.
///
/// A missing rotated refresh token keeps the one already stored on `record`.
pub fn process_refresh_result(
	record: &TokenRecord,
	result: RefreshResult,
	provider: &Provider,
	now: OffsetDateTime,
) -> Result<ProcessedRefresh, ProcessError> {
	if !provider.is_refreshable() {
		return Err(ProcessError::UnknownProvider { provider: provider.to_string() });
	}

	let grant = match result {
		RefreshResult::Refreshed(grant) => grant,
		RefreshResult::Failed(e) => return Err(ProcessError::RefreshFailed { reason: e.to_string() }),
	};

	Ok(ProcessedRefresh {
		access_token: grant.access_token,
		refresh_token: grant.refresh_token.or_else(|| record.refresh_token.clone()),
		expires_at: calculate_new_expiration(grant.expires_in, now),
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{auth::UserId, refresh::RefreshGrant};

	const NOW: OffsetDateTime = macros::datetime!(2024-01-01 00:00 UTC);

	fn record() -> TokenRecord {
		TokenRecord::builder(
			UserId::new("user-process").expect("User fixture should be valid."),
			Provider::Spotify,
		)
		.access_token("access-old")
		.refresh_token("refresh-old")
		.expires_at(NOW - Duration::minutes(1))
		.build()
		.expect("Token record fixture should build.")
	}

	fn grant(refresh: Option<&str>) -> RefreshResult {
		RefreshResult::Refreshed(RefreshGrant {
			access_token: TokenSecret::new("access-new"),
			refresh_token: refresh.map(TokenSecret::new),
			expires_in: 3_600,
		})
	}

	#[test]
	fn missing_rotation_keeps_the_stored_refresh_token() {
		let record = record();
		let processed = process_refresh_result(&record, grant(None), &Provider::Spotify, NOW)
			.expect("Successful refresh should process.");

		assert_eq!(processed.access_token.expose(), "access-new");
		assert_eq!(processed.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-old"));
		assert_eq!(processed.expires_at, macros::datetime!(2024-01-01 01:00 UTC));

		let merged = processed.apply_to(record);

		assert_eq!(merged.user_id.as_ref(), "user-process");
		assert_eq!(merged.access_token.expose(), "access-new");
	}

	#[test]
	fn rotated_refresh_tokens_replace_the_stored_one() {
		let processed = process_refresh_result(&record(), grant(Some("refresh-new")), &Provider::Spotify, NOW)
			.expect("Successful refresh should process.");

		assert_eq!(processed.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-new"));
	}

	#[test]
	fn failures_and_foreign_providers_are_not_retryable() {
		let err = process_refresh_result(
			&record(),
			RefreshResult::Failed(Error::InvalidGrant { reason: "revoked".into() }),
			&Provider::Spotify,
			NOW,
		)
		.expect_err("Failed refresh should not process.");

		assert_eq!(err.code(), ErrorCode::RefreshFailed);
		assert!(!err.retryable());
		assert_eq!(Error::from(err).code(), ErrorCode::RefreshFailed);

		let err = process_refresh_result(&record(), grant(None), &Provider::Apple, NOW)
			.expect_err("Apple records should not process.");

		assert_eq!(err.code(), ErrorCode::UnknownProvider);
		assert!(!err.retryable());
	}
}
