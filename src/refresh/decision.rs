// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{Provider, TokenRecord, TokenRow, TokenSecret},
	error::ErrorCode,
	store::StoreError,
};

/// Lead time before expiry at which a refresh is triggered.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::minutes(5);

/// Action the lifecycle manager should take for a stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshAction {
	/// Token is still usable.
	None,
	/// Token should be refreshed with the stored refresh token.
	Refresh,
	/// Token cannot be refreshed; the user must sign in again.
	Reauth,
}
impl RefreshAction {
	/// Returns a stable label suitable for logs and API payloads.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Refresh => "refresh",
			Self::Reauth => "reauth",
		}
	}
}

/// Why a record cannot be refreshed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReauthReason {
	/// Provider has no refresh semantics.
	UnknownProvider,
	/// Record carries no refresh token.
	MissingRefreshToken,
	/// Stored refresh token is not a string.
	InvalidRefreshTokenType,
	/// Stored refresh token is blank.
	EmptyRefreshToken,
}
impl ReauthReason {
	/// Returns the wire code.
	pub const fn as_str(self) -> &'static str {
		self.error_code().as_str()
	}

	/// Maps the reason onto the shared error code table.
	pub const fn error_code(self) -> ErrorCode {
		match self {
			Self::UnknownProvider => ErrorCode::UnknownProvider,
			Self::MissingRefreshToken => ErrorCode::MissingRefreshToken,
			Self::InvalidRefreshTokenType => ErrorCode::InvalidRefreshTokenType,
			Self::EmptyRefreshToken => ErrorCode::EmptyRefreshToken,
		}
	}
}
impl Display for ReauthReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome of [`determine_refresh_action`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshDecision {
	/// Token still valid.
	None,
	/// Token needs refresh.
	Refresh,
	/// Token must be replaced through a fresh OAuth interaction.
	Reauth(ReauthReason),
}
impl RefreshDecision {
	/// Action component of the decision.
	pub const fn action(self) -> RefreshAction {
		match self {
			Self::None => RefreshAction::None,
			Self::Refresh => RefreshAction::Refresh,
			Self::Reauth(_) => RefreshAction::Reauth,
		}
	}

	/// Human-readable reason; re-authentication reasons use their wire code.
	pub const fn reason(self) -> &'static str {
		match self {
			Self::None => "token still valid",
			Self::Refresh => "token needs refresh",
			Self::Reauth(reason) => reason.as_str(),
		}
	}
}

/// Validation failures for a stored refresh token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshTokenIssue {
	/// No refresh token is stored.
	#[error("Refresh token is missing.")]
	Missing,
	/// The stored value is not a string.
	#[error("Refresh token is not a string.")]
	InvalidType,
	/// The stored value is empty after trimming.
	#[error("Refresh token is empty.")]
	Empty,
}
impl From<RefreshTokenIssue> for ReauthReason {
	fn from(issue: RefreshTokenIssue) -> Self {
		match issue {
			RefreshTokenIssue::Missing => Self::MissingRefreshToken,
			RefreshTokenIssue::InvalidType => Self::InvalidRefreshTokenType,
			RefreshTokenIssue::Empty => Self::EmptyRefreshToken,
		}
	}
}

/// Borrowed view over a refresh token in whichever shape it was stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshTokenView<'a> {
	/// Column is absent or null.
	Absent,
	/// Column holds a non-string JSON value.
	NotString,
	/// Column holds a string.
	Text(&'a str),
}
impl<'a> RefreshTokenView<'a> {
	/// Views a typed secret.
	pub fn from_secret(secret: Option<&'a TokenSecret>) -> Self {
		match secret {
			Some(secret) => Self::Text(secret.expose()),
			None => Self::Absent,
		}
	}

	/// Views a raw JSON column.
	pub fn from_json(value: Option<&'a Value>) -> Self {
		match value {
			None | Some(Value::Null) => Self::Absent,
			Some(Value::String(text)) => Self::Text(text),
			Some(_) => Self::NotString,
		}
	}
}

/// Returns the usable refresh token or the reason it is unusable.
pub fn validate_refresh_token(view: RefreshTokenView<'_>) -> Result<&str, RefreshTokenIssue> {
	match view {
		RefreshTokenView::Absent => Err(RefreshTokenIssue::Missing),
		RefreshTokenView::NotString => Err(RefreshTokenIssue::InvalidType),
		RefreshTokenView::Text(text) if text.trim().is_empty() => Err(RefreshTokenIssue::Empty),
		RefreshTokenView::Text(text) => Ok(text),
	}
}

/// Returns `true` once `expires_at` falls inside the buffer; the boundary itself counts.
pub fn needs_refresh(expires_at: OffsetDateTime, now: OffsetDateTime, buffer: Duration) -> bool {
	let buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

	match now.checked_add(buffer) {
		Some(deadline) => expires_at <= deadline,
		None => true,
	}
}

/// Maps (provider, expiry, refresh token, clock, buffer) onto a [`RefreshDecision`].
pub fn determine_refresh_action(
	provider: &Provider,
	expires_at: OffsetDateTime,
	refresh_token: RefreshTokenView<'_>,
	now: OffsetDateTime,
	buffer: Duration,
) -> RefreshDecision {
	if !needs_refresh(expires_at, now, buffer) {
		return RefreshDecision::None;
	}
	if !provider.is_refreshable() {
		return RefreshDecision::Reauth(ReauthReason::UnknownProvider);
	}

	match validate_refresh_token(refresh_token) {
		Ok(_) => RefreshDecision::Refresh,
		Err(issue) => RefreshDecision::Reauth(issue.into()),
	}
}

/// Decides what to do with a typed record on behalf of `provider`.
pub fn decide(
	provider: &Provider,
	record: &TokenRecord,
	now: OffsetDateTime,
	buffer: Duration,
) -> RefreshDecision {
	determine_refresh_action(
		provider,
		record.expires_at,
		RefreshTokenView::from_secret(record.refresh_token.as_ref()),
		now,
		buffer,
	)
}

/// Decides what to do with a raw database row.
pub fn decide_row(
	row: &TokenRow,
	now: OffsetDateTime,
	buffer: Duration,
) -> Result<RefreshDecision, StoreError> {
	Ok(determine_refresh_action(
		&row.provider,
		row.expires_at()?,
		RefreshTokenView::from_json(row.refresh_token.as_ref()),
		now,
		buffer,
	))
}
