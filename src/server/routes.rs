// crates.io
use axum::{Json, body::Bytes, extract::State};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	flows::FreshToken,
	refresh::iso_millis,
	server::ServerState,
};

/// Body shared by the `/api/auth/*` routes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
	/// Caller's user id.
	#[serde(default)]
	pub user_id: Option<String>,
}
impl UserRequest {
	/// Parses a JSON body; an empty body is a request without a user id.
	pub fn parse(body: &[u8]) -> Result<Self> {
		if body.iter().all(u8::is_ascii_whitespace) {
			return Ok(Self::default());
		}

		let mut deserializer = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| Error::InvalidRequest { reason: e.to_string() })
	}

	/// Validated user id.
	pub fn user(&self) -> Result<UserId> {
		let raw = self
			.user_id
			.as_deref()
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.ok_or(Error::MissingUserId)?;

		UserId::new(raw).map_err(|e| Error::InvalidRequest { reason: e.to_string() })
	}
}

/// `200` body of `POST /api/auth/refresh`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
	/// Usable access token.
	pub access_token: String,
	/// Expiry as ISO-8601 with milliseconds.
	#[serde(with = "iso_millis")]
	pub expires_at: OffsetDateTime,
	/// Whether the provider was called.
	pub refreshed: bool,
}
impl From<FreshToken> for RefreshResponse {
	fn from(fresh: FreshToken) -> Self {
		Self {
			access_token: fresh.access_token.expose().to_owned(),
			expires_at: fresh.expires_at,
			refreshed: fresh.refreshed,
		}
	}
}

/// `200` body of `POST /api/auth/logout`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
	/// Always `true` on success.
	pub success: bool,
	/// Whether a record existed.
	pub removed: bool,
}

/// `POST /api/auth/refresh`.
pub async fn refresh(
	State(state): State<ServerState>,
	body: Bytes,
) -> Result<Json<RefreshResponse>> {
	let user = UserRequest::parse(&body)?.user()?;
	let fresh = state.broker.ensure_fresh_token(&user).await?;

	Ok(Json(fresh.into()))
}

/// `POST /api/auth/logout`.
pub async fn logout(State(state): State<ServerState>, body: Bytes) -> Result<Json<LogoutResponse>> {
	let user = UserRequest::parse(&body)?.user()?;
	let removed = state.broker.logout(&user).await?;

	Ok(Json(LogoutResponse { success: true, removed }))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn user_requests_validate_the_id() {
		assert!(matches!(
			UserRequest::parse(b"").and_then(|request| request.user()),
			Err(Error::MissingUserId)
		));
		assert!(matches!(
			UserRequest::parse(br#"{"userId":"  "}"#).and_then(|request| request.user()),
			Err(Error::MissingUserId)
		));
		assert!(matches!(UserRequest::parse(br#"{"userId":42}"#), Err(Error::InvalidRequest { .. })));
		assert!(matches!(UserRequest::parse(b"{"), Err(Error::InvalidRequest { .. })));

		let user = UserRequest::parse(br#"{"userId":"user-42"}"#)
			.and_then(|request| request.user())
			.expect("A present user id should validate.");

		assert_eq!(user.as_ref(), "user-42");
	}
}
