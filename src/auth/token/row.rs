//! Persisted shape of a token record (`auth_tokens` table row).

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{Provider, TokenRecord, TokenSecret, UserId},
	refresh::{format_iso_millis, parse_iso},
	store::StoreError,
};

/// Raw `auth_tokens` row as read from or written to the database.
///
/// `refresh_token` stays an untyped JSON value so rows written with a non-string refresh token
/// can still be classified by the decision engine instead of failing to load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRow {
	/// Owning user id.
	pub user_id: String,
	/// Provider label.
	#[serde(default)]
	pub provider: Provider,
	/// Access token value.
	pub access_token: String,
	/// Refresh token column, in whatever JSON shape it was stored.
	#[serde(default)]
	pub refresh_token: Option<Value>,
	/// ISO-8601 expiry timestamp.
	pub expires_at: String,
}
impl TokenRow {
	/// Parses the `expires_at` column.
	pub fn expires_at(&self) -> Result<OffsetDateTime, StoreError> {
		parse_iso(&self.expires_at).ok_or_else(|| StoreError::Serialization {
			message: format!("Column expires_at is not an ISO-8601 timestamp: {}", self.expires_at),
		})
	}
}
impl From<&TokenRecord> for TokenRow {
	fn from(record: &TokenRecord) -> Self {
		Self {
			user_id: record.user_id.to_string(),
			provider: record.provider.clone(),
			access_token: record.access_token.expose().to_owned(),
			refresh_token: record
				.refresh_token
				.as_ref()
				.map(|secret| Value::String(secret.expose().to_owned())),
			expires_at: format_iso_millis(record.expires_at),
		}
	}
}
impl TryFrom<TokenRow> for TokenRecord {
	type Error = StoreError;

	fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
		let expires_at = row.expires_at()?;
		let user_id = UserId::new(&row.user_id).map_err(|e| StoreError::Serialization {
			message: format!("Column user_id is invalid: {e}"),
		})?;
		let refresh_token = match row.refresh_token {
			None | Some(Value::Null) => None,
			Some(Value::String(value)) => Some(TokenSecret::new(value)),
			Some(other) =>
				return Err(StoreError::Serialization {
					message: format!("Column refresh_token must be a string, found {other}"),
				}),
		};

		Ok(TokenRecord {
			user_id,
			provider: row.provider,
			access_token: TokenSecret::new(row.access_token),
			refresh_token,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	use time::macros;
	// self
	use super::*;

	#[test]
	fn rows_convert_both_ways() {
		let record = TokenRecord::builder(
			UserId::new("user-row").expect("User fixture should be valid."),
			Provider::Spotify,
		)
		.access_token("access")
		.refresh_token("refresh")
		.expires_at(macros::datetime!(2024-01-01 01:00 UTC))
		.build()
		.expect("Token record builder should succeed.");
		let row = TokenRow::from(&record);

		assert_eq!(row.expires_at, "2024-01-01T01:00:00.000Z");
		assert_eq!(row.refresh_token, Some(json!("refresh")));

		let back = TokenRecord::try_from(row).expect("Row should convert back into a record.");

		assert_eq!(back, record);
	}

	#[test]
	fn rows_deserialize_from_database_json() {
		let row: TokenRow = serde_json::from_value(json!({
			"user_id": "user-db",
			"provider": "spotify",
			"access_token": "access",
			"refresh_token": 12345,
			"expires_at": "2024-06-01T12:00:00+00:00"
		}))
		.expect("Database row should deserialize.");

		assert_eq!(row.refresh_token, Some(json!(12345)));
		assert_eq!(
			row.expires_at().expect("Offset timestamps should parse."),
			macros::datetime!(2024-06-01 12:00 UTC)
		);
		assert!(matches!(
			TokenRecord::try_from(row),
			Err(StoreError::Serialization { .. })
		));
	}

	#[test]
	fn malformed_expiry_is_a_serialization_error() {
		let row = TokenRow {
			user_id: "user-bad".into(),
			provider: Provider::Spotify,
			access_token: "access".into(),
			refresh_token: None,
			expires_at: "tomorrow".into(),
		};

		assert!(matches!(row.expires_at(), Err(StoreError::Serialization { .. })));
	}
}
