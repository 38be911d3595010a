// crates.io
use time::{PrimitiveDateTime, UtcOffset, format_description::well_known::Rfc3339};
// self
use crate::_prelude::*;

/// Computes the absolute expiry for a token that lives `expires_in` seconds from `now`.
///
/// Values past the representable range saturate at the maximum timestamp.
pub fn calculate_new_expiration(expires_in: u64, now: OffsetDateTime) -> OffsetDateTime {
	i64::try_from(expires_in)
		.ok()
		.and_then(|secs| now.checked_add(Duration::seconds(secs)))
		.unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
}

/// Renders `YYYY-MM-DDTHH:MM:SS.mmmZ` in UTC.
pub fn format_iso_millis(instant: OffsetDateTime) -> String {
	let utc = instant.to_offset(UtcOffset::UTC);

	format!(
		"{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
		utc.year(),
		u8::from(utc.month()),
		utc.day(),
		utc.hour(),
		utc.minute(),
		utc.second(),
		utc.millisecond(),
	)
}

/// Parses an RFC 3339 timestamp and normalizes it to UTC.
pub fn parse_iso(value: &str) -> Option<OffsetDateTime> {
	OffsetDateTime::parse(value.trim(), &Rfc3339).ok().map(|instant| instant.to_offset(UtcOffset::UTC))
}

/// Serde adapter storing timestamps as millisecond ISO strings.
pub mod iso_millis {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as _};
	// self
	use super::*;

	/// Serializes with [`format_iso_millis`].
	pub fn serialize<S>(instant: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&format_iso_millis(*instant))
	}

	/// Deserializes with [`parse_iso`].
	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		parse_iso(&raw).ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 timestamp `{raw}`")))
	}
}
