//! Identity providers a token record can originate from.

// self
use crate::_prelude::*;

/// Identity provider that issued a token record.
///
/// Only Spotify has refresh semantics. Apple Music tokens are long-lived and every other label is
/// carried verbatim so callers can still route it to re-authentication.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
	/// Spotify accounts service.
	#[default]
	Spotify,
	/// Apple Music (long-lived developer/user tokens).
	Apple,
	/// Any provider label the broker does not recognize.
	Other(String),
}
impl Provider {
	/// Returns the stored label.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Spotify => "spotify",
			Self::Apple => "apple",
			Self::Other(label) => label,
		}
	}

	/// Returns `true` for providers that support the `refresh_token` grant.
	pub fn is_refreshable(&self) -> bool {
		matches!(self, Self::Spotify)
	}
}
impl From<&str> for Provider {
	fn from(value: &str) -> Self {
		match value.trim().to_ascii_lowercase().as_str() {
			"spotify" => Self::Spotify,
			"apple" => Self::Apple,
			_ => Self::Other(value.to_owned()),
		}
	}
}
impl From<String> for Provider {
	fn from(value: String) -> Self {
		Self::from(value.as_str())
	}
}
impl From<Provider> for String {
	fn from(value: Provider) -> Self {
		match value {
			Provider::Other(label) => label,
			known => known.as_str().to_owned(),
		}
	}
}
impl Display for Provider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
