//! Provider descriptors: validated token/authorize endpoints, client-auth preferences, and the
//! scopes requested during login.

pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::Provider};

const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SPOTIFY_SCOPES: [&str; 7] = [
	"user-read-email",
	"user-read-private",
	"playlist-read-private",
	"playlist-read-collaborative",
	"user-read-playback-state",
	"user-modify-playback-state",
	"streaming",
];

/// OAuth 2.0 grant types the broker issues against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant with PKCE, used at login.
	AuthorizationCode,
	/// Refresh Token grant, used by the lifecycle manager.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint users are redirected to at login.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
}

/// Immutable provider descriptor consumed by the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Provider whose records this descriptor refreshes.
	pub kind: Provider,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Scopes requested in the authorize URL.
	pub scopes: Vec<String>,
	/// Character used to join scopes.
	pub scope_delimiter: char,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided provider kind.
	pub fn builder(kind: Provider) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(kind)
	}

	/// Descriptor for the Spotify accounts service with the scopes Groove needs.
	pub fn spotify() -> Result<Self, ProviderDescriptorError> {
		Self::builder(Provider::Spotify)
			.authorization_endpoint(parse_endpoint("authorization", SPOTIFY_AUTHORIZE_URL)?)
			.token_endpoint(parse_endpoint("token", SPOTIFY_TOKEN_URL)?)
			.scopes(SPOTIFY_SCOPES)
			.build()
	}

	/// Joins the configured scopes with the descriptor's delimiter.
	pub fn scope_param(&self) -> Option<String> {
		if self.scopes.is_empty() {
			return None;
		}

		let mut buf = String::new();

		for (idx, scope) in self.scopes.iter().enumerate() {
			if idx > 0 {
				buf.push(self.scope_delimiter);
			}

			buf.push_str(scope);
		}

		Some(buf)
	}
}

fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url, ProviderDescriptorError> {
	Url::parse(raw).map_err(|e| ProviderDescriptorError::InvalidUrl {
		endpoint,
		reason: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn spotify_descriptor_targets_accounts_service() {
		let descriptor = ProviderDescriptor::spotify().expect("Spotify descriptor should build.");

		assert_eq!(descriptor.kind, Provider::Spotify);
		assert_eq!(descriptor.endpoints.token.as_str(), "https://accounts.spotify.com/api/token");
		assert_eq!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert!(
			descriptor
				.scope_param()
				.expect("Spotify descriptor should request scopes.")
				.starts_with("user-read-email user-read-private")
		);
	}

	#[test]
	fn scope_param_uses_custom_delimiters() {
		let descriptor = ProviderDescriptor::builder(Provider::Spotify)
			.authorization_endpoint(
				Url::parse("https://example.com/authorize").expect("URL fixture should parse."),
			)
			.token_endpoint(Url::parse("https://example.com/token").expect("URL fixture should parse."))
			.scopes(["a", "b"])
			.scope_delimiter(',')
			.build()
			.expect("Descriptor should build.");

		assert_eq!(descriptor.scope_param(), Some("a,b".into()));
	}
}
