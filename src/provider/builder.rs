//! Validating builder for [`ProviderDescriptor`](crate::provider::ProviderDescriptor).

// std
use std::net::IpAddr;
// self
use crate::{
	_prelude::*,
	auth::Provider,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required for the login flow.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory for all flows.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoint could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {reason}.")]
	InvalidUrl {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Parser message.
		reason: String,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	kind: Provider,
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	preferred_client_auth_method: ClientAuthMethod,
	scopes: Vec<String>,
	scope_delimiter: char,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder for the provided provider kind.
	pub fn new(kind: Provider) -> Self {
		Self {
			kind,
			authorization_endpoint: None,
			token_endpoint: None,
			preferred_client_auth_method: ClientAuthMethod::default(),
			scopes: Vec::new(),
			scope_delimiter: ' ',
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Replaces the scopes requested at login.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the scope delimiter (defaults to a space).
	pub fn scope_delimiter(mut self, delimiter: char) -> Self {
		self.scope_delimiter = delimiter;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;

		validate_endpoint("authorization", &authorization)?;
		validate_endpoint("token", &token)?;

		if self.scope_delimiter.is_control() {
			return Err(ProviderDescriptorError::InvalidScopeDelimiter {
				delimiter: self.scope_delimiter,
			});
		}

		Ok(ProviderDescriptor {
			kind: self.kind,
			endpoints: ProviderEndpoints { authorization, token },
			preferred_client_auth_method: self.preferred_client_auth_method,
			scopes: self.scopes,
			scope_delimiter: self.scope_delimiter,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.map(|ip| ip.is_loopback())
			.unwrap_or(false),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}

	#[test]
	fn rejects_plain_http_for_remote_hosts() {
		let err = ProviderDescriptor::builder(Provider::Spotify)
			.authorization_endpoint(url("http://accounts.example.com/authorize"))
			.token_endpoint(url("https://accounts.example.com/token"))
			.build()
			.expect_err("Remote HTTP endpoints should be rejected.");

		assert!(matches!(
			err,
			ProviderDescriptorError::InsecureEndpoint { endpoint: "authorization", .. }
		));
	}

	#[test]
	fn loopback_endpoints_may_use_http() {
		let descriptor = ProviderDescriptor::builder(Provider::Spotify)
			.authorization_endpoint(url("http://localhost:8080/authorize"))
			.token_endpoint(url("http://127.0.0.1:8080/token"))
			.build()
			.expect("Loopback endpoints should be accepted.");

		assert_eq!(descriptor.endpoints.token.port(), Some(8080));
	}

	#[test]
	fn missing_endpoints_and_control_delimiters_fail() {
		let err = ProviderDescriptor::builder(Provider::Spotify)
			.authorization_endpoint(url("https://example.com/authorize"))
			.build()
			.expect_err("Missing token endpoint should be rejected.");

		assert_eq!(err, ProviderDescriptorError::MissingTokenEndpoint);

		let err = ProviderDescriptor::builder(Provider::Spotify)
			.authorization_endpoint(url("https://example.com/authorize"))
			.token_endpoint(url("https://example.com/token"))
			.scope_delimiter('\n')
			.build()
			.expect_err("Control delimiters should be rejected.");

		assert!(matches!(err, ProviderDescriptorError::InvalidScopeDelimiter { .. }));
	}
}
