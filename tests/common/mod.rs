#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use httpmock::MockServer;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use groove_auth::{
	auth::{Provider, TokenRecord, UserId},
	flows::{Broker, ReqwestBroker},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	provider::{ClientAuthMethod, ProviderDescriptor},
	store::{MemoryStore, TokenStore},
};

pub const CLIENT_ID: &str = "client-groove";
pub const CLIENT_SECRET: &str = "secret-groove";

pub fn user(id: &str) -> UserId {
	UserId::new(id).expect("User fixture should be valid.")
}

/// Spotify-shaped descriptor pointing at the mock server.
pub fn descriptor(server: &MockServer) -> ProviderDescriptor {
	ProviderDescriptor::builder(Provider::Spotify)
		.authorization_endpoint(
			Url::parse(&server.url("/authorize"))
				.expect("Mock authorize endpoint should parse successfully."),
		)
		.token_endpoint(
			Url::parse(&server.url("/api/token"))
				.expect("Mock token endpoint should parse successfully."),
		)
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretBasic)
		.scopes(["user-read-email", "user-read-private"])
		.build()
		.expect("Provider descriptor should build successfully.")
}

/// Broker over a fresh [`MemoryStore`] with a short transport timeout.
pub fn build_test_broker(descriptor: ProviderDescriptor) -> (ReqwestBroker, Arc<MemoryStore>) {
	build_test_broker_with_timeout(descriptor, Duration::seconds(2))
}

pub fn build_test_broker_with_timeout(
	descriptor: ProviderDescriptor,
	timeout: Duration,
) -> (ReqwestBroker, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::default());
	let http_client =
		ReqwestHttpClient::with_timeout(timeout).expect("Test HTTP client should build.");
	let broker = Broker::with_http_client(
		store.clone(),
		descriptor,
		CLIENT_ID,
		http_client,
		Arc::new(ReqwestTransportErrorMapper),
	)
	.with_client_secret(CLIENT_SECRET);

	(broker, store)
}

pub async fn seed_record(
	store: &MemoryStore,
	user: &UserId,
	provider: Provider,
	refresh: Option<&str>,
	expires_in: Duration,
) -> TokenRecord {
	let mut builder = TokenRecord::builder(user.clone(), provider)
		.access_token(format!("access-{user}"))
		.expires_at(OffsetDateTime::now_utc() + expires_in);

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	let record = builder.build().expect("Token record fixture should build successfully.");

	store.upsert(record.clone()).await.expect("Failed to seed token record into the store.");

	record
}

pub fn token_body(access: &str, refresh: Option<&str>, expires_in: u64) -> String {
	let mut body = serde_json::json!({
		"access_token": access,
		"token_type": "Bearer",
		"expires_in": expires_in,
		"scope": "user-read-email user-read-private",
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = refresh.into();
	}

	body.to_string()
}
