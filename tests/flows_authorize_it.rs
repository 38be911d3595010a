#![cfg(feature = "reqwest")]

mod common;

// std
use std::{collections::HashMap, sync::Arc};
// crates.io
use httpmock::prelude::*;
use time::Duration;
use url::Url;
// self
use common::*;
use groove_auth::{
	auth::Provider,
	error::{Error, ErrorCode},
	store::{MemoryStateStore, TokenStore},
};

fn redirect_uri() -> Url {
	Url::parse("http://127.0.0.1:5173/callback").expect("Redirect URL fixture should parse.")
}

#[tokio::test]
async fn authorization_code_flow_issues_and_saves_tokens() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_test_broker(descriptor(&server));
	let session =
		broker.start_authorization(redirect_uri()).await.expect("Session should start.");
	let pairs: HashMap<_, _> = session.authorize_url.query_pairs().into_owned().collect();

	assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
	assert_eq!(pairs.get("client_id").map(String::as_str), Some(CLIENT_ID));
	assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some(redirect_uri().as_str()));
	assert_eq!(pairs.get("scope").map(String::as_str), Some("user-read-email user-read-private"));
	assert_eq!(pairs.get("state"), Some(&session.state));
	assert_eq!(pairs.get("code_challenge").map(String::as_str), Some(session.code_challenge()));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "code-valid")
				.form_urlencoded_tuple("redirect_uri", redirect_uri().as_str());
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-login", Some("refresh-login"), 3600));
		})
		.await;
	let issued = broker
		.complete_authorization(&session.state, "code-valid")
		.await
		.expect("Authorization code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(issued.access_token.expose(), "access-login");
	assert_eq!(issued.scope.as_deref(), Some("user-read-email user-read-private"));

	let user = user("user-login");
	let record =
		broker.save_issued_tokens(user.clone(), issued).await.expect("Tokens should be saved.");

	assert_eq!(record.provider, Provider::Spotify);
	assert_eq!(
		store.fetch(&user).await.expect("Token store fetch should succeed."),
		Some(record.clone())
	);
	assert_eq!(record.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-login"));
}

#[tokio::test]
async fn states_are_single_use() {
	let server = MockServer::start_async().await;
	let (broker, _store) = build_test_broker(descriptor(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-once", None, 3600));
		})
		.await;
	let session =
		broker.start_authorization(redirect_uri()).await.expect("Session should start.");

	broker
		.complete_authorization(&session.state, "code-once")
		.await
		.expect("First exchange should succeed.");

	let err = broker
		.complete_authorization(&session.state, "code-once")
		.await
		.expect_err("Reusing a state should fail.");

	assert!(matches!(err, Error::InvalidState { .. }));
	assert_eq!(err.code(), ErrorCode::InvalidState);
	assert_eq!(err.http_status(), 400);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn expired_and_unknown_states_are_rejected() {
	let server = MockServer::start_async().await;
	let states = Arc::new(MemoryStateStore::default());
	let (broker, _store) = build_test_broker(descriptor(&server));
	let broker = broker.with_state_store(states.clone()).with_state_ttl(-Duration::seconds(1));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(500);
		})
		.await;
	let session =
		broker.start_authorization(redirect_uri()).await.expect("Session should start.");

	assert_eq!(states.len(), 1);

	let err = broker
		.complete_authorization(&session.state, "code-late")
		.await
		.expect_err("Expired states should fail.");

	assert!(matches!(err, Error::InvalidState { .. }));
	assert!(states.is_empty());

	let err = broker
		.complete_authorization("state-unknown", "code")
		.await
		.expect_err("Unknown states should fail.");

	assert!(matches!(err, Error::InvalidState { .. }));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn starting_a_session_sweeps_expired_ones() {
	let server = MockServer::start_async().await;
	let states = Arc::new(MemoryStateStore::default());
	let (broker, _store) = build_test_broker(descriptor(&server));
	let expired = broker
		.clone()
		.with_state_store(states.clone())
		.with_state_ttl(-Duration::seconds(1));
	let live = broker.with_state_store(states.clone());

	expired.start_authorization(redirect_uri()).await.expect("Session should start.");
	expired.start_authorization(redirect_uri()).await.expect("Session should start.");

	assert_eq!(states.len(), 1);

	live.start_authorization(redirect_uri()).await.expect("Session should start.");

	assert_eq!(states.len(), 1);
}

#[tokio::test]
async fn configured_redirect_is_required() {
	let server = MockServer::start_async().await;
	let (broker, _store) = build_test_broker(descriptor(&server));
	let err = broker
		.start_configured_authorization()
		.await
		.expect_err("A broker without a redirect URI should refuse to start.");

	assert_eq!(err.code(), ErrorCode::ConfigError);

	let session = broker
		.with_redirect_uri(redirect_uri())
		.start_configured_authorization()
		.await
		.expect("A configured redirect URI should be used.");

	assert_eq!(session.redirect_uri, redirect_uri());
}

#[tokio::test]
async fn logout_removes_the_record() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_test_broker(descriptor(&server));
	let user = user("user-logout");

	seed_record(&store, &user, Provider::Spotify, Some("refresh-logout"), Duration::hours(1)).await;

	assert!(broker.logout(&user).await.expect("Logout should succeed."));
	assert!(!broker.logout(&user).await.expect("A second logout should succeed."));
	assert!(store.is_empty());
}
