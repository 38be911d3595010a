#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use common::*;
use groove_auth::{
	auth::Provider,
	error::{Error, ErrorCode},
	refresh::{ReauthReason, RefreshResult},
	store::TokenStore,
};

const BASIC_AUTH: &str = "Basic Y2xpZW50LWdyb292ZTpzZWNyZXQtZ3Jvb3Zl";

#[tokio::test]
async fn refresh_rotates_tokens_and_updates_store() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_test_broker(descriptor(&server));
	let user = user("user-rotate");

	seed_record(&store, &user, Provider::Spotify, Some("refresh-old"), Duration::minutes(1)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/token")
				.header("authorization", BASIC_AUTH)
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-old");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-new", Some("refresh-new"), 3600));
		})
		.await;
	let before = OffsetDateTime::now_utc();
	let fresh = broker.ensure_fresh_token(&user).await.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert!(fresh.refreshed);
	assert_eq!(fresh.access_token.expose(), "access-new");
	assert!(fresh.expires_at >= before + Duration::seconds(3600));
	assert!(fresh.expires_at <= OffsetDateTime::now_utc() + Duration::seconds(3600));

	let stored = store
		.fetch(&user)
		.await
		.expect("Token store fetch should succeed.")
		.expect("Record should remain present after refresh.");

	assert_eq!(stored.access_token.expose(), "access-new");
	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-new"));
	assert_eq!(stored.expires_at, fresh.expires_at);
	assert_eq!(broker.refresh_metrics.provider_calls(), 1);
	assert_eq!(broker.refresh_metrics.successes(), 1);
}

#[tokio::test]
async fn refresh_keeps_the_stored_refresh_token_when_none_is_returned() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_test_broker(descriptor(&server));
	let user = user("user-retain");

	seed_record(&store, &user, Provider::Spotify, Some("refresh-keep"), -Duration::minutes(10))
		.await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-retained", None, 3600));
		})
		.await;

	broker.ensure_fresh_token(&user).await.expect("Refresh should succeed.");
	mock.assert_async().await;

	let stored = store
		.fetch(&user)
		.await
		.expect("Token store fetch should succeed.")
		.expect("Record should remain present after refresh.");

	assert_eq!(stored.access_token.expose(), "access-retained");
	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-keep"));
}

#[tokio::test]
async fn refresh_singleflight_hits_provider_once() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_test_broker(descriptor(&server));
	let user = user("user-singleflight");

	seed_record(&store, &user, Provider::Spotify, Some("refresh-once"), Duration::seconds(5)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-singleflight", Some("refresh-singleflight"), 3600));
		})
		.await;
	let (first, second) =
		tokio::join!(broker.ensure_fresh_token(&user), broker.ensure_fresh_token(&user));
	let first = first.expect("First refresh request should succeed.");
	let second = second.expect("Second refresh request should succeed.");

	assert_eq!(first.access_token.expose(), "access-singleflight");
	assert_eq!(second.access_token.expose(), "access-singleflight");
	assert!(first.refreshed ^ second.refreshed, "Only the leader should call the provider.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn fresh_tokens_skip_the_provider() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (broker, store) = build_test_broker(descriptor(&server));
	let user = user("user-fresh");
	let record =
		seed_record(&store, &user, Provider::Spotify, Some("refresh-fresh"), Duration::hours(1))
			.await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(500);
		})
		.await;
	let fresh = broker.ensure_fresh_token(&user).await?;

	assert!(!fresh.refreshed);
	assert_eq!(fresh.access_token, record.access_token);
	assert_eq!(fresh.expires_at, record.expires_at);

	mock.assert_calls_async(0).await;

	Ok(())
}

#[tokio::test]
async fn refresh_timeout_leaves_the_store_untouched() {
	let server = MockServer::start_async().await;
	let (broker, store) =
		build_test_broker_with_timeout(descriptor(&server), Duration::milliseconds(300));
	let user = user("user-timeout");
	let record =
		seed_record(&store, &user, Provider::Spotify, Some("refresh-slow"), Duration::minutes(2))
			.await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_secs(2))
				.body(token_body("access-late", Some("refresh-late"), 3600));
		})
		.await;

	let err = broker.ensure_fresh_token(&user).await.expect_err("Timeouts should fail the refresh.");

	assert!(matches!(err, Error::RefreshFailed { .. }));
	assert_eq!(err.code(), ErrorCode::RefreshFailed);
	assert!(!err.retryable());

	let stored = store
		.fetch(&user)
		.await
		.expect("Token store fetch should succeed.")
		.expect("Record should remain present after a failed refresh.");

	assert_eq!(stored, record);
	assert_eq!(broker.refresh_metrics.failures(), 1);
}

#[tokio::test]
async fn provider_rejection_reports_refresh_failed() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_test_broker(descriptor(&server));
	let user = user("user-rejected");
	let record =
		seed_record(&store, &user, Provider::Spotify, Some("refresh-revoked"), -Duration::hours(1))
			.await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Refresh token revoked\"}");
		})
		.await;
	let err = broker.ensure_fresh_token(&user).await.expect_err("Rejected grants should fail.");

	mock.assert_async().await;

	assert_eq!(err.code(), ErrorCode::RefreshFailed);
	assert_eq!(err.http_status(), 401);

	let stored = store.fetch(&user).await.expect("Token store fetch should succeed.");

	assert_eq!(stored, Some(record));
}

#[tokio::test]
async fn unusable_records_require_reauthentication() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_test_broker(descriptor(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(500);
		})
		.await;
	let cases = [
		("user-empty", Provider::Spotify, Some(""), ReauthReason::EmptyRefreshToken),
		("user-missing", Provider::Spotify, None, ReauthReason::MissingRefreshToken),
		("user-apple", Provider::Apple, Some("refresh-apple"), ReauthReason::UnknownProvider),
	];

	for (id, provider, refresh, expected) in cases {
		let user = user(id);

		seed_record(&store, &user, provider, refresh, -Duration::minutes(10)).await;

		let err = broker
			.ensure_fresh_token(&user)
			.await
			.expect_err("Unusable records should require reauthentication.");

		assert!(
			matches!(err, Error::ReauthRequired { reason } if reason == expected),
			"{id} should fail with {expected:?}, got {err:?}."
		);
		assert_eq!(err.code(), expected.error_code());
	}

	mock.assert_calls_async(0).await;
	assert_eq!(broker.refresh_metrics.reauths(), 3);
}

#[tokio::test]
async fn unknown_users_are_not_found() {
	let server = MockServer::start_async().await;
	let (broker, _store) = build_test_broker(descriptor(&server));
	let err = broker
		.ensure_fresh_token(&user("user-ghost"))
		.await
		.expect_err("Users without a record should fail.");

	assert_eq!(err.code(), ErrorCode::TokenNotFound);
	assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn execute_refresh_reports_failures_without_a_store() {
	let server = MockServer::start_async().await;
	let (broker, _store) = build_test_broker(descriptor(&server));

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(503).header("content-type", "application/json").body("{}");
		})
		.await;

	let result = broker.execute_refresh("refresh-any").await;

	assert!(!result.is_success());
	assert!(matches!(result, RefreshResult::Failed(_)));
}
