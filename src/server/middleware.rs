// std
use std::net::SocketAddr;
// crates.io
use axum::{
	body::{Body, to_bytes},
	extract::{ConnectInfo, Request, State},
	http::{HeaderName, HeaderValue, request::Parts},
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	ratelimit::{RateLimitDecision, RequestIdentity},
	server::{ServerState, UserRequest},
};

const MAX_BODY_BYTES: usize = 64 * 1024;
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Request extension set by an upstream authentication layer; it takes precedence over any
/// user id in the request itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Counts the request against its fixed window and answers 429 once the budget is spent.
///
/// The body is buffered so its `userId` can key the window, then handed on untouched. A body
/// that cannot be buffered is still counted, keyed by the remaining sources, and rejected.
pub async fn rate_limit(State(state): State<ServerState>, request: Request, next: Next) -> Response {
	let (parts, body) = request.into_parts();
	let body = to_bytes(body, MAX_BODY_BYTES).await;
	let identity = identify(&parts, body.as_deref().unwrap_or_default());
	let decision = state
		.limiter
		.check_request(&identity, parts.uri.path(), OffsetDateTime::now_utc())
		.await;
	let mut response = match (&decision, body) {
		(RateLimitDecision::Delay(directive), _) =>
			Error::RateLimited { retry_after: directive.recommended_backoff }.into_response(),
		(RateLimitDecision::Allow { .. }, Err(e)) =>
			Error::InvalidRequest { reason: format!("body could not be read: {e}") }.into_response(),
		(RateLimitDecision::Allow { .. }, Ok(body)) =>
			next.run(Request::from_parts(parts, Body::from(body))).await,
	};
	let headers = response.headers_mut();

	headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit()));
	headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining()));

	response
}

fn identify(parts: &Parts, body: &[u8]) -> RequestIdentity {
	let header = |name: &str| {
		parts.headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
	};
	let query_user_id = parts.uri.query().and_then(|query| {
		url::form_urlencoded::parse(query.as_bytes())
			.find(|(key, _)| key == "userId")
			.map(|(_, value)| value.into_owned())
	});

	RequestIdentity {
		authenticated_user: parts.extensions.get::<AuthenticatedUser>().map(|user| user.0.clone()),
		body_user_id: UserRequest::parse(body).ok().and_then(|request| request.user_id),
		query_user_id,
		forwarded_for: header("x-forwarded-for"),
		real_ip: header("x-real-ip"),
		peer_addr: parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip()),
	}
}
