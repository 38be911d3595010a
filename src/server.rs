//! Axum surface for the session core.
//!
//! Every `/api/*` route sits behind [`rate_limit`]; errors render as the JSON
//! [`ErrorEnvelope`] with the status from [`Error::http_status`].

mod middleware;
mod routes;

pub use middleware::*;
pub use routes::*;

// crates.io
use axum::{
	Json, Router,
	http::{HeaderValue, StatusCode, header::RETRY_AFTER},
	middleware::from_fn_with_state,
	response::{IntoResponse, Response},
	routing::post,
};
// self
use crate::{_prelude::*, error::ErrorEnvelope, flows::ReqwestBroker, ratelimit::FixedWindowLimiter};

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct ServerState {
	/// Broker serving token operations.
	pub broker: Arc<ReqwestBroker>,
	/// Limiter guarding every route.
	pub limiter: Arc<FixedWindowLimiter>,
}

/// Builds the `/api/auth/*` router.
pub fn router(state: ServerState) -> Router {
	Router::new()
		.route("/api/auth/refresh", post(routes::refresh))
		.route("/api/auth/logout", post(routes::logout))
		.route_layer(from_fn_with_state(state.clone(), middleware::rate_limit))
		.with_state(state)
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status =
			StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let mut response = (status, Json(ErrorEnvelope::from(&self))).into_response();

		if let Some(secs) = self.retry_after_secs() {
			response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
		}

		response
	}
}
