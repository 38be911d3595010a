//! Transport primitives for token endpoint calls.
//!
//! [`TokenHttpClient`] is the broker's only dependency on an HTTP stack. Each token request gets
//! a fresh [`ResponseMetadataSlot`]; implementations call [`ResponseMetadataSlot::take`] before
//! dispatching and [`ResponseMetadataSlot::store`] once a status or retry hint is known, so
//! transport failures can be classified with consistent metadata.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError,
	http::{HeaderMap, header::RETRY_AFTER},
};
#[cfg(feature = "reqwest")] use oauth2::{HttpRequest, HttpResponse};
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Default hard timeout applied to every token endpoint call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::seconds(10);

/// Abstraction over HTTP transports capable of executing token endpoint calls while publishing
/// response metadata.
///
/// Implementations must be `Send + Sync + 'static`, and the handles they return must own their
/// state so request futures stay `Send` while in flight.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Metadata from the most recent HTTP response, used for error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Reqwest transport for token calls.
///
/// Token endpoints answer directly, so redirects are never followed, and every call is bounded
/// by a hard timeout.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client with [`DEFAULT_HTTP_TIMEOUT`].
	pub fn new() -> Result<Self, ConfigError> {
		Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
	}

	/// Builds a client that gives up after `timeout`.
	pub fn with_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let timeout = std::time::Duration::try_from(timeout)
			.map_err(|_| ConfigError::InvalidTimeout { value: timeout.to_string() })?;
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; callers own its timeout and redirect policy.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that records response metadata.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			inner.slot.take();

			let response = inner
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers, OffsetDateTime::now_utc());

			inner.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut converted = HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Reads `Retry-After` as delta seconds or an HTTP date relative to `now`.
///
/// Dates in the past yield `None`.
pub fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::HeaderValue;
	use time::macros;
	// self
	use super::*;

	fn headers(value: &str) -> HeaderMap {
		let mut map = HeaderMap::new();

		map.insert(RETRY_AFTER, HeaderValue::from_str(value).expect("Header fixture should be valid."));

		map
	}

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		let now = macros::datetime!(2024-01-01 00:00 UTC);

		assert_eq!(parse_retry_after(&headers("7"), now), Some(Duration::seconds(7)));
		assert_eq!(
			parse_retry_after(&headers("Mon, 01 Jan 2024 00:00:45 +0000"), now),
			Some(Duration::seconds(45))
		);
		assert_eq!(parse_retry_after(&headers("Sun, 31 Dec 2023 23:59:00 +0000"), now), None);
		assert_eq!(parse_retry_after(&headers("soon"), now), None);
		assert_eq!(parse_retry_after(&HeaderMap::new(), now), None);
	}

	#[test]
	fn metadata_slot_is_single_read() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(429), retry_after: Some(Duration::seconds(3)) });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(429));
		assert!(slot.take().is_none());
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn reqwest_client_builds_with_bounded_timeout() {
		assert!(ReqwestHttpClient::with_timeout(Duration::seconds(3)).is_ok());
		assert!(ReqwestHttpClient::with_timeout(Duration::seconds(-1)).is_err());
	}
}
