// self
use crate::{
	_prelude::*,
	refresh::iso_millis,
	store::{StoreError, StoreFuture},
};

/// A throttled request, as written to the error log table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitLogEntry {
	/// Rendered bucket key (`user:<id>`, `ip:<addr>`).
	pub key: String,
	/// User id when the bucket is user-scoped.
	pub user_id: Option<String>,
	/// Route that was throttled.
	pub route: String,
	/// Configured cap.
	pub limit: u32,
	/// Seconds the caller was told to wait.
	pub retry_after_secs: u64,
	/// When the request was rejected.
	#[serde(with = "iso_millis")]
	pub occurred_at: OffsetDateTime,
}

/// Sink for throttling events; writes are best effort.
pub trait RateLimitLog
where
	Self: Send + Sync,
{
	/// Persists one entry.
	fn record(&self, entry: RateLimitLogEntry) -> StoreFuture<'_, ()>;
}

/// In-process sink, handy for tests and single-node deployments.
#[derive(Clone, Debug, Default)]
pub struct MemoryRateLimitLog(Arc<Mutex<Vec<RateLimitLogEntry>>>);
impl MemoryRateLimitLog {
	/// Snapshot of recorded entries, oldest first.
	pub fn entries(&self) -> Vec<RateLimitLogEntry> {
		self.0.lock().clone()
	}
}
impl RateLimitLog for MemoryRateLimitLog {
	fn record(&self, entry: RateLimitLogEntry) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.lock().push(entry);

			Ok::<_, StoreError>(())
		})
	}
}
