// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh attempts.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	reauth: AtomicU64,
	provider_calls: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of refresh attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful calls (including still-valid reuses).
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed calls.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns how many calls ended in a re-authentication requirement.
	pub fn reauths(&self) -> u64 {
		self.reauth.load(Ordering::Relaxed)
	}

	/// Returns how many times the provider token endpoint was actually called.
	pub fn provider_calls(&self) -> u64 {
		self.provider_calls.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reauth(&self) {
		self.reauth.fetch_add(1, Ordering::Relaxed);
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_provider_call(&self) {
		self.provider_calls.fetch_add(1, Ordering::Relaxed);
	}
}
