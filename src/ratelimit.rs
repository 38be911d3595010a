//! Server-side fixed-window rate limiting.
//!
//! Each request is counted against one [`RateLimitKey`] (the user when known, otherwise the
//! client address). A key may issue `max_requests` requests per `window`; the first request after
//! the window closes opens a new one. Throttled requests get a [`RetryDirective`] whose backoff is
//! the time left in the window, rounded up to whole seconds.

mod key;
mod log;
mod store;

pub use key::*;
pub use log::*;
pub use store::*;

// std
use std::sync::Weak;
// crates.io
use tokio::task::JoinHandle;
// self
use crate::{_prelude::*, error::ConfigError, obs, store::StoreError};

/// Limiter settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
	/// Length of each fixed window.
	pub window: Duration,
	/// Requests allowed per key and window.
	pub max_requests: u32,
	/// Interval between sweeps of closed windows.
	pub sweep_interval: Duration,
}
impl RateLimitConfig {
	/// Default window length.
	pub const DEFAULT_WINDOW: Duration = Duration::seconds(60);
	/// Default per-window cap.
	pub const DEFAULT_MAX_REQUESTS: u32 = 100;

	/// Creates a validated configuration; the sweep interval follows the window.
	pub fn new(max_requests: u32, window: Duration) -> Result<Self, ConfigError> {
		if max_requests == 0 {
			return Err(ConfigError::InvalidSetting {
				name: "max_requests",
				reason: "must allow at least one request".into(),
			});
		}
		if !window.is_positive() {
			return Err(ConfigError::InvalidSetting {
				name: "window",
				reason: format!("must be positive, got {window}"),
			});
		}

		Ok(Self { window, max_requests, sweep_interval: window })
	}

	/// Overrides the sweep interval; non-positive values keep the current one.
	pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
		if interval.is_positive() {
			self.sweep_interval = interval;
		}

		self
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			window: Self::DEFAULT_WINDOW,
			max_requests: Self::DEFAULT_MAX_REQUESTS,
			sweep_interval: Self::DEFAULT_WINDOW,
		}
	}
}

/// Verdict for a single request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed.
	Allow {
		/// Configured cap.
		limit: u32,
		/// Requests left in the window after this one.
		remaining: u32,
		/// Instant the window closes.
		reset_at: OffsetDateTime,
	},
	/// The request must wait.
	Delay(RetryDirective),
}
impl RateLimitDecision {
	/// Configured cap, for the `X-RateLimit-Limit` header.
	pub fn limit(&self) -> u32 {
		match self {
			Self::Allow { limit, .. } => *limit,
			Self::Delay(directive) => directive.limit,
		}
	}

	/// Remaining budget, for the `X-RateLimit-Remaining` header.
	pub fn remaining(&self) -> u32 {
		match self {
			Self::Allow { remaining, .. } => *remaining,
			Self::Delay(_) => 0,
		}
	}

	/// Returns `true` for [`RateLimitDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow { .. })
	}
}

/// Tells a throttled caller when to retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Configured cap.
	pub limit: u32,
	/// Instant the current window closes.
	pub earliest_retry_at: OffsetDateTime,
	/// Wait in whole seconds, at least one.
	pub recommended_backoff: Duration,
	/// Human-readable reason.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a directive with the backoff rounded up to whole seconds.
	pub fn new(limit: u32, earliest_retry_at: OffsetDateTime, now: OffsetDateTime) -> Self {
		Self {
			limit,
			earliest_retry_at,
			recommended_backoff: ceil_seconds(earliest_retry_at - now),
			reason: None,
		}
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}

	/// Backoff in whole seconds, for the `Retry-After` header.
	pub fn retry_after_secs(&self) -> u64 {
		self.recommended_backoff.whole_seconds().max(1) as u64
	}
}

/// Fixed-window limiter over a pluggable [`RateLimitStore`].
pub struct FixedWindowLimiter {
	config: RateLimitConfig,
	store: Arc<dyn RateLimitStore>,
	log: Option<Arc<dyn RateLimitLog>>,
}
impl FixedWindowLimiter {
	/// Creates a limiter backed by `store`.
	pub fn new(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
		Self { config, store, log: None }
	}

	/// Creates a limiter with an in-memory store.
	pub fn in_memory(config: RateLimitConfig) -> Self {
		Self::new(config, Arc::new(MemoryRateLimitStore::default()))
	}

	/// Attaches a sink that records throttled requests.
	pub fn with_log(mut self, log: Arc<dyn RateLimitLog>) -> Self {
		self.log = Some(log);

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Counts one request for `key` and decides whether it may proceed.
	pub async fn check(
		&self,
		key: &RateLimitKey,
		now: OffsetDateTime,
	) -> Result<RateLimitDecision, StoreError> {
		let RateLimitConfig { window, max_requests, .. } = self.config;
		let entry = <dyn RateLimitStore>::hit(self.store.as_ref(), key, now, window).await?;
		let reset_at = entry.reset_at(window);

		if entry.count <= max_requests {
			return Ok(RateLimitDecision::Allow {
				limit: max_requests,
				remaining: max_requests - entry.count,
				reset_at,
			});
		}

		Ok(RateLimitDecision::Delay(
			RetryDirective::new(max_requests, reset_at, now)
				.with_reason("Too many requests, please try again later."),
		))
	}

	/// Resolves the key for `identity`, checks it, and records throttled requests.
	///
	/// Store failures let the request through.
	pub async fn check_request(
		&self,
		identity: &RequestIdentity,
		route: &str,
		now: OffsetDateTime,
	) -> RateLimitDecision {
		let key = identity.key();
		let decision = match self.check(&key, now).await {
			Ok(decision) => decision,
			Err(e) => {
				obs::warn_swallowed("rate limit store", &e);

				return RateLimitDecision::Allow {
					limit: self.config.max_requests,
					remaining: self.config.max_requests,
					reset_at: now + self.config.window,
				};
			},
		};

		if let RateLimitDecision::Delay(directive) = &decision {
			obs::record_rate_limited(route);

			if let Some(log) = &self.log {
				let entry = RateLimitLogEntry {
					key: key.to_string(),
					user_id: key.user_id().map(str::to_owned),
					route: route.to_owned(),
					limit: directive.limit,
					retry_after_secs: directive.retry_after_secs(),
					occurred_at: now,
				};

				if let Err(e) = <dyn RateLimitLog>::record(log.as_ref(), entry).await {
					obs::warn_swallowed("rate limit log", &e);
				}
			}
		}

		decision
	}

	/// Evicts closed windows.
	pub async fn sweep(&self, now: OffsetDateTime) -> Result<usize, StoreError> {
		<dyn RateLimitStore>::sweep(self.store.as_ref(), now, self.config.window).await
	}

	/// Sweeps closed windows every `sweep_interval` until the limiter is dropped.
	pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
		let limiter: Weak<Self> = Arc::downgrade(self);
		let period = std::time::Duration::try_from(self.config.sweep_interval)
			.ok()
			.filter(|period| !period.is_zero())
			.unwrap_or(std::time::Duration::from_secs(60));

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);

			// The first tick completes immediately.
			ticker.tick().await;

			loop {
				ticker.tick().await;

				let Some(limiter) = limiter.upgrade() else { break };

				if let Err(e) = limiter.sweep(OffsetDateTime::now_utc()).await {
					obs::warn_swallowed("rate limit sweep", &e);
				}
			}
		})
	}
}
impl Debug for FixedWindowLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FixedWindowLimiter")
			.field("config", &self.config)
			.field("log_attached", &self.log.is_some())
			.finish()
	}
}

fn ceil_seconds(delta: Duration) -> Duration {
	let whole = delta.whole_seconds();
	let rounded = if delta.subsec_nanoseconds() > 0 { whole + 1 } else { whole };

	Duration::seconds(rounded.max(1))
}
