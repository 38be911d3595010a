//! Optional observability helpers for broker flows, the rate limiter, and the retry queue.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `groove_auth.flow` with the `flow` and `stage` fields,
//!   plus `warn`/`debug` events where failures are swallowed or the retry queue changes phase.
//! - Enable `metrics` to increment `groove_auth_flow_total{flow,outcome}`,
//!   `groove_auth_rate_limited_total{route}`, and `groove_auth_queue_events_total{event}`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization Code + PKCE login.
	Authorization,
	/// Refresh token flow.
	Refresh,
	/// Token record removal.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorization => "authorization",
			FlowKind::Refresh => "refresh",
			FlowKind::Logout => "logout",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Retry queue transitions worth counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueEvent {
	/// A 429 moved the queue into the limited phase.
	Limited,
	/// A request was parked behind the limit.
	Enqueued,
	/// A parked request was replayed.
	Replayed,
	/// A replay hit the limit again.
	Requeued,
	/// A request ran out of attempts.
	Exhausted,
	/// The queue was cleared by the caller.
	Cleared,
}
impl QueueEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			QueueEvent::Limited => "limited",
			QueueEvent::Enqueued => "enqueued",
			QueueEvent::Replayed => "replayed",
			QueueEvent::Requeued => "requeued",
			QueueEvent::Exhausted => "exhausted",
			QueueEvent::Cleared => "cleared",
		}
	}
}
impl Display for QueueEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
