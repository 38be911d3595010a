// self
use crate::_prelude::*;

/// Phase of the retry queue state machine.
///
/// `Idle → Limited → Draining → Idle | Limited`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePhase {
	/// Requests go straight out.
	#[default]
	Idle,
	/// A 429 was seen; requests are parked until the delay elapses.
	Limited,
	/// Parked requests are being replayed in order.
	Draining,
}
impl QueuePhase {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Limited => "limited",
			Self::Draining => "draining",
		}
	}
}
impl Display for QueuePhase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Point-in-time view of a retry queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitState {
	/// Current phase.
	pub phase: QueuePhase,
	/// `true` while requests are being held back.
	pub is_limited: bool,
	/// Delay applied before the next drain, in whole seconds.
	pub retry_after_seconds: u64,
	/// Parked requests, the one being replayed included.
	pub queue_len: usize,
}
impl Default for RateLimitState {
	fn default() -> Self {
		Self { phase: QueuePhase::Idle, is_limited: false, retry_after_seconds: 0, queue_len: 0 }
	}
}
