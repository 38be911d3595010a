// self
use crate::obs::{FlowKind, FlowOutcome, QueueEvent};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"groove_auth_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Counts a request rejected by the fixed-window limiter.
pub fn record_rate_limited(route: &str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("groove_auth_rate_limited_total", "route" => route.to_owned()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = route;
	}
}

/// Counts a retry queue transition.
pub fn record_queue_event(event: QueueEvent) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("groove_auth_queue_events_total", "event" => event.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = event;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_flow_outcome(FlowKind::Authorization, FlowOutcome::Failure);
		record_rate_limited("/api/auth/refresh");
		record_queue_event(QueueEvent::Cleared);
	}
}
