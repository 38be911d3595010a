// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("groove_auth.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `warn` event for a failure that is deliberately not propagated.
pub fn warn_swallowed(context: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(context, %error, "ignoring failure");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (context, error);
	}
}

/// Emits a `debug` event describing a state transition.
pub fn debug_transition(component: &'static str, detail: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(component, %detail, "state transition");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (component, detail);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn helpers_noop_without_subscriber() {
		let _span = FlowSpan::new(FlowKind::Logout, "test");

		warn_swallowed("test", &"boom");
		debug_transition("test", &"idle -> limited");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
