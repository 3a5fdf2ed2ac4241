// self
use crate::{_prelude::*, obs::StageKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used by gate stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage kind + step.
	pub fn new(kind: StageKind, step: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oidc_gate.stage", stage = kind.as_str(), step);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, step);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> StageSpanGuard {
		#[cfg(feature = "tracing")]
		{
			StageSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			StageSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
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

/// RAII guard returned by [`StageSpan::entered`].
pub struct StageSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for StageSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StageSpanGuard(..)")
	}
}

/// Logs an absorbed best-effort failure at warn level (when tracing is enabled).
///
/// Enrichment swallows every per-group failure; this is the diagnostics channel
/// that keeps the breadth of that suppression observable.
pub fn log_absorbed(kind: StageKind, context: &str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			stage = kind.as_str(),
			context,
			error = %error,
			"Absorbed best-effort failure.",
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, context, error);
	}
}

/// Logs a skipped-but-expected outcome at debug level (when tracing is enabled).
pub fn log_skipped(kind: StageKind, context: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(stage = kind.as_str(), context, "Skipped without effect.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, context);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn stage_span_noop_without_tracing() {
		let _guard = StageSpan::new(StageKind::CodeExchange, "test").entered();
		// Compile-time smoke test ensures the guard exists even when tracing is disabled.
	}

	#[test]
	fn absorbed_logging_accepts_any_display() {
		log_absorbed(StageKind::GroupLookup, "group g-1", &"boom");
		log_skipped(StageKind::GroupLookup, "group g-2");
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = StageSpan::new(StageKind::SilentRefresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
