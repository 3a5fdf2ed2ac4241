//! Optional observability helpers for login stages.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oidc_gate.stage` with the `stage` (pipeline
//!   step) and `step` (call site) fields, plus warn/debug events for absorbed enrichment failures.
//! - Enable `metrics` to increment the `oidc_gate_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed by the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
	/// Authorization-code exchange at login.
	CodeExchange,
	/// Silent refresh-token acquisition.
	SilentRefresh,
	/// Per-group directory lookup during enrichment.
	GroupLookup,
	/// Session establishment hand-off.
	SessionCommit,
}
impl StageKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageKind::CodeExchange => "code_exchange",
			StageKind::SilentRefresh => "silent_refresh",
			StageKind::GroupLookup => "group_lookup",
			StageKind::SessionCommit => "session_commit",
		}
	}
}
impl Display for StageKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a gate helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
