// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

/// Metadata lookup failure during planning. Always propagated, never
/// silently defaulted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetadataError {
	#[error("unknown group '{name}'")]
	UnknownGroup {
		name: String,
	},

	#[error("unknown model '{name}'")]
	UnknownModel {
		name: String,
	},

	#[error("metadata source unavailable: {reason}")]
	Unavailable {
		reason: String,
	},
}

/// Execution-time failure surfaced through the plan lifecycle.
///
/// `Processing` is the only recoverable kind and only the composite trigger
/// plan recovers from it; every other variant aborts the plan it occurs in.
/// Suspension is not an error at all, see [`crate::plan::Poll::Blocked`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecError {
	#[error("processing failed: {reason}")]
	Processing {
		reason: String,
	},

	#[error("raised by procedure: {message}")]
	Raised {
		message: String,
	},

	#[error("internal: {reason}")]
	Internal {
		reason: String,
	},
}

impl ExecError {
	pub fn processing(reason: impl Into<String>) -> Self {
		ExecError::Processing {
			reason: reason.into(),
		}
	}

	/// Whether the composite trigger plan may tolerate this failure and
	/// move on to the next trigger.
	pub fn is_processing(&self) -> bool {
		matches!(self, ExecError::Processing { .. })
	}
}
