// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use fedra_core::{CommandKind, MetadataError};

pub type Result<T> = std::result::Result<T, Error>;

/// Planning failure.
///
/// The user-facing variants mean the submitted command cannot be compiled as
/// written; the caller may rewrite and resubmit. `Metadata` wraps lookup
/// failures from the metadata source. `Internal` is a violated invariant of
/// the planner itself and is never recoverable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("unsupported statement shape: {detail}")]
	UnsupportedStatement {
		detail: String,
	},

	#[error("branch label '{label}' does not resolve to an enclosing block")]
	UnresolvedLabel {
		label: String,
	},

	#[error("callable parameter '{parameter}' must be bound to a variable reference")]
	UnsupportedParameterBinding {
		parameter: String,
	},

	#[error("command kind {kind} has no plan attached")]
	MissingSubPlan {
		kind: CommandKind,
	},

	#[error(transparent)]
	Metadata(#[from] MetadataError),

	#[error("internal: {reason}")]
	Internal {
		reason: String,
	},
}

impl Error {
	pub fn internal(reason: impl Into<String>) -> Self {
		Error::Internal {
			reason: reason.into(),
		}
	}
}
