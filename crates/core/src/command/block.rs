// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use crate::{command::Command, expression::Expression, value::Type};

/// An ordered sequence of procedural statements.
///
/// `atomic` marks the block as one transactional unit; `label` is the target
/// for labeled branch statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
	pub label: Option<String>,
	pub atomic: bool,
	pub statements: Vec<Statement>,
}

impl Block {
	pub fn new(statements: Vec<Statement>) -> Self {
		Self {
			label: None,
			atomic: false,
			statements,
		}
	}

	pub fn labeled(label: impl Into<String>, statements: Vec<Statement>) -> Self {
		Self {
			label: Some(label.into()),
			atomic: false,
			statements,
		}
	}

	pub fn len(&self) -> usize {
		self.statements.len()
	}

	pub fn is_empty(&self) -> bool {
		self.statements.is_empty()
	}
}

/// The right-hand side of an assignment: either a scalar expression or a
/// command whose (scalar) result is assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
	Expression(Expression),
	Command(Box<Command>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
	Break,
	Continue,
	Leave,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
	/// Typed variable introduction. A specialization of `Assignment`; the
	/// type annotation is compile-time-only.
	Declare {
		variable: String,
		ty: Type,
		value: Option<AssignValue>,
	},
	Assignment {
		variable: String,
		value: AssignValue,
	},
	/// Wraps a sub-command; `updating` marks it as row-mutating.
	Command {
		command: Command,
		updating: bool,
	},
	If {
		condition: Expression,
		then_block: Block,
		else_block: Option<Block>,
	},
	While {
		condition: Expression,
		block: Block,
	},
	/// Cursor loop over the result of `command`.
	Loop {
		cursor: String,
		command: Command,
		block: Block,
	},
	Branch {
		kind: BranchKind,
		label: Option<String>,
	},
	RaiseError {
		message: Expression,
	},
}
