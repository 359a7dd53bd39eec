// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use crate::{
	command::{BranchKind, DynamicCommand},
	expression::Expression,
	plan::ProcessorPlan,
};

/// The compiled form of a [`crate::command::Block`]: an ordered instruction
/// sequence with structured control flow. If/Loop/While instructions own
/// nested programs for their sub-blocks, so programs form a strict tree.
///
/// A program is immutable once compiled; execution position lives in the
/// runtime's per-invocation frame, never here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
	pub label: Option<String>,
	pub atomic: bool,
	pub instructions: Vec<Instruction>,
}

impl Program {
	pub fn len(&self) -> usize {
		self.instructions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.instructions.is_empty()
	}

	pub fn instructions(&self) -> &[Instruction] {
		&self.instructions
	}
}

/// Source of an assignment instruction: a scalar expression or the plan of
/// an embedded command whose scalar result is assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignSource {
	Expression(Expression),
	Plan(Box<ProcessorPlan>),
}

/// Executes an embedded command through its pre-attached plan and exposes
/// the result as a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCursorInstruction {
	pub plan: Box<ProcessorPlan>,
	/// Set when the wrapped command is Insert/Update/Delete.
	pub mutates_rows: bool,
	/// Ordered (parameter symbol → caller variable) copy-back map for
	/// callable stored-procedure invocations.
	pub output_parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
	Assignment {
		variable: String,
		source: AssignSource,
	},
	Error {
		message: Expression,
	},
	CreateCursor(CreateCursorInstruction),
	/// Dynamic SQL is re-planned at execution time; the instruction only
	/// carries the command context needed to resolve the text.
	ExecDynamic {
		command: DynamicCommand,
	},
	If {
		condition: Expression,
		then_program: Program,
		else_program: Option<Program>,
	},
	Branch {
		kind: BranchKind,
		/// Resolved target label; `None` means the innermost loop.
		label: Option<String>,
	},
	Loop {
		cursor: String,
		plan: Box<ProcessorPlan>,
		body: Program,
		label: Option<String>,
	},
	While {
		condition: Expression,
		body: Program,
		label: Option<String>,
	},
}

impl Instruction {
	pub fn name(&self) -> &'static str {
		match self {
			Instruction::Assignment {
				..
			} => "ASSIGNMENT",
			Instruction::Error {
				..
			} => "ERROR",
			Instruction::CreateCursor(_) => "CREATE CURSOR",
			Instruction::ExecDynamic {
				..
			} => "EXEC DYNAMIC",
			Instruction::If {
				..
			} => "IF",
			Instruction::Branch {
				..
			} => "BRANCH",
			Instruction::Loop {
				..
			} => "LOOP",
			Instruction::While {
				..
			} => "WHILE",
		}
	}
}
