// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use crate::{
	command::Command,
	error::ExecError,
	interface::Runtime,
	plan::{OutputColumn, Poll, ProcessorPlan, Rows},
	value::Value,
	variables::VariableContext,
};

/// A connector-level batch of ≥2 contiguous DML commands against the same
/// model. The connector executes the whole run in one round trip and
/// reports one update count per command.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedUpdatePlan {
	pub model: String,
	pub commands: Vec<Command>,
	/// Per-command flag: whether the command still needs runtime
	/// evaluation (pre-bound variable references) before shipping.
	pub needs_evaluation: Vec<bool>,
	pub output: Vec<OutputColumn>,
}

/// Ordered combination of batch operators and individual update plans.
///
/// The result-count vector echoes the original command ordering exactly:
/// batches distribute their multi-counts back into the right positions.
#[derive(Debug, PartialEq)]
pub struct CompositeUpdatePlan {
	pub children: Vec<ProcessorPlan>,
	/// One entry per child, in lockstep: per-command bindings for
	/// procedural contexts, one placeholder empty context per batch.
	pub contexts: Vec<VariableContext>,
	pub command_count: usize,
	pub single_result: bool,
	pub output: Vec<OutputColumn>,

	// Execution state. Reset by `clone()`.
	child_index: usize,
	child_open: bool,
	counts: Rows,
	emitted: bool,
}

impl CompositeUpdatePlan {
	pub fn new(
		children: Vec<ProcessorPlan>,
		contexts: Vec<VariableContext>,
		command_count: usize,
		single_result: bool,
		output: Vec<OutputColumn>,
	) -> Self {
		Self {
			children,
			contexts,
			command_count,
			single_result,
			output,
			child_index: 0,
			child_open: false,
			counts: Vec::new(),
			emitted: false,
		}
	}

	pub fn open(&mut self, _rt: &mut dyn Runtime) -> Result<(), ExecError> {
		Ok(())
	}

	pub fn next_batch(&mut self, rt: &mut dyn Runtime) -> Result<Poll, ExecError> {
		while self.child_index < self.children.len() {
			let child = &mut self.children[self.child_index];
			if !self.child_open {
				child.open(rt)?;
				self.child_open = true;
			}
			match child.next_batch(rt)? {
				Poll::Batch(rows) => self.counts.extend(rows),
				Poll::Blocked => return Ok(Poll::Blocked),
				Poll::Done => {
					child.close(rt);
					self.child_index += 1;
					self.child_open = false;
				}
			}
		}

		if self.emitted {
			return Ok(Poll::Done);
		}
		self.emitted = true;

		if self.counts.len() != self.command_count {
			return Err(ExecError::Internal {
				reason: format!(
					"update count mismatch: {} counts for {} commands",
					self.counts.len(),
					self.command_count
				),
			});
		}

		if self.single_result {
			let mut total = 0i64;
			for row in &self.counts {
				if let Some(Value::Int8(count)) = row.first() {
					total += count;
				}
			}
			Ok(Poll::Batch(vec![vec![Value::Int8(total)]]))
		} else {
			Ok(Poll::Batch(std::mem::take(&mut self.counts)))
		}
	}

	pub fn close(&mut self, rt: &mut dyn Runtime) {
		if self.child_open {
			self.children[self.child_index].close(rt);
			self.child_open = false;
		}
	}
}

impl Clone for CompositeUpdatePlan {
	fn clone(&self) -> Self {
		Self::new(
			self.children.clone(),
			self.contexts.clone(),
			self.command_count,
			self.single_result,
			self.output.clone(),
		)
	}
}
