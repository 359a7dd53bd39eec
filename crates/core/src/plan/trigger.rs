// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use tracing::warn;

use crate::{
	error::ExecError,
	expression::Expression,
	interface::Runtime,
	plan::{OutputColumn, Poll, ProcedurePlan, ProcessorPlan, Rows},
	value::Value,
	variables::VariableContext,
};

/// Where a row plan gets its affected rows from: a literal tuple list
/// (INSERT with supplied values, source events) or a derived lookup query
/// over the OLD (and NEW) pseudo-groups.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSource {
	Tuples(Rows),
	Lookup(Box<ProcessorPlan>),
}

/// How one bound symbol resolves against the current row.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingSource {
	/// Positional column of the row source.
	Column(usize),
	/// Fixed value, independent of the row.
	Literal(Value),
	/// Evaluated by the runtime against the current row.
	Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowBinding {
	pub symbol: String,
	pub source: BindingSource,
}

/// Runs a compiled trigger body once per affected row, with OLD/NEW/CHANGING
/// symbols bound as named variables.
#[derive(Debug, PartialEq)]
pub struct ForEachRowPlan {
	pub table: String,
	pub source: RowSource,
	pub bindings: Vec<RowBinding>,
	pub body: ProcedurePlan,
	pub output: Vec<OutputColumn>,

	// Execution state. Reset by `clone()`.
	rows: Rows,
	fetched: bool,
	row_index: usize,
	emitted: bool,
}

impl ForEachRowPlan {
	pub fn new(
		table: impl Into<String>,
		source: RowSource,
		bindings: Vec<RowBinding>,
		body: ProcedurePlan,
		output: Vec<OutputColumn>,
	) -> Self {
		Self {
			table: table.into(),
			source,
			bindings,
			body,
			output,
			rows: Vec::new(),
			fetched: false,
			row_index: 0,
			emitted: false,
		}
	}

	pub fn open(&mut self, rt: &mut dyn Runtime) -> Result<(), ExecError> {
		if let RowSource::Lookup(plan) = &mut self.source {
			plan.open(rt)?;
		}
		Ok(())
	}

	pub fn next_batch(&mut self, rt: &mut dyn Runtime) -> Result<Poll, ExecError> {
		if !self.fetched {
			match &mut self.source {
				RowSource::Tuples(tuples) => {
					self.rows = tuples.clone();
					self.fetched = true;
				}
				RowSource::Lookup(plan) => loop {
					match plan.next_batch(rt)? {
						Poll::Batch(batch) => self.rows.extend(batch),
						Poll::Blocked => return Ok(Poll::Blocked),
						Poll::Done => {
							self.fetched = true;
							break;
						}
					}
				},
			}
		}

		while self.row_index < self.rows.len() {
			let row = &self.rows[self.row_index];
			let mut bindings = VariableContext::new();
			for binding in &self.bindings {
				let value = match &binding.source {
					BindingSource::Column(index) => {
						row.get(*index).cloned().unwrap_or(Value::Undefined)
					}
					BindingSource::Literal(value) => value.clone(),
					BindingSource::Expression(expression) => rt.evaluate(expression, row)?,
				};
				bindings.set(binding.symbol.clone(), value);
			}
			// A blocked row is retried on resume; row_index only moves
			// once the body completed.
			if let Poll::Blocked = rt.run_row(&self.body, &bindings)? {
				return Ok(Poll::Blocked);
			}
			self.row_index += 1;
		}

		if !self.emitted {
			self.emitted = true;
			return Ok(Poll::Batch(vec![vec![Value::Int8(self.rows.len() as i64)]]));
		}
		Ok(Poll::Done)
	}

	pub fn close(&mut self, rt: &mut dyn Runtime) {
		if let RowSource::Lookup(plan) = &mut self.source {
			plan.close(rt);
		}
	}
}

impl Clone for ForEachRowPlan {
	fn clone(&self) -> Self {
		Self::new(
			self.table.clone(),
			self.source.clone(),
			self.bindings.clone(),
			self.body.clone(),
			self.output.clone(),
		)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerChild {
	pub trigger: String,
	pub plan: ForEachRowPlan,
}

/// Which child is currently open, so a blocked firing resumes at the same
/// child instead of restarting the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompositeState {
	pub index: usize,
	pub child_open: bool,
}

/// Runs every trigger registered for a source event, in registration order.
///
/// Per-child isolation: a processing failure in one trigger is logged and
/// the next trigger still runs. A blocked child propagates immediately and
/// is resumed in place. Everything else aborts the firing.
#[derive(Debug, PartialEq)]
pub struct CompositeTriggerPlan {
	pub table: String,
	pub children: Vec<TriggerChild>,
	pub output: Vec<OutputColumn>,
	state: CompositeState,
}

impl CompositeTriggerPlan {
	pub fn new(table: impl Into<String>, children: Vec<TriggerChild>, output: Vec<OutputColumn>) -> Self {
		Self {
			table: table.into(),
			children,
			output,
			state: CompositeState::default(),
		}
	}

	pub fn state(&self) -> CompositeState {
		self.state
	}

	pub fn open(&mut self, _rt: &mut dyn Runtime) -> Result<(), ExecError> {
		// Children open lazily, one at a time, as the state machine
		// reaches them.
		Ok(())
	}

	pub fn next_batch(&mut self, rt: &mut dyn Runtime) -> Result<Poll, ExecError> {
		while self.state.index < self.children.len() {
			let table = self.table.clone();
			let child = &mut self.children[self.state.index];

			if !self.state.child_open {
				match child.plan.open(rt) {
					Ok(()) => self.state.child_open = true,
					Err(error) if error.is_processing() => {
						warn!(trigger = %child.trigger, table = %table, %error,
							"trigger failed to open, continuing with next trigger");
						self.advance(rt);
						continue;
					}
					Err(error) => return Err(error),
				}
			}

			loop {
				match child.plan.next_batch(rt) {
					// Trigger bodies produce no outward rows.
					Ok(Poll::Batch(_)) => continue,
					Ok(Poll::Blocked) => return Ok(Poll::Blocked),
					Ok(Poll::Done) => {
						self.advance(rt);
						break;
					}
					Err(error) if error.is_processing() => {
						warn!(trigger = %child.trigger, table = %table, %error,
							"trigger failed, continuing with next trigger");
						self.advance(rt);
						break;
					}
					Err(error) => return Err(error),
				}
			}
		}
		Ok(Poll::Done)
	}

	fn advance(&mut self, rt: &mut dyn Runtime) {
		if self.state.child_open {
			self.children[self.state.index].plan.close(rt);
		}
		self.state.index += 1;
		self.state.child_open = false;
	}

	pub fn close(&mut self, rt: &mut dyn Runtime) {
		if self.state.child_open {
			self.children[self.state.index].plan.close(rt);
			self.state.child_open = false;
		}
	}
}

impl Clone for CompositeTriggerPlan {
	fn clone(&self) -> Self {
		Self::new(self.table.clone(), self.children.clone(), self.output.clone())
	}
}
