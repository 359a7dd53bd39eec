// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

mod trigger;
mod update;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
pub use trigger::{BindingSource, CompositeState, CompositeTriggerPlan, ForEachRowPlan, RowBinding, RowSource, TriggerChild};
pub use update::{BatchedUpdatePlan, CompositeUpdatePlan};

use crate::{
	command::{CommandKind, DdlCommand},
	error::ExecError,
	interface::Runtime,
	program::Program,
	value::{Type, Value},
};

/// A projected output column of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputColumn {
	pub name: String,
	pub ty: Type,
}

impl OutputColumn {
	pub fn new(name: impl Into<String>, ty: Type) -> Self {
		Self {
			name: name.into(),
			ty,
		}
	}
}

/// The single-column shape every row-update plan projects.
pub fn update_count_output() -> Vec<OutputColumn> {
	vec![OutputColumn::new("count", Type::Int8)]
}

pub type Rows = Vec<Vec<Value>>;

/// Result of pulling on a plan. `Blocked` is a resumable suspension, not a
/// failure: the caller polls again later and the plan continues where it
/// stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
	Batch(Rows),
	Blocked,
	Done,
}

/// Direct access against a single physical source, as produced by the
/// external relational planner for commands it does not decompose further.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPlan {
	pub model: String,
	pub group: String,
	pub kind: CommandKind,
	pub output: Vec<OutputColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPlan {
	pub output: Vec<OutputColumn>,
	pub child: Box<ProcessorPlan>,
}

/// Trivial pass-through plan for DDL-mutation commands; the runtime applies
/// the wrapped command against the metadata store.
#[derive(Debug, Clone, PartialEq)]
pub struct DdlPlan {
	pub command: DdlCommand,
}

/// A compiled procedure. The program is immutable and shared; per-invocation
/// state (cursors, variable frames) lives in the runtime's execution frame,
/// which is what keeps cache hits cheap and invocation-independent.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedurePlan {
	pub program: Arc<Program>,
	pub update_procedure: bool,
	pub output: Vec<OutputColumn>,
}

/// The executable compiled form of any command.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorPlan {
	Access(AccessPlan),
	Project(ProjectPlan),
	Ddl(DdlPlan),
	Procedure(ProcedurePlan),
	BatchedUpdate(BatchedUpdatePlan),
	CompositeUpdate(CompositeUpdatePlan),
	ForEachRow(ForEachRowPlan),
	CompositeTrigger(CompositeTriggerPlan),
}

impl ProcessorPlan {
	pub fn name(&self) -> &'static str {
		match self {
			ProcessorPlan::Access(_) => "ACCESS",
			ProcessorPlan::Project(_) => "PROJECT",
			ProcessorPlan::Ddl(_) => "DDL",
			ProcessorPlan::Procedure(_) => "PROCEDURE",
			ProcessorPlan::BatchedUpdate(_) => "BATCHED UPDATE",
			ProcessorPlan::CompositeUpdate(_) => "COMPOSITE UPDATE",
			ProcessorPlan::ForEachRow(_) => "FOR EACH ROW",
			ProcessorPlan::CompositeTrigger(_) => "COMPOSITE TRIGGER",
		}
	}

	pub fn output_columns(&self) -> &[OutputColumn] {
		match self {
			ProcessorPlan::Access(p) => &p.output,
			ProcessorPlan::Project(p) => &p.output,
			ProcessorPlan::Ddl(p) => &p.command.base.output,
			ProcessorPlan::Procedure(p) => &p.output,
			ProcessorPlan::BatchedUpdate(p) => &p.output,
			ProcessorPlan::CompositeUpdate(p) => &p.output,
			ProcessorPlan::ForEachRow(p) => &p.output,
			ProcessorPlan::CompositeTrigger(p) => &p.output,
		}
	}

	/// Open the plan for execution. Structural plans (composites, per-row
	/// trigger plans) are driven here; every leaf is handed to the runtime
	/// engine.
	pub fn open(&mut self, rt: &mut dyn Runtime) -> Result<(), ExecError> {
		match self {
			ProcessorPlan::CompositeTrigger(p) => p.open(rt),
			ProcessorPlan::ForEachRow(p) => p.open(rt),
			ProcessorPlan::CompositeUpdate(p) => p.open(rt),
			other => rt.open(other),
		}
	}

	pub fn next_batch(&mut self, rt: &mut dyn Runtime) -> Result<Poll, ExecError> {
		match self {
			ProcessorPlan::CompositeTrigger(p) => p.next_batch(rt),
			ProcessorPlan::ForEachRow(p) => p.next_batch(rt),
			ProcessorPlan::CompositeUpdate(p) => p.next_batch(rt),
			other => rt.next_batch(other),
		}
	}

	pub fn close(&mut self, rt: &mut dyn Runtime) {
		match self {
			ProcessorPlan::CompositeTrigger(p) => p.close(rt),
			ProcessorPlan::ForEachRow(p) => p.close(rt),
			ProcessorPlan::CompositeUpdate(p) => p.close(rt),
			other => rt.close(other),
		}
	}
}
