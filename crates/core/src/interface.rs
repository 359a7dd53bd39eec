// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Interfaces of the planner's external collaborators. The planning core
//! consumes these; implementations live in the metadata, connector and
//! runtime subsystems.

use crate::{
	command::Block,
	error::{ExecError, MetadataError},
	expression::Expression,
	plan::{OutputColumn, Poll, ProcedurePlan, ProcessorPlan},
	value::Value,
	variables::VariableContext,
};

/// Connector capability the planner may ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
	BatchedUpdates,
}

/// Answers "does source/model X support capability Y".
pub trait CapabilityOracle {
	fn supports(&self, model: &str, capability: Capability) -> Result<bool, MetadataError>;

	/// Whether two models are reached through the same connector instance.
	fn same_connector(&self, model_a: &str, model_b: &str) -> Result<bool, MetadataError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
	Insert,
	Update,
	Delete,
}

/// A trigger definition attached to a table, as stored in metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerDef {
	pub name: String,
	pub event: TriggerEvent,
	pub body: Block,
}

/// Resolved identity of a group (table or view).
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDef {
	pub name: String,
	pub model: String,
	/// Physical source table, as opposed to a virtual (view) group.
	pub physical: bool,
	/// Views backed by an XML document model route to the XML planner.
	pub xml_mapped: bool,
	pub columns: Vec<OutputColumn>,
}

/// Group/model identity lookups. The command tree arrives resolved, so the
/// planner only ever asks about names that already passed resolution;
/// lookup failures are still propagated, never defaulted.
pub trait Metadata {
	fn group(&self, name: &str) -> Result<GroupDef, MetadataError>;

	/// Triggers attached to a table, ordered by registration.
	fn triggers(&self, group: &str) -> Result<Vec<TriggerDef>, MetadataError>;
}

/// The execution engine, driving leaf plans and interpreting compiled
/// programs. Out of scope for the planner itself; the structural plans in
/// [`crate::plan`] call back into it.
pub trait Runtime {
	fn open(&mut self, plan: &ProcessorPlan) -> Result<(), ExecError>;

	fn next_batch(&mut self, plan: &ProcessorPlan) -> Result<Poll, ExecError>;

	fn close(&mut self, plan: &ProcessorPlan);

	/// Run one trigger-body invocation with the given row bindings.
	fn run_row(&mut self, body: &ProcedurePlan, bindings: &VariableContext) -> Result<Poll, ExecError>;

	/// Evaluate a scalar expression against the current row.
	fn evaluate(&mut self, expression: &Expression, row: &[Value]) -> Result<Value, ExecError>;
}
