// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Compiles trigger bodies into per-row plans bound to OLD/NEW
//! pseudo-tuples. Two entry points share the row-binding strategy: the
//! statement-bound planner fires at planning time for DML against a view
//! with a trigger, the source-event planner fires at runtime from a
//! physical change notification.

use std::sync::Arc;

use fedra_core::{
	Command, Expression, Value,
	command::{
		CommandBase, CommandKind, ProcedureBodyCommand, QueryCommand, SourceEventCommand,
	},
	interface::{GroupDef, TriggerDef, TriggerEvent},
	plan::{
		BindingSource, CompositeTriggerPlan, ForEachRowPlan, ProcedurePlan, ProcessorPlan, RowBinding,
		RowSource, TriggerChild, update_count_output,
	},
};
use tracing::{debug, instrument};

use crate::{
	context::PlanningContext,
	dispatch::attach_subplans,
	error::{Error, Result},
	procedure,
};

const OLD: &str = "OLD";
const NEW: &str = "NEW";
const CHANGING: &str = "CHANGING";

fn symbol(group: &str, column: &str) -> String {
	format!("{group}.{column}")
}

/// Plan the INSTEAD-OF trigger for a DML statement against a triggered
/// view. Returns `None` when the target has no trigger for this event, in
/// which case the dispatcher falls through to the relational planner.
#[instrument(level = "trace", skip_all, fields(kind = %command.kind()))]
pub fn plan_statement_triggers(
	ctx: &mut PlanningContext<'_>,
	command: &Command,
) -> Result<Option<ProcessorPlan>> {
	let event = match statement_event(command) {
		Some(event) => event,
		None => return Ok(None),
	};
	let group = match command.group() {
		Some(group) => group.to_string(),
		None => return Ok(None),
	};

	let def = ctx.metadata.group(&group)?;
	ctx.record_access(def.name.clone());
	let trigger = match ctx.metadata.triggers(&group)?.into_iter().find(|t| t.event == event) {
		Some(trigger) => trigger,
		None => return Ok(None),
	};
	debug!(trigger = %trigger.name, table = %group, "planning statement trigger");

	let (source, bindings) = match command {
		Command::Insert(insert) => match &insert.values {
			// Supplied values need no lookup: the literal value list
			// is the single affected row.
			Some(values) => insert_bindings(&def, &insert.columns, values),
			// Query-fed insert: the NEW rows are the query's rows.
			None => {
				let lookup = match &insert.query {
					Some(query) => match query.plan() {
						Some(plan) => plan.clone(),
						None => {
							let relational = ctx.relational;
							relational.plan(ctx, query)?
						}
					},
					None => lookup_plan(ctx, &def, None)?,
				};
				(RowSource::Lookup(Box::new(lookup)), new_from_columns(&def))
			}
		},
		Command::Update(update) => {
			let lookup = lookup_plan(ctx, &def, update.predicate.clone())?;
			let mut bindings = old_from_columns(&def);
			bindings.extend(update_new_bindings(&def, &update.assignments));
			(RowSource::Lookup(Box::new(lookup)), bindings)
		}
		Command::Delete(delete) => {
			let lookup = lookup_plan(ctx, &def, delete.predicate.clone())?;
			(RowSource::Lookup(Box::new(lookup)), old_from_columns(&def))
		}
		_ => return Ok(None),
	};

	let body = compile_trigger_body(ctx, &trigger)?;
	Ok(Some(ProcessorPlan::ForEachRow(ForEachRowPlan::new(
		group,
		source,
		bindings,
		body,
		update_count_output(),
	))))
}

/// Plan the firing of every trigger registered for a source event, in
/// registration order. Planning failure of any trigger aborts the whole
/// firing; only execution tolerates per-trigger failure.
#[instrument(level = "trace", skip_all, fields(table = %event.group))]
pub fn plan_source_event(
	ctx: &mut PlanningContext<'_>,
	event: &SourceEventCommand,
) -> Result<ProcessorPlan> {
	let def = ctx.metadata.group(&event.group)?;
	ctx.record_access(def.name.clone());

	let kind = source_event_kind(event)?;
	let bindings = source_event_bindings(&def, event);
	let row = match (&event.new, &event.old) {
		(Some(new), _) => new.clone(),
		(None, Some(old)) => old.clone(),
		(None, None) => Vec::new(),
	};

	let mut children = Vec::new();
	for trigger in ctx.metadata.triggers(&event.group)? {
		if trigger.event != kind {
			continue;
		}
		debug!(trigger = %trigger.name, table = %event.group, "planning source event trigger");
		let body = compile_trigger_body(ctx, &trigger)?;
		children.push(TriggerChild {
			trigger: trigger.name.clone(),
			plan: ForEachRowPlan::new(
				event.group.clone(),
				RowSource::Tuples(vec![row.clone()]),
				bindings.clone(),
				body,
				update_count_output(),
			),
		});
	}

	Ok(ProcessorPlan::CompositeTrigger(CompositeTriggerPlan::new(
		event.group.clone(),
		children,
		update_count_output(),
	)))
}

fn statement_event(command: &Command) -> Option<TriggerEvent> {
	match command.kind() {
		CommandKind::Insert => Some(TriggerEvent::Insert),
		CommandKind::Update => Some(TriggerEvent::Update),
		CommandKind::Delete => Some(TriggerEvent::Delete),
		_ => None,
	}
}

/// Which event a source notification represents, derived from which column
/// arrays are present.
fn source_event_kind(event: &SourceEventCommand) -> Result<TriggerEvent> {
	match (&event.old, &event.new) {
		(Some(_), Some(_)) => Ok(TriggerEvent::Update),
		(None, Some(_)) => Ok(TriggerEvent::Insert),
		(Some(_), None) => Ok(TriggerEvent::Delete),
		(None, None) => Err(Error::internal("source event carries neither old nor new values")),
	}
}

/// Single-row bindings built directly from the raw old/new arrays. Columns
/// absent from an explicit changed-column list are treated as unchanged:
/// value undefined, changing flag false.
fn source_event_bindings(def: &GroupDef, event: &SourceEventCommand) -> Vec<RowBinding> {
	let mut bindings = Vec::new();
	for (index, column) in def.columns.iter().enumerate() {
		if let Some(old) = &event.old {
			bindings.push(RowBinding {
				symbol: symbol(OLD, &column.name),
				source: BindingSource::Literal(
					old.get(index).cloned().unwrap_or(Value::Undefined),
				),
			});
		}
		if let Some(new) = &event.new {
			let changing = match &event.changed_columns {
				Some(changed) => changed.iter().any(|name| name == &column.name),
				None => true,
			};
			let value = if changing {
				new.get(index).cloned().unwrap_or(Value::Undefined)
			} else {
				Value::Undefined
			};
			bindings.push(RowBinding {
				symbol: symbol(NEW, &column.name),
				source: BindingSource::Literal(value),
			});
			bindings.push(RowBinding {
				symbol: symbol(CHANGING, &column.name),
				source: BindingSource::Literal(Value::Bool(changing)),
			});
		}
	}
	bindings
}

/// Bindings for INSERT with a supplied value list: every named column is
/// changing with its supplied expression, every other column is not.
fn insert_bindings(
	def: &GroupDef,
	columns: &[String],
	values: &[Expression],
) -> (RowSource, Vec<RowBinding>) {
	let mut bindings = Vec::new();
	for column in &def.columns {
		match columns.iter().position(|name| name == &column.name) {
			Some(position) => {
				let source = match values.get(position) {
					Some(Expression::Constant(value)) => {
						BindingSource::Literal(value.clone())
					}
					Some(expression) => BindingSource::Expression(expression.clone()),
					None => BindingSource::Literal(Value::Undefined),
				};
				bindings.push(RowBinding {
					symbol: symbol(NEW, &column.name),
					source,
				});
				bindings.push(RowBinding {
					symbol: symbol(CHANGING, &column.name),
					source: BindingSource::Literal(Value::Bool(true)),
				});
			}
			None => {
				bindings.push(RowBinding {
					symbol: symbol(NEW, &column.name),
					source: BindingSource::Literal(Value::Undefined),
				});
				bindings.push(RowBinding {
					symbol: symbol(CHANGING, &column.name),
					source: BindingSource::Literal(Value::Bool(false)),
				});
			}
		}
	}
	(RowSource::Tuples(vec![vec![]]), bindings)
}

/// OLD.* bound positionally against the lookup row.
fn old_from_columns(def: &GroupDef) -> Vec<RowBinding> {
	def.columns
		.iter()
		.enumerate()
		.map(|(index, column)| RowBinding {
			symbol: symbol(OLD, &column.name),
			source: BindingSource::Column(index),
		})
		.collect()
}

/// NEW.* for a query-fed insert: the lookup row carries the incoming
/// values.
fn new_from_columns(def: &GroupDef) -> Vec<RowBinding> {
	def.columns
		.iter()
		.enumerate()
		.flat_map(|(index, column)| {
			vec![
				RowBinding {
					symbol: symbol(NEW, &column.name),
					source: BindingSource::Column(index),
				},
				RowBinding {
					symbol: symbol(CHANGING, &column.name),
					source: BindingSource::Literal(Value::Bool(true)),
				},
			]
		})
		.collect()
}

/// NEW.* for an update: assigned columns carry their new-value expression
/// and are changing, all others fall back to the old value.
fn update_new_bindings(def: &GroupDef, assignments: &[(String, Expression)]) -> Vec<RowBinding> {
	let mut bindings = Vec::new();
	for (index, column) in def.columns.iter().enumerate() {
		match assignments.iter().find(|(name, _)| name == &column.name) {
			Some((_, expression)) => {
				bindings.push(RowBinding {
					symbol: symbol(NEW, &column.name),
					source: BindingSource::Expression(expression.clone()),
				});
				bindings.push(RowBinding {
					symbol: symbol(CHANGING, &column.name),
					source: BindingSource::Literal(Value::Bool(true)),
				});
			}
			None => {
				bindings.push(RowBinding {
					symbol: symbol(NEW, &column.name),
					source: BindingSource::Column(index),
				});
				bindings.push(RowBinding {
					symbol: symbol(CHANGING, &column.name),
					source: BindingSource::Literal(Value::Bool(false)),
				});
			}
		}
	}
	bindings
}

/// Derived SELECT over the current (OLD) rows the statement affects.
fn lookup_plan(
	ctx: &mut PlanningContext<'_>,
	def: &GroupDef,
	predicate: Option<Expression>,
) -> Result<ProcessorPlan> {
	let query = Command::Query(QueryCommand {
		group: def.name.clone(),
		predicate,
		base: CommandBase::with_output(def.columns.clone()),
	});
	let relational = ctx.relational;
	relational.plan(ctx, &query)
}

/// Rewrite, attach sub-plans and compile the trigger body.
fn compile_trigger_body(ctx: &mut PlanningContext<'_>, trigger: &TriggerDef) -> Result<ProcedurePlan> {
	let rewriter = ctx.rewriter;
	let rewritten = rewriter.rewrite(Command::ProcedureBody(ProcedureBodyCommand {
		block: trigger.body.clone(),
		update_procedure: true,
		virtual_view: None,
		base: CommandBase::default(),
	}))?;

	let mut command = rewritten;
	attach_subplans(ctx, &mut command)?;
	match command {
		Command::ProcedureBody(body) => {
			let program = procedure::compile_block(&body.block)?;
			Ok(ProcedurePlan {
				program: Arc::new(program),
				update_procedure: true,
				output: update_count_output(),
			})
		}
		other => Err(Error::internal(format!(
			"rewriter changed trigger body into {}",
			other.kind()
		))),
	}
}
