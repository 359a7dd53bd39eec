// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

mod block;

use std::fmt::{self, Display, Formatter};

pub use block::{AssignValue, Block, BranchKind, Statement};

use crate::{
	expression::Expression,
	plan::{OutputColumn, ProcessorPlan},
	value::Value,
	variables::VariableContext,
};

/// Command kind tag, used for dispatch and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
	Query,
	Insert,
	Update,
	Delete,
	BatchedUpdate,
	StoredProcedure,
	ProcedureBody,
	Ddl,
	SourceEvent,
	Dynamic,
}

impl Display for CommandKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			CommandKind::Query => f.write_str("QUERY"),
			CommandKind::Insert => f.write_str("INSERT"),
			CommandKind::Update => f.write_str("UPDATE"),
			CommandKind::Delete => f.write_str("DELETE"),
			CommandKind::BatchedUpdate => f.write_str("BATCHED UPDATE"),
			CommandKind::StoredProcedure => f.write_str("EXEC"),
			CommandKind::ProcedureBody => f.write_str("PROCEDURE"),
			CommandKind::Ddl => f.write_str("DDL"),
			CommandKind::SourceEvent => f.write_str("SOURCE EVENT"),
			CommandKind::Dynamic => f.write_str("DYNAMIC"),
		}
	}
}

/// State shared by every command variant: the memoized plan slot and the
/// projected-output column list.
///
/// The plan slot is set at most once per command instance; re-attachment is
/// an idempotent no-op so that subplan attachment can be re-run safely.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandBase {
	plan: Option<Box<ProcessorPlan>>,
	pub output: Vec<OutputColumn>,
}

impl CommandBase {
	pub fn with_output(output: Vec<OutputColumn>) -> Self {
		Self {
			plan: None,
			output,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryCommand {
	pub group: String,
	pub predicate: Option<Expression>,
	pub base: CommandBase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertCommand {
	pub group: String,
	pub columns: Vec<String>,
	/// Literal value list; absent when the insert is query-fed.
	pub values: Option<Vec<Expression>>,
	pub query: Option<Box<Command>>,
	pub base: CommandBase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
	pub group: String,
	pub assignments: Vec<(String, Expression)>,
	pub predicate: Option<Expression>,
	pub base: CommandBase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCommand {
	pub group: String,
	pub predicate: Option<Expression>,
	pub base: CommandBase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchedUpdateCommand {
	pub commands: Vec<Command>,
	/// Pre-bound runtime values per command, in lockstep with `commands`.
	pub contexts: Vec<VariableContext>,
	pub single_result: bool,
	pub base: CommandBase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
	In,
	Out,
	InOut,
	ReturnValue,
	Result,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureParameter {
	pub name: String,
	pub kind: ParameterKind,
	pub expression: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredProcedureCommand {
	pub name: String,
	pub parameters: Vec<ProcedureParameter>,
	/// Bound to scalar/callable semantics: output parameters are copied
	/// back into caller variables after execution.
	pub callable: bool,
	pub base: CommandBase,
}

/// Durable identity of the view a virtual procedure resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRef {
	pub name: String,
	pub temporary: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureBodyCommand {
	pub block: Block,
	/// Row-update procedures project an update count, not a query result.
	pub update_procedure: bool,
	/// Present when this body is the transformation of a virtual view,
	/// which makes the compiled plan cacheable.
	pub virtual_view: Option<ViewRef>,
	pub base: CommandBase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
	AlterProcedure,
	AlterTrigger,
	AlterView,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DdlCommand {
	pub kind: DdlKind,
	pub target: String,
	pub base: CommandBase,
}

/// Synthetic command fired from a physical change notification. Carries raw
/// old/new column arrays and an optional explicit changed-column-name list.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEventCommand {
	pub group: String,
	pub old: Option<Vec<Value>>,
	pub new: Option<Vec<Value>>,
	pub changed_columns: Option<Vec<String>>,
	pub base: CommandBase,
}

/// Dynamic SQL: the target text is not known until execution, so no plan is
/// ever pre-attached.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicCommand {
	pub sql: Expression,
	pub updating: bool,
	pub base: CommandBase,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	Query(QueryCommand),
	Insert(InsertCommand),
	Update(UpdateCommand),
	Delete(DeleteCommand),
	BatchedUpdate(BatchedUpdateCommand),
	StoredProcedure(StoredProcedureCommand),
	ProcedureBody(ProcedureBodyCommand),
	Ddl(DdlCommand),
	SourceEvent(SourceEventCommand),
	Dynamic(DynamicCommand),
}

impl Command {
	pub fn kind(&self) -> CommandKind {
		match self {
			Command::Query(_) => CommandKind::Query,
			Command::Insert(_) => CommandKind::Insert,
			Command::Update(_) => CommandKind::Update,
			Command::Delete(_) => CommandKind::Delete,
			Command::BatchedUpdate(_) => CommandKind::BatchedUpdate,
			Command::StoredProcedure(_) => CommandKind::StoredProcedure,
			Command::ProcedureBody(_) => CommandKind::ProcedureBody,
			Command::Ddl(_) => CommandKind::Ddl,
			Command::SourceEvent(_) => CommandKind::SourceEvent,
			Command::Dynamic(_) => CommandKind::Dynamic,
		}
	}

	pub fn base(&self) -> &CommandBase {
		match self {
			Command::Query(c) => &c.base,
			Command::Insert(c) => &c.base,
			Command::Update(c) => &c.base,
			Command::Delete(c) => &c.base,
			Command::BatchedUpdate(c) => &c.base,
			Command::StoredProcedure(c) => &c.base,
			Command::ProcedureBody(c) => &c.base,
			Command::Ddl(c) => &c.base,
			Command::SourceEvent(c) => &c.base,
			Command::Dynamic(c) => &c.base,
		}
	}

	pub fn base_mut(&mut self) -> &mut CommandBase {
		match self {
			Command::Query(c) => &mut c.base,
			Command::Insert(c) => &mut c.base,
			Command::Update(c) => &mut c.base,
			Command::Delete(c) => &mut c.base,
			Command::BatchedUpdate(c) => &mut c.base,
			Command::StoredProcedure(c) => &mut c.base,
			Command::ProcedureBody(c) => &mut c.base,
			Command::Ddl(c) => &mut c.base,
			Command::SourceEvent(c) => &mut c.base,
			Command::Dynamic(c) => &mut c.base,
		}
	}

	pub fn plan(&self) -> Option<&ProcessorPlan> {
		self.base().plan.as_deref()
	}

	/// Attach the compiled plan. Returns `false` (and leaves the existing
	/// plan untouched) when one is already attached.
	pub fn attach_plan(&mut self, plan: ProcessorPlan) -> bool {
		let slot = &mut self.base_mut().plan;
		if slot.is_some() {
			return false;
		}
		*slot = Some(Box::new(plan));
		true
	}

	/// Detach and return the attached plan, leaving the slot empty.
	pub fn take_plan(&mut self) -> Option<ProcessorPlan> {
		self.base_mut().plan.take().map(|b| *b)
	}

	pub fn output(&self) -> &[OutputColumn] {
		&self.base().output
	}

	pub fn is_dml(&self) -> bool {
		matches!(self, Command::Insert(_) | Command::Update(_) | Command::Delete(_))
	}

	/// The target group of a plain query or DML command.
	pub fn group(&self) -> Option<&str> {
		match self {
			Command::Query(c) => Some(&c.group),
			Command::Insert(c) => Some(&c.group),
			Command::Update(c) => Some(&c.group),
			Command::Delete(c) => Some(&c.group),
			Command::SourceEvent(c) => Some(&c.group),
			_ => None,
		}
	}

	/// Directly embedded sub-commands, in document order. Used by subplan
	/// attachment; traversal does not descend into already-planned
	/// subtrees' plans.
	pub fn sub_commands_mut(&mut self) -> Vec<&mut Command> {
		let mut out = Vec::new();
		match self {
			Command::Insert(c) => {
				if let Some(query) = &mut c.query {
					out.push(query.as_mut());
				}
			}
			Command::BatchedUpdate(c) => {
				out.extend(c.commands.iter_mut());
			}
			Command::ProcedureBody(c) => {
				collect_block_commands(&mut c.block, &mut out);
			}
			_ => {}
		}
		out
	}
}

fn collect_block_commands<'a>(block: &'a mut Block, out: &mut Vec<&'a mut Command>) {
	for statement in &mut block.statements {
		match statement {
			Statement::Declare {
				value: Some(AssignValue::Command(command)),
				..
			} => out.push(command.as_mut()),
			Statement::Assignment {
				value: AssignValue::Command(command),
				..
			} => out.push(command.as_mut()),
			Statement::Command {
				command,
				..
			} => out.push(command),
			Statement::If {
				then_block,
				else_block,
				..
			} => {
				collect_block_commands(then_block, out);
				if let Some(else_block) = else_block {
					collect_block_commands(else_block, out);
				}
			}
			Statement::While {
				block,
				..
			} => collect_block_commands(block, out),
			Statement::Loop {
				command,
				block,
				..
			} => {
				out.push(command);
				collect_block_commands(block, out);
			}
			_ => {}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::plan::{AccessPlan, ProcessorPlan};

	fn query(group: &str) -> Command {
		Command::Query(QueryCommand {
			group: group.to_string(),
			predicate: None,
			base: CommandBase::default(),
		})
	}

	fn access_plan(group: &str) -> ProcessorPlan {
		ProcessorPlan::Access(AccessPlan {
			model: "m".to_string(),
			group: group.to_string(),
			kind: CommandKind::Query,
			output: vec![],
		})
	}

	#[test]
	fn attach_plan_is_set_once() {
		let mut command = query("g");
		assert!(command.attach_plan(access_plan("g")));
		assert!(!command.attach_plan(access_plan("other")));
		match command.plan() {
			Some(ProcessorPlan::Access(access)) => assert_eq!(access.group, "g"),
			other => panic!("unexpected plan: {other:?}"),
		}
	}

	#[test]
	fn sub_commands_of_procedure_body() {
		let mut body = Command::ProcedureBody(ProcedureBodyCommand {
			block: Block::new(vec![
				Statement::Command {
					command: query("a"),
					updating: false,
				},
				Statement::If {
					condition: Expression::constant(true),
					then_block: Block::new(vec![Statement::Loop {
						cursor: "c".to_string(),
						command: query("b"),
						block: Block::new(vec![]),
					}]),
					else_block: None,
				},
			]),
			update_procedure: false,
			virtual_view: None,
			base: CommandBase::default(),
		});

		let groups: Vec<_> =
			body.sub_commands_mut().into_iter().map(|c| c.group().unwrap().to_string()).collect();
		assert_eq!(groups, vec!["a", "b"]);
	}
}
