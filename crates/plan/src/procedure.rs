// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Lowers a block-structured procedural statement AST into a linear
//! instruction program. Recursive; nesting depth is bounded only by the
//! input.

use std::sync::Arc;

use fedra_core::{
	Block, BranchKind, Command, Expression, Program, Statement,
	command::{AssignValue, ParameterKind, ProcedureBodyCommand, StoredProcedureCommand},
	plan::{ProcedurePlan, ProcessorPlan, update_count_output},
	program::{AssignSource, CreateCursorInstruction, Instruction},
	value::Value,
};
use tracing::instrument;

use crate::error::{Error, Result};

/// Compile a procedure body command into its processor plan. Sub-command
/// plans must already be attached, see [`crate::dispatch::attach_subplans`].
#[instrument(level = "trace", skip_all)]
pub fn plan_procedure(body: &ProcedureBodyCommand) -> Result<ProcessorPlan> {
	let program = compile_block(&body.block)?;
	let output = if body.update_procedure {
		update_count_output()
	} else {
		body.base.output.clone()
	};
	Ok(ProcessorPlan::Procedure(ProcedurePlan {
		program: Arc::new(program),
		update_procedure: body.update_procedure,
		output,
	}))
}

/// Compile a block into a program. One instruction per statement; If/While/
/// Loop instructions own the nested programs of their sub-blocks.
pub fn compile_block(block: &Block) -> Result<Program> {
	let mut scopes = Vec::new();
	compile_scoped(block, &mut scopes, false)
}

/// One enclosing block on the compilation path, for branch-label
/// resolution. The environment is threaded explicitly; instructions carry no
/// parent pointers.
struct Scope {
	label: Option<String>,
	loop_like: bool,
}

fn compile_scoped(block: &Block, scopes: &mut Vec<Scope>, loop_like: bool) -> Result<Program> {
	scopes.push(Scope {
		label: block.label.clone(),
		loop_like,
	});
	let result = compile_statements(block, scopes);
	scopes.pop();

	Ok(Program {
		label: block.label.clone(),
		atomic: block.atomic,
		instructions: result?,
	})
}

fn compile_statements(block: &Block, scopes: &mut Vec<Scope>) -> Result<Vec<Instruction>> {
	let mut instructions = Vec::with_capacity(block.len());
	for statement in &block.statements {
		instructions.push(compile_statement(statement, scopes)?);
	}
	Ok(instructions)
}

fn compile_statement(statement: &Statement, scopes: &mut Vec<Scope>) -> Result<Instruction> {
	match statement {
		// The declared type is settled at resolve time and does not
		// survive into the instruction.
		Statement::Declare {
			variable,
			value,
			..
		} => Ok(Instruction::Assignment {
			variable: variable.clone(),
			source: match value {
				Some(value) => assign_source(value)?,
				None => AssignSource::Expression(Expression::Constant(Value::Undefined)),
			},
		}),
		Statement::Assignment {
			variable,
			value,
		} => Ok(Instruction::Assignment {
			variable: variable.clone(),
			source: assign_source(value)?,
		}),
		Statement::RaiseError {
			message,
		} => Ok(Instruction::Error {
			message: message.clone(),
		}),
		Statement::Command {
			command,
			updating,
		} => compile_command_statement(command, *updating),
		Statement::If {
			condition,
			then_block,
			else_block,
		} => Ok(Instruction::If {
			condition: condition.clone(),
			then_program: compile_scoped(then_block, scopes, false)?,
			else_program: match else_block {
				Some(else_block) => Some(compile_scoped(else_block, scopes, false)?),
				None => None,
			},
		}),
		Statement::While {
			condition,
			block,
		} => Ok(Instruction::While {
			condition: condition.clone(),
			body: compile_scoped(block, scopes, true)?,
			label: block.label.clone(),
		}),
		Statement::Loop {
			cursor,
			command,
			block,
		} => Ok(Instruction::Loop {
			cursor: cursor.clone(),
			plan: Box::new(attached_plan(command)?),
			body: compile_scoped(block, scopes, true)?,
			label: block.label.clone(),
		}),
		Statement::Branch {
			kind,
			label,
		} => {
			resolve_branch(*kind, label.as_deref(), scopes)?;
			Ok(Instruction::Branch {
				kind: *kind,
				label: label.clone(),
			})
		}
	}
}

fn assign_source(value: &AssignValue) -> Result<AssignSource> {
	match value {
		AssignValue::Expression(expression) => Ok(AssignSource::Expression(expression.clone())),
		AssignValue::Command(command) => Ok(AssignSource::Plan(Box::new(attached_plan(command)?))),
	}
}

fn compile_command_statement(command: &Command, updating: bool) -> Result<Instruction> {
	// Dynamic SQL cannot be planned here; the instruction re-plans at
	// execution time.
	if let Command::Dynamic(dynamic) = command {
		return Ok(Instruction::ExecDynamic {
			command: dynamic.clone(),
		});
	}

	let output_parameters = match command {
		Command::StoredProcedure(procedure) if procedure.callable => output_parameters(procedure)?,
		_ => Vec::new(),
	};

	Ok(Instruction::CreateCursor(CreateCursorInstruction {
		plan: Box::new(attached_plan(command)?),
		mutates_rows: updating || command.is_dml(),
		output_parameters,
	}))
}

/// Ordered (parameter symbol → caller variable) copy-back map for a callable
/// stored-procedure invocation. Input and result-set parameters never copy
/// back; other parameters must be bound to plain variable references.
fn output_parameters(procedure: &StoredProcedureCommand) -> Result<Vec<(String, String)>> {
	let mut parameters = Vec::new();
	for parameter in &procedure.parameters {
		match parameter.kind {
			ParameterKind::In | ParameterKind::Result => continue,
			ParameterKind::Out => match &parameter.expression {
				Some(expression) => match expression.as_variable() {
					Some(variable) => {
						parameters.push((parameter.name.clone(), variable.to_string()))
					}
					None => {
						return Err(Error::UnsupportedParameterBinding {
							parameter: parameter.name.clone(),
						});
					}
				},
				None => continue,
			},
			ParameterKind::InOut | ParameterKind::ReturnValue => {
				// Skipped unless bound to a simple variable.
				if let Some(variable) =
					parameter.expression.as_ref().and_then(Expression::as_variable)
				{
					parameters.push((parameter.name.clone(), variable.to_string()));
				}
			}
		}
	}
	Ok(parameters)
}

fn attached_plan(command: &Command) -> Result<ProcessorPlan> {
	command.plan().cloned().ok_or(Error::MissingSubPlan {
		kind: command.kind(),
	})
}

fn resolve_branch(kind: BranchKind, label: Option<&str>, scopes: &[Scope]) -> Result<()> {
	match label {
		Some(label) => {
			let found = scopes.iter().rev().any(|scope| {
				scope.label.as_deref() == Some(label)
					&& (scope.loop_like || kind == BranchKind::Leave)
			});
			if !found {
				return Err(Error::UnresolvedLabel {
					label: label.to_string(),
				});
			}
		}
		None => {
			// Innermost enclosing loop is the implicit target.
			if !scopes.iter().any(|scope| scope.loop_like) {
				return Err(Error::UnsupportedStatement {
					detail: format!("{kind:?} outside of a loop"),
				});
			}
		}
	}
	Ok(())
}
