// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Tree rendering of plans and programs for EXPLAIN output and logs.

use crate::{
	plan::{ProcessorPlan, RowSource},
	program::{AssignSource, Instruction, Program},
};

pub fn explain_plan(plan: &ProcessorPlan) -> String {
	let mut output = String::new();
	render_node(&node_of_plan(plan), "", true, &mut output);
	output
}

pub fn explain_program(program: &Program) -> String {
	let mut output = String::new();
	for (i, node) in program_nodes(program).iter().enumerate() {
		render_node(node, "", i == program.len() - 1, &mut output);
	}
	output
}

struct Node {
	label: String,
	children: Vec<Node>,
}

impl Node {
	fn leaf(label: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			children: Vec::new(),
		}
	}
}

fn render_node(node: &Node, prefix: &str, is_last: bool, output: &mut String) {
	let branch = if is_last {
		"└──"
	} else {
		"├──"
	};
	output.push_str(&format!("{prefix}{branch} {}\n", node.label));

	let child_prefix = if is_last {
		format!("{prefix}    ")
	} else {
		format!("{prefix}│   ")
	};
	for (i, child) in node.children.iter().enumerate() {
		render_node(child, &child_prefix, i == node.children.len() - 1, output);
	}
}

fn node_of_plan(plan: &ProcessorPlan) -> Node {
	match plan {
		ProcessorPlan::Access(access) => Node::leaf(format!(
			"Access {{ model: {}, group: {}, kind: {} }}",
			access.model, access.group, access.kind
		)),
		ProcessorPlan::Project(project) => {
			let columns: Vec<&str> = project.output.iter().map(|c| c.name.as_str()).collect();
			Node {
				label: format!("Project {{ columns: [{}] }}", columns.join(", ")),
				children: vec![node_of_plan(&project.child)],
			}
		}
		ProcessorPlan::Ddl(ddl) => Node::leaf(format!("Ddl {{ target: {} }}", ddl.command.target)),
		ProcessorPlan::Procedure(procedure) => Node {
			label: format!("Procedure {{ update: {} }}", procedure.update_procedure),
			children: program_nodes(&procedure.program),
		},
		ProcessorPlan::BatchedUpdate(batch) => Node {
			label: format!("BatchedUpdate {{ model: {}, commands: {} }}", batch.model, batch.commands.len()),
			children: batch
				.commands
				.iter()
				.map(|command| {
					Node::leaf(format!(
						"{} {}",
						command.kind(),
						command.group().unwrap_or_default()
					))
				})
				.collect(),
		},
		ProcessorPlan::CompositeUpdate(composite) => Node {
			label: format!(
				"CompositeUpdate {{ commands: {}, single_result: {} }}",
				composite.command_count, composite.single_result
			),
			children: composite.children.iter().map(node_of_plan).collect(),
		},
		ProcessorPlan::ForEachRow(each) => {
			let mut children = Vec::new();
			if let RowSource::Lookup(lookup) = &each.source {
				children.push(Node {
					label: "Lookup".to_string(),
					children: vec![node_of_plan(lookup)],
				});
			}
			children.push(Node {
				label: "Body".to_string(),
				children: program_nodes(&each.body.program),
			});
			Node {
				label: format!("ForEachRow {{ table: {} }}", each.table),
				children,
			}
		}
		ProcessorPlan::CompositeTrigger(composite) => Node {
			label: format!("CompositeTrigger {{ table: {} }}", composite.table),
			children: composite
				.children
				.iter()
				.map(|child| Node {
					label: format!("Trigger {{ name: {} }}", child.trigger),
					children: vec![node_of_plan(&ProcessorPlan::ForEachRow(
						child.plan.clone(),
					))],
				})
				.collect(),
		},
	}
}

fn program_nodes(program: &Program) -> Vec<Node> {
	program.instructions().iter().map(node_of_instruction).collect()
}

fn node_of_instruction(instruction: &Instruction) -> Node {
	match instruction {
		Instruction::Assignment {
			variable,
			source,
		} => match source {
			AssignSource::Expression(expression) => {
				Node::leaf(format!("Assignment {{ {variable} = {expression} }}"))
			}
			AssignSource::Plan(plan) => Node {
				label: format!("Assignment {{ {variable} = <plan> }}"),
				children: vec![node_of_plan(plan)],
			},
		},
		Instruction::Error {
			message,
		} => Node::leaf(format!("Error {{ {message} }}")),
		Instruction::CreateCursor(cursor) => Node {
			label: format!("CreateCursor {{ mutates_rows: {} }}", cursor.mutates_rows),
			children: vec![node_of_plan(&cursor.plan)],
		},
		Instruction::ExecDynamic {
			command,
		} => Node::leaf(format!("ExecDynamic {{ {} }}", command.sql)),
		Instruction::If {
			condition,
			then_program,
			else_program,
		} => {
			let mut children = vec![Node {
				label: "Then".to_string(),
				children: program_nodes(then_program),
			}];
			if let Some(else_program) = else_program {
				children.push(Node {
					label: "Else".to_string(),
					children: program_nodes(else_program),
				});
			}
			Node {
				label: format!("If {{ {condition} }}"),
				children,
			}
		}
		Instruction::Branch {
			kind,
			label,
		} => Node::leaf(format!("Branch {{ {kind:?} {} }}", label.as_deref().unwrap_or("<innermost>"))),
		Instruction::Loop {
			cursor,
			plan,
			body,
			..
		} => {
			let mut children = vec![node_of_plan(plan)];
			children.extend(program_nodes(body));
			Node {
				label: format!("Loop {{ cursor: {cursor} }}"),
				children,
			}
		}
		Instruction::While {
			condition,
			body,
			..
		} => Node {
			label: format!("While {{ {condition} }}"),
			children: program_nodes(body),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		expression::Expression,
		program::{AssignSource, Instruction, Program},
	};

	#[test]
	fn renders_nested_program() {
		let program = Program {
			label: None,
			atomic: false,
			instructions: vec![
				Instruction::Assignment {
					variable: "x".to_string(),
					source: AssignSource::Expression(Expression::constant(1)),
				},
				Instruction::While {
					condition: Expression::constant(true),
					body: Program {
						label: None,
						atomic: false,
						instructions: vec![Instruction::Branch {
							kind: crate::command::BranchKind::Break,
							label: None,
						}],
					},
					label: None,
				},
			],
		};

		let rendered = explain_program(&program);
		assert!(rendered.contains("├── Assignment { x = 1 }"));
		assert!(rendered.contains("└── While { true }"));
		assert!(rendered.contains("    └── Branch { Break <innermost> }"));
	}
}
